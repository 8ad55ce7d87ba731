use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod known_vars;

pub use known_vars::{
    is_secret_key, is_system_var, known_var, ChannelDef, KnownVar, CHANNEL_DEFS, KNOWN_VARS,
    SYSTEM_VARS,
};

/// One `KEY=VALUE` line of the credential file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl EnvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_set(&self) -> bool {
        !self.value.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarGroup {
    Models,
    Github,
    Channels,
    Tools,
    Custom,
}

/// Where a listed credential value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarSource {
    EnvFile,
    Unset,
}

/// A credential as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    pub label: String,
    pub group: VarGroup,
    pub hint: String,
    pub source: VarSource,
    pub editable: bool,
}

/// Which half of channel reconciliation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Add,
    Remove,
    All,
}

impl SyncMode {
    pub fn adds(self) -> bool {
        matches!(self, SyncMode::Add | SyncMode::All)
    }

    pub fn removes(self) -> bool {
        matches!(self, SyncMode::Remove | SyncMode::All)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Add => "add",
            SyncMode::Remove => "remove",
            SyncMode::All => "all",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvListResponse {
    pub vars: Vec<EnvVar>,
    pub restart_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveEnvRequest {
    #[serde(default)]
    pub vars: Option<Vec<EnvEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEnvResponse {
    pub ok: bool,
    pub changed: bool,
    pub restart_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    Running,
    Starting,
    /// A restart is waiting for the old gateway to release its port.
    Restarting,
    NotOnboarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPairing {
    Configured,
    Paired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub status: ChannelPairing,
    pub paired: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub gateway: GatewayState,
    pub config_exists: bool,
    pub channels: BTreeMap<String, ChannelStatus>,
    pub restart_required: bool,
}
