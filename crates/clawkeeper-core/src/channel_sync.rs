//! Keeps gateway channel registrations in line with the saved bot tokens.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use clawkeeper_schema::{ChannelDef, ChannelPairing, ChannelStatus, EnvEntry, SyncMode, CHANNEL_DEFS};

use crate::commands::GatewayCli;
use crate::error::ConfigError;
use crate::gateway_config::{channel_enabled, load_config};
use crate::process_env::ProcessEnv;
use crate::sanitizer::{sanitize_config_file, TrackedSecret};

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

pub struct ChannelReconciler {
    config_path: PathBuf,
    cli: Arc<dyn GatewayCli>,
    defs: &'static [ChannelDef],
}

impl ChannelReconciler {
    pub fn new(config_path: impl Into<PathBuf>, cli: Arc<dyn GatewayCli>) -> Self {
        Self {
            config_path: config_path.into(),
            cli,
            defs: CHANNEL_DEFS,
        }
    }

    /// Add channels whose token is present but not enabled; remove channels
    /// enabled without a token. Command failures are logged and reported,
    /// never returned.
    pub async fn sync(&self, saved: &[EnvEntry], mode: SyncMode) -> Result<SyncReport, ConfigError> {
        let config = load_config(&self.config_path)?;
        let tokens: HashMap<&str, &str> = saved
            .iter()
            .filter(|e| e.is_set())
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect();

        let mut report = SyncReport::default();
        for def in self.defs {
            let enabled = channel_enabled(&config, def.name);
            match tokens.get(def.env_key) {
                Some(token) if !enabled && mode.adds() => self.add(def, token, &mut report).await,
                None if enabled && mode.removes() => self.remove(def, &mut report).await,
                _ => {}
            }
        }

        if !report.is_empty() {
            tracing::info!(
                mode = %mode,
                added = ?report.added,
                removed = ?report.removed,
                failed = ?report.failed,
                "Channel sync finished"
            );
        }
        Ok(report)
    }

    async fn add(&self, def: &ChannelDef, token: &str, report: &mut SyncReport) {
        tracing::info!(channel = def.name, "Adding channel");
        let out = self
            .cli
            .run(&["channels", "add", "--channel", def.name, "--token", token])
            .await;
        if !out.ok {
            tracing::error!(channel = def.name, "Failed to add channel: {}", out.summary());
            report.failed.push(def.name.to_string());
            return;
        }

        let secret = TrackedSecret::new(def.env_key, token);
        if let Err(e) = sanitize_config_file(&self.config_path, std::slice::from_ref(&secret)) {
            tracing::warn!(channel = def.name, error = %e, "Failed to replace channel token with env reference");
        }
        report.added.push(def.name.to_string());
    }

    async fn remove(&self, def: &ChannelDef, report: &mut SyncReport) {
        tracing::info!(channel = def.name, "Removing channel");
        let out = self
            .cli
            .run(&["channels", "remove", "--channel", def.name, "--delete"])
            .await;
        if out.ok {
            report.removed.push(def.name.to_string());
        } else {
            tracing::error!(channel = def.name, "Failed to remove channel: {}", out.summary());
            report.failed.push(def.name.to_string());
        }
    }
}

/// Pairing state of every channel enabled in the config whose token is set in `env`.
pub fn inspect_channels(
    config_path: &Path,
    credentials_dir: &Path,
    env: &dyn ProcessEnv,
) -> BTreeMap<String, ChannelStatus> {
    let Ok(config) = load_config(config_path) else {
        return BTreeMap::new();
    };
    CHANNEL_DEFS
        .iter()
        .filter(|def| channel_enabled(&config, def.name) && env.is_set(def.env_key))
        .map(|def| {
            let inline = config
                .pointer(&format!("/channels/{}/allowFrom", def.name))
                .map(count_entries)
                .unwrap_or(0);
            let paired = inline + count_allow_files(credentials_dir, def.name);
            let status = if paired > 0 {
                ChannelPairing::Paired
            } else {
                ChannelPairing::Configured
            };
            (def.name.to_string(), ChannelStatus { status, paired })
        })
        .collect()
}

fn count_entries(value: &Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or(0)
}

/// Sum `allowFrom` entries across `<channel>-*-allowFrom.json` files.
fn count_allow_files(dir: &Path, channel: &str) -> usize {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return 0;
    };
    let prefix = format!("{channel}-");
    read_dir
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with("-allowFrom.json")
        })
        .filter_map(|entry| std::fs::read_to_string(entry.path()).ok())
        .filter_map(|text| serde_json::from_str::<Value>(&text).ok())
        .map(|json| json.get("allowFrom").map(count_entries).unwrap_or(0))
        .sum()
}
