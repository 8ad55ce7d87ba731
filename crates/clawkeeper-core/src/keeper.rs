//! The operations the dashboard and the CLI drive, wired over the components.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use clawkeeper_schema::{
    is_system_var, known_var, EnvEntry, EnvListResponse, EnvVar, GatewayState, SaveEnvResponse,
    StatusResponse, SyncMode, VarGroup, VarSource, KNOWN_VARS,
};

use crate::channel_sync::{inspect_channels, ChannelReconciler};
use crate::commands::{GatewayCli, OpenclawCli};
use crate::env_store::{is_storable, EnvStore};
use crate::error::{ConfigError, KeeperError};
use crate::health::{HealthProbe, TcpProbe};
use crate::process_env::{OsEnv, ProcessEnv};
use crate::restart_flag::RestartFlag;
use crate::sanitizer::{normalize_onboarded_config, sanitize_config_file, secrets_from_entries};
use crate::settings::Settings;
use crate::supervisor::{ChildLauncher, GatewayLauncher, ProcessSupervisor, SupervisorState};

/// The seams a [`Keeper`] talks to the outside world through.
pub struct KeeperDeps {
    pub env: Arc<dyn ProcessEnv>,
    pub cli: Arc<dyn GatewayCli>,
    pub launcher: Arc<dyn GatewayLauncher>,
    pub probe: Arc<dyn HealthProbe>,
}

impl KeeperDeps {
    /// The real environment, binary and port.
    pub fn system(settings: &Settings) -> Self {
        Self {
            env: Arc::new(OsEnv),
            cli: Arc::new(OpenclawCli::new(settings)),
            launcher: Arc::new(ChildLauncher::new(settings)),
            probe: Arc::new(TcpProbe::new(
                settings.gateway_addr(),
                settings.probe_timeout,
            )),
        }
    }
}

pub struct Keeper {
    settings: Settings,
    env: Arc<dyn ProcessEnv>,
    env_store: Arc<EnvStore>,
    channels: ChannelReconciler,
    supervisor: Arc<ProcessSupervisor>,
    restart_flag: Arc<RestartFlag>,
}

impl Keeper {
    pub fn new(settings: Settings) -> Self {
        let deps = KeeperDeps::system(&settings);
        Self::with_deps(settings, deps)
    }

    pub fn with_deps(settings: Settings, deps: KeeperDeps) -> Self {
        let restart_flag = Arc::new(RestartFlag::new());
        let env_store = Arc::new(EnvStore::with_env(
            settings.env_file.clone(),
            Arc::clone(&deps.env),
        ));
        let channels = ChannelReconciler::new(settings.config_path(), Arc::clone(&deps.cli));
        let supervisor = Arc::new(ProcessSupervisor::new(
            settings.clone(),
            deps.cli,
            deps.launcher,
            deps.probe,
            Arc::clone(&restart_flag),
        ));
        Self {
            settings,
            env: deps.env,
            env_store,
            channels,
            supervisor,
            restart_flag,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn env_store(&self) -> &Arc<EnvStore> {
        &self.env_store
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn restart_required(&self) -> bool {
        self.restart_flag.is_set()
    }

    pub fn is_onboarded(&self) -> bool {
        self.settings.is_onboarded()
    }

    /// Known credentials first, in table order, then custom keys in file order.
    ///
    /// A key repeated in the file is listed once, at its first position, with
    /// its last value: the value [`EnvStore::reload`] exports.
    pub fn list_credentials(&self) -> EnvListResponse {
        let saved = self.env_store.read();
        let values: HashMap<&str, &str> = saved
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect();

        let mut vars: Vec<EnvVar> = KNOWN_VARS
            .iter()
            .map(|known| {
                let value = values.get(known.key).copied().unwrap_or_default();
                EnvVar {
                    key: known.key.to_string(),
                    value: value.to_string(),
                    label: known.label.to_string(),
                    group: known.group,
                    hint: known.hint.to_string(),
                    source: if value.is_empty() {
                        VarSource::Unset
                    } else {
                        VarSource::EnvFile
                    },
                    editable: true,
                }
            })
            .collect();

        let mut seen = HashSet::new();
        for entry in &saved {
            let key = entry.key.as_str();
            if known_var(key).is_some() || is_system_var(key) || !seen.insert(key) {
                continue;
            }
            vars.push(EnvVar {
                key: key.to_string(),
                value: values.get(key).copied().unwrap_or_default().to_string(),
                label: key.to_string(),
                group: VarGroup::Custom,
                hint: String::new(),
                source: VarSource::EnvFile,
                editable: true,
            });
        }

        EnvListResponse {
            vars,
            restart_required: self.restart_flag.is_set(),
        }
    }

    /// Save a full replacement of the credential list.
    ///
    /// Channels losing their token are removed before the file changes and
    /// channels gaining one are added after the reload, so the gateway never
    /// sees a registration without its credential.
    pub async fn replace_credentials(&self, vars: Vec<EnvEntry>) -> Result<SaveEnvResponse> {
        let filtered: Vec<EnvEntry> = vars
            .into_iter()
            .filter(|v| {
                if !is_storable(v) {
                    tracing::warn!(key = ?v.key, "Dropping credential that cannot be stored");
                    return false;
                }
                !is_system_var(&v.key)
            })
            .collect();
        let onboarded = self.is_onboarded();

        if onboarded {
            self.sync_channels(&filtered, SyncMode::Remove).await;
        }
        self.env_store.write(&filtered)?;
        let changed = self.env_store.reload();

        if onboarded {
            self.sync_channels(&filtered, SyncMode::Add).await;
            if let Err(e) =
                sanitize_config_file(&self.settings.config_path(), &secrets_from_entries(&filtered))
            {
                tracing::warn!(error = %e, "Failed to sanitize gateway config after save");
            }
            if changed {
                self.restart_flag.set();
            }
        }

        tracing::info!(count = filtered.len(), changed, "Credentials saved");
        Ok(SaveEnvResponse {
            ok: true,
            changed,
            restart_required: self.restart_flag.is_set(),
        })
    }

    /// Reload the credential file into the environment, flagging a restart
    /// when an onboarded gateway is now running with stale values.
    pub fn reload_env(&self) -> bool {
        let changed = self.env_store.reload();
        if changed && self.is_onboarded() {
            self.restart_flag.set();
        }
        changed
    }

    pub async fn restart(&self) -> Result<JoinHandle<()>, KeeperError> {
        if !self.is_onboarded() {
            return Err(KeeperError::NotOnboarded);
        }
        let store = Arc::clone(&self.env_store);
        Ok(self.supervisor.restart(move || store.reload()).await)
    }

    pub async fn status(&self) -> StatusResponse {
        let config_exists = self.is_onboarded();
        let gateway = match self.supervisor.state().await {
            SupervisorState::Restarting => GatewayState::Restarting,
            SupervisorState::Running => GatewayState::Running,
            SupervisorState::Stopped if config_exists => GatewayState::Starting,
            SupervisorState::Stopped => GatewayState::NotOnboarded,
        };
        StatusResponse {
            gateway,
            config_exists,
            channels: inspect_channels(
                &self.settings.config_path(),
                &self.settings.credentials_dir(),
                self.env.as_ref(),
            ),
            restart_required: self.restart_flag.is_set(),
        }
    }

    /// Startup reconciliation: load credentials, repair channel drift left by
    /// an interrupted save, then launch the gateway.
    pub async fn bootstrap(&self) {
        if !self.is_onboarded() {
            tracing::info!("Not onboarded yet, waiting for setup");
            return;
        }
        self.env_store.reload();
        let saved = self.env_store.read();
        self.sync_channels(&saved, SyncMode::All).await;
        self.supervisor.start().await;
    }

    /// Normalize the gateway config against the saved credentials.
    pub fn normalize_config(&self, gateway_token: Option<&str>) -> Result<(), ConfigError> {
        let saved = self.env_store.read();
        normalize_onboarded_config(&self.settings.config_path(), &saved, gateway_token)
    }

    /// Normalize the freshly written gateway config and bring the gateway up.
    pub async fn finalize_onboarding(&self, gateway_token: Option<&str>) -> Result<(), ConfigError> {
        self.normalize_config(gateway_token)?;
        self.env_store.reload();
        self.supervisor.start().await;
        Ok(())
    }

    /// Follow external edits of the credential file.
    pub fn watch_env_file(&self) -> JoinHandle<()> {
        let flag = Arc::clone(&self.restart_flag);
        let settings = self.settings.clone();
        Arc::clone(&self.env_store).watch(self.settings.env_watch_interval, move |changed| {
            if changed && settings.is_onboarded() {
                flag.set();
            }
        })
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    async fn sync_channels(&self, saved: &[EnvEntry], mode: SyncMode) {
        if let Err(e) = self.channels.sync(saved, mode).await {
            tracing::warn!(mode = %mode, error = %e, "Channel sync skipped");
        }
    }
}
