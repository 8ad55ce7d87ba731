use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STATE_DIR: &str = "/data/.openclaw";
pub const DEFAULT_HOME_DIR: &str = "/data";
pub const DEFAULT_ENV_FILE: &str = "/data/.env";
pub const DEFAULT_GATEWAY_BIN: &str = "openclaw";
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;
pub const CONFIG_FILE_NAME: &str = "openclaw.json";

/// Paths, ports and timings shared by every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub state_dir: PathBuf,
    pub home_dir: PathBuf,
    pub env_file: PathBuf,
    pub gateway_bin: String,
    pub gateway_host: IpAddr,
    pub gateway_port: u16,
    /// Upper bound for every one-shot gateway CLI invocation.
    pub command_timeout: Duration,
    pub probe_timeout: Duration,
    pub restart_poll_interval: Duration,
    /// How long a restart waits for the old gateway to release its port.
    pub restart_wait: Duration,
    pub env_watch_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            home_dir: PathBuf::from(DEFAULT_HOME_DIR),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            gateway_bin: DEFAULT_GATEWAY_BIN.to_string(),
            gateway_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            gateway_port: DEFAULT_GATEWAY_PORT,
            command_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(1),
            restart_poll_interval: Duration::from_millis(250),
            restart_wait: Duration::from_secs(8),
            env_watch_interval: Duration::from_secs(2),
        }
    }
}

impl Settings {
    /// Settings rooted at `state_dir` with every other field defaulted.
    pub fn for_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE_NAME)
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.state_dir.join("credentials")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn gateway_addr(&self) -> SocketAddr {
        SocketAddr::new(self.gateway_host, self.gateway_port)
    }

    /// Onboarding has completed once the gateway config exists.
    pub fn is_onboarded(&self) -> bool {
        self.config_path().exists()
    }

    /// Variables layered over the supervisor's own environment for every gateway command.
    pub fn gateway_env(&self) -> Vec<(String, String)> {
        vec![
            (
                "OPENCLAW_HOME".to_string(),
                self.home_dir.display().to_string(),
            ),
            (
                "OPENCLAW_CONFIG_PATH".to_string(),
                self.config_path().display().to_string(),
            ),
            (
                "XDG_CONFIG_HOME".to_string(),
                self.state_dir.display().to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_follow_state_dir() {
        let settings = Settings::for_state_dir("/tmp/oc");
        assert_eq!(settings.config_path(), PathBuf::from("/tmp/oc/openclaw.json"));
        assert_eq!(settings.credentials_dir(), PathBuf::from("/tmp/oc/credentials"));
        assert_eq!(settings.log_dir(), PathBuf::from("/tmp/oc/logs"));
    }

    #[test]
    fn gateway_env_points_at_config() {
        let settings = Settings::for_state_dir("/tmp/oc");
        let env = settings.gateway_env();
        assert!(env.contains(&("OPENCLAW_HOME".into(), "/data".into())));
        assert!(env.contains(&(
            "OPENCLAW_CONFIG_PATH".into(),
            "/tmp/oc/openclaw.json".into()
        )));
        assert!(env.contains(&("XDG_CONFIG_HOME".into(), "/tmp/oc".into())));
    }

    #[test]
    fn onboarded_tracks_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::for_state_dir(dir.path());
        assert!(!settings.is_onboarded());
        std::fs::write(settings.config_path(), "{}").unwrap();
        assert!(settings.is_onboarded());
    }

    #[test]
    fn default_gateway_addr_is_loopback() {
        assert_eq!(
            Settings::default().gateway_addr().to_string(),
            "127.0.0.1:18789"
        );
    }
}
