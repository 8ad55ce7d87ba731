//! Reading and writing the gateway's JSON config.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

pub fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::Missing(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

pub fn parse_config(path: &Path, text: &str) -> Result<Value, ConfigError> {
    serde_json::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config(path: &Path) -> Result<Value, ConfigError> {
    let text = read_config_text(path)?;
    parse_config(path, &text)
}

pub fn write_config_text(path: &Path, text: &str) -> Result<(), ConfigError> {
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `channels.<name>.enabled`, treating anything but `true` as disabled.
pub fn channel_enabled(config: &Value, name: &str) -> bool {
    config
        .get("channels")
        .and_then(|c| c.get(name))
        .and_then(|c| c.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
