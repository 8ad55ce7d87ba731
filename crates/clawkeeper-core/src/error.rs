use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("gateway config not found at {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to access gateway config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse gateway config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("gateway config {} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),
    #[error("failed to serialize gateway config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Operations refused before they touch anything.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeeperError {
    #[error("Not onboarded")]
    NotOnboarded,
    #[error("Missing vars array")]
    MissingVars,
}
