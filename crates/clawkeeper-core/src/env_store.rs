//! The credential file (`KEY=VALUE` lines) and its mirror in the process environment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use clawkeeper_schema::{is_secret_key, EnvEntry, KNOWN_VARS};

use crate::process_env::{OsEnv, ProcessEnv};

pub struct EnvStore {
    path: PathBuf,
    env: Arc<dyn ProcessEnv>,
}

impl EnvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_env(path, Arc::new(OsEnv))
    }

    pub fn with_env(path: impl Into<PathBuf>, env: Arc<dyn ProcessEnv>) -> Self {
        Self {
            path: path.into(),
            env,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn process_env(&self) -> &Arc<dyn ProcessEnv> {
        &self.env
    }

    /// Entries in file order. A missing or unreadable file reads as empty.
    pub fn read(&self) -> Vec<EnvEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_env_file(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read env file");
                Vec::new()
            }
        }
    }

    /// Replace the file contents with exactly these entries.
    pub fn write(&self, vars: &[EnvEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(&self.path, render_env_file(vars))
            .with_context(|| format!("failed to write env file {}", self.path.display()))
    }

    /// Make the process environment match the file. Returns whether anything changed.
    pub fn reload(&self) -> bool {
        let vars = self.read();
        let mut changed = false;

        for entry in &vars {
            let current = self.env.get(&entry.key).filter(|v| !v.is_empty());
            if entry.is_set() {
                if current.as_deref() != Some(entry.value.as_str()) {
                    tracing::info!("Env updated: {}={}", entry.key, display_value(entry));
                    self.env.set(&entry.key, &entry.value);
                    changed = true;
                }
            } else if current.is_some() {
                tracing::info!("Env cleared: {}", entry.key);
                self.env.remove(&entry.key);
                changed = true;
            }
        }

        let file_keys: HashSet<&str> = vars.iter().map(|v| v.key.as_str()).collect();
        for known in KNOWN_VARS {
            if !file_keys.contains(known.key) && self.env.is_set(known.key) {
                tracing::info!("Env removed: {}", known.key);
                self.env.remove(known.key);
                changed = true;
            }
        }

        changed
    }

    /// Poll the file's modification time and reload when it moves.
    ///
    /// `on_reload` receives the result of every triggered reload.
    pub fn watch<F>(self: Arc<Self>, every: Duration, on_reload: F) -> JoinHandle<()>
    where
        F: Fn(bool) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut last = modified_at(&self.path);
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = modified_at(&self.path);
                if now == last {
                    continue;
                }
                last = now;
                tracing::info!(path = %self.path.display(), "Env file changed, reloading");
                on_reload(self.reload());
            }
        })
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn display_value(entry: &EnvEntry) -> &str {
    if is_secret_key(&entry.key) {
        "***"
    } else {
        &entry.value
    }
}

/// Whether the OS accepts this pair as an environment variable.
pub fn is_exportable(key: &str, value: &str) -> bool {
    !key.is_empty() && !key.contains(['=', '\0']) && !value.contains('\0')
}

/// Whether an entry survives a write and read back unchanged as one line.
pub fn is_storable(entry: &EnvEntry) -> bool {
    is_exportable(&entry.key, &entry.value)
        && !entry.key.trim().is_empty()
        && !entry.key.contains(['\n', '\r'])
        && !entry.value.contains(['\n', '\r'])
}

/// Parse `KEY=VALUE` lines. Blank lines, comments and lines without `=` are skipped.
/// Everything after the first `=` is the value, verbatim. Pairs the OS would
/// refuse as environment variables are dropped with a warning.
pub fn parse_env_file(content: &str) -> Vec<EnvEntry> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let (key, value) = trimmed.split_once('=')?;
            if !is_exportable(key, value) {
                tracing::warn!(line = idx + 1, "Skipping malformed env file line");
                return None;
            }
            Some(EnvEntry::new(key, value))
        })
        .collect()
}

pub fn render_env_file(vars: &[EnvEntry]) -> String {
    vars.iter()
        .filter(|v| !v.key.is_empty())
        .map(|v| format!("{}={}", v.key, v.value))
        .collect::<Vec<_>>()
        .join("\n")
}
