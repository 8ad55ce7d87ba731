//! One-shot invocations of the gateway CLI.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::settings::Settings;

/// Longest command output carried into a log line.
pub const LOG_OUTPUT_LIMIT: usize = 200;

pub const GATEWAY_STOP: &[&str] = &["gateway", "stop"];
pub const GATEWAY_INSTALL: &[&str] = &["gateway", "install", "--force"];
pub const GATEWAY_RUN: &[&str] = &["gateway", "run"];

static TOKEN_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(ghp_|github_pat_|sk-)[A-Za-z0-9_\-]+").expect("token pattern is valid")
});

/// Result of a gateway CLI call. Failures are data, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Short, log-safe description of what the command printed.
    pub fn summary(&self) -> String {
        let text = if !self.stderr.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        };
        if text.is_empty() {
            return match (self.timed_out, self.code) {
                (true, _) => "timed out".to_string(),
                (false, Some(code)) => format!("exit code {code}"),
                (false, None) => "no output".to_string(),
            };
        }
        redact(&truncate(text, LOG_OUTPUT_LIMIT))
    }
}

#[async_trait]
pub trait GatewayCli: Send + Sync {
    async fn run(&self, args: &[&str]) -> CommandOutput;
}

/// Runs the real gateway binary with the gateway environment layered on top.
pub struct OpenclawCli {
    bin: String,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl OpenclawCli {
    pub fn new(settings: &Settings) -> Self {
        Self {
            bin: settings.gateway_bin.clone(),
            env: settings.gateway_env(),
            timeout: settings.command_timeout,
        }
    }
}

#[async_trait]
impl GatewayCli for OpenclawCli {
    async fn run(&self, args: &[&str]) -> CommandOutput {
        let line = redact_command_line(&self.bin, args);
        tracing::info!("Running: {line}");

        let child = Command::new(&self.bin)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %line, error = %e, "Failed to spawn gateway command");
                return CommandOutput::failure(e.to_string());
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => CommandOutput {
                ok: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                code: output.status.code(),
                timed_out: false,
            },
            Ok(Err(e)) => CommandOutput::failure(e.to_string()),
            Err(_) => CommandOutput {
                timed_out: true,
                ..CommandOutput::default()
            },
        };

        if output.ok {
            let stdout = output.stdout.trim();
            if !stdout.is_empty() {
                tracing::info!("{}", redact(&truncate(stdout, LOG_OUTPUT_LIMIT)));
            }
        } else {
            tracing::warn!(
                command = %line,
                code = ?output.code,
                timed_out = output.timed_out,
                "Gateway command failed: {}",
                output.summary()
            );
        }
        output
    }
}

/// Render a command for logs with token arguments masked.
pub fn redact_command_line(bin: &str, args: &[&str]) -> String {
    let mut parts = vec![bin.to_string()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push("***".to_string());
            mask_next = false;
            continue;
        }
        mask_next = *arg == "--token";
        parts.push(redact(arg));
    }
    parts.join(" ")
}

/// Mask well-known token shapes inside free text.
pub fn redact(text: &str) -> String {
    TOKEN_LIKE.replace_all(text, "${1}***").into_owned()
}

/// Cut `text` to at most `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_argument_is_masked() {
        let line = redact_command_line(
            "openclaw",
            &["channels", "add", "--channel", "telegram", "--token", "123:secret"],
        );
        assert_eq!(
            line,
            "openclaw channels add --channel telegram --token ***"
        );
    }

    #[test]
    fn token_shapes_are_masked_in_text() {
        assert_eq!(
            redact("auth with ghp_abcDEF123 failed"),
            "auth with ghp_*** failed"
        );
        assert_eq!(redact("key sk-live_xyz"), "key sk-***");
        assert_eq!(redact("nothing here"), "nothing here");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn summary_prefers_stderr_and_truncates() {
        let mut out = CommandOutput::failure("x".repeat(500));
        out.stdout = "ignored".into();
        assert_eq!(out.summary().chars().count(), LOG_OUTPUT_LIMIT + 3);

        let timed_out = CommandOutput {
            timed_out: true,
            ..CommandOutput::default()
        };
        assert_eq!(timed_out.summary(), "timed out");
    }

    #[tokio::test]
    async fn missing_binary_is_a_failed_output() {
        let settings = Settings {
            gateway_bin: "/nonexistent/openclaw-binary".into(),
            ..Settings::default()
        };
        let out = OpenclawCli::new(&settings).run(GATEWAY_STOP).await;
        assert!(!out.ok);
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let settings = Settings {
            gateway_bin: "sleep".into(),
            command_timeout: Duration::from_millis(100),
            ..Settings::default()
        };
        let out = OpenclawCli::new(&settings).run(&["5"]).await;
        assert!(!out.ok);
        assert!(out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let settings = Settings {
            gateway_bin: "sh".into(),
            ..Settings::default()
        };
        let cli = OpenclawCli::new(&settings);
        let out = cli.run(&["-c", "echo $OPENCLAW_HOME; exit 3"]).await;
        assert!(!out.ok);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "/data");
    }
}
