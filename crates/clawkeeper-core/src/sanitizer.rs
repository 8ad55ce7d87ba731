//! Keeps literal secrets out of the gateway config by swapping them for
//! `${ENV_KEY}` references the gateway resolves at load time.

use std::path::Path;

use serde_json::{json, Map, Value};

use clawkeeper_schema::{is_secret_key, EnvEntry, CHANNEL_DEFS};

use crate::error::ConfigError;
use crate::gateway_config::{load_config, parse_config, read_config_text, write_config_text};

/// Secrets this short are left alone; they collide with ordinary config values.
pub const MIN_SECRET_LEN: usize = 8;

pub const GATEWAY_TOKEN_KEY: &str = "OPENCLAW_GATEWAY_TOKEN";

const BOOTSTRAP_HOOK: &str = "bootstrap-extra-files";
const BOOTSTRAP_PATHS: &[&str] = &["hooks/bootstrap/AGENTS.md", "hooks/bootstrap/TOOLS.md"];

/// A literal secret and the environment variable that should stand in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSecret {
    pub env_key: String,
    pub value: String,
}

impl TrackedSecret {
    pub fn new(env_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            value: value.into(),
        }
    }

    pub fn reference(&self) -> String {
        format!("${{{}}}", self.env_key)
    }

    fn long_enough(&self) -> bool {
        self.value.chars().count() > MIN_SECRET_LEN
    }
}

/// Secret-like entries long enough to substitute safely.
pub fn secrets_from_entries(entries: &[EnvEntry]) -> Vec<TrackedSecret> {
    entries
        .iter()
        .filter(|e| is_secret_key(&e.key))
        .map(|e| TrackedSecret::new(&e.key, &e.value))
        .filter(TrackedSecret::long_enough)
        .collect()
}

/// Replace every occurrence of each secret in serialized config text.
///
/// Longer secrets go first so a secret that contains another is not split.
/// Returns the new text and the number of replacements made.
pub fn substitute_secrets(text: &str, secrets: &[TrackedSecret]) -> (String, usize) {
    let mut ordered: Vec<&TrackedSecret> = secrets
        .iter()
        .filter(|s| !s.value.is_empty())
        .filter(|s| {
            let safe = is_reference_safe(&s.env_key);
            if !safe {
                tracing::warn!(
                    key = ?s.env_key,
                    "Secret key cannot be written as a reference, leaving value in place"
                );
            }
            safe
        })
        .collect();
    ordered.sort_by(|a, b| b.value.len().cmp(&a.value.len()));

    let mut out = text.to_string();
    let mut count = 0;
    for secret in ordered {
        let needle = json_escaped(&secret.value);
        let hits = out.matches(needle.as_str()).count();
        if hits > 0 {
            out = out.replace(needle.as_str(), &secret.reference());
            count += hits;
        }
    }
    (out, count)
}

/// Substitute secrets in the config file in place.
///
/// The file must parse as JSON both before and after substitution, or
/// nothing is written; bytes other than the replaced secrets are kept as
/// they were.
pub fn sanitize_config_file(path: &Path, secrets: &[TrackedSecret]) -> Result<usize, ConfigError> {
    let text = read_config_text(path)?;
    parse_config(path, &text)?;

    let (sanitized, count) = substitute_secrets(&text, secrets);
    if count > 0 {
        parse_config(path, &sanitized)?;
        write_config_text(path, &sanitized)?;
        tracing::info!(path = %path.display(), count, "Replaced literal secrets with env references");
    }
    Ok(count)
}

/// Post-onboarding normalization: channel sections for present tokens, the
/// restart command, internal hooks, then a secret sweep.
pub fn normalize_onboarded_config(
    path: &Path,
    entries: &[EnvEntry],
    gateway_token: Option<&str>,
) -> Result<(), ConfigError> {
    let mut cfg = load_config(path)?;
    if !cfg.is_object() {
        return Err(ConfigError::NotAnObject(path.to_path_buf()));
    }

    let channels = object_slot(&mut cfg, "channels");
    for def in CHANNEL_DEFS {
        let Some(token) = entries
            .iter()
            .find(|e| e.key == def.env_key && e.is_set())
            .map(|e| e.value.as_str())
        else {
            continue;
        };
        let section = object_slot(channels, def.name);
        section["enabled"] = json!(true);
        section[def.token_field] = json!(token);
        section["dmPolicy"] = json!("pairing");
        section["groupPolicy"] = json!("allowlist");
    }

    object_slot(&mut cfg, "commands")["restart"] = json!(true);

    let internal = object_slot(object_slot(&mut cfg, "hooks"), "internal");
    internal["enabled"] = json!(true);
    let bootstrap = object_slot(object_slot(internal, "entries"), BOOTSTRAP_HOOK);
    bootstrap["enabled"] = json!(true);
    bootstrap["paths"] = json!(BOOTSTRAP_PATHS);

    let mut secrets = secrets_from_entries(entries);
    if let Some(token) = gateway_token {
        let secret = TrackedSecret::new(GATEWAY_TOKEN_KEY, token);
        if secret.long_enough() {
            secrets.push(secret);
        }
    }

    let text = serde_json::to_string_pretty(&cfg)?;
    let (sanitized, count) = substitute_secrets(&text, &secrets);
    parse_config(path, &sanitized)?;
    write_config_text(path, &sanitized)?;
    tracing::info!(path = %path.display(), replaced = count, "Gateway config normalized");
    Ok(())
}

/// `parent[key]` as an object, replacing whatever non-object value was there.
fn object_slot<'a>(parent: &'a mut Value, key: &str) -> &'a mut Value {
    if !parent.is_object() {
        *parent = Value::Object(Map::new());
    }
    let slot = &mut parent[key];
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot
}

fn json_escaped(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// `${KEY}` must stay a valid JSON string body and a single reference.
fn is_reference_safe(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '"' | '\\' | '{' | '}') || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TG: &str = "123456:telegram-secret-token";

    #[test]
    fn substitution_replaces_every_occurrence() {
        let text = format!(r#"{{"a":"{TG}","b":["{TG}"]}}"#);
        let (out, count) = substitute_secrets(&text, &[TrackedSecret::new("TELEGRAM_BOT_TOKEN", TG)]);
        assert_eq!(count, 2);
        assert!(!out.contains(TG));
        assert_eq!(out.matches("${TELEGRAM_BOT_TOKEN}").count(), 2);
        serde_json::from_str::<Value>(&out).unwrap();
    }

    #[test]
    fn longer_secret_wins_over_contained_one() {
        let short = TrackedSecret::new("SHORT_KEY", "abcdefghij");
        let long = TrackedSecret::new("LONG_KEY", "abcdefghij-and-more");
        let text = r#"{"x":"abcdefghij-and-more","y":"abcdefghij"}"#;
        let (out, _) = substitute_secrets(text, &[short, long]);
        assert_eq!(out, r#"{"x":"${LONG_KEY}","y":"${SHORT_KEY}"}"#);
    }

    #[test]
    fn secrets_from_entries_skips_short_and_non_secret() {
        let entries = vec![
            EnvEntry::new("OPENAI_API_KEY", "sk-0123456789"),
            EnvEntry::new("BRAVE_API_KEY", "short"),
            EnvEntry::new("GITHUB_WORKSPACE_REPO", "someone/some-long-repo"),
        ];
        let secrets = secrets_from_entries(&entries);
        assert_eq!(secrets, vec![TrackedSecret::new("OPENAI_API_KEY", "sk-0123456789")]);
    }

    #[test]
    fn escaped_secret_is_found_in_json_text() {
        let value = r#"pa"ss\word-long"#;
        let text = serde_json::to_string(&json!({ "k": value })).unwrap();
        let (out, count) = substitute_secrets(&text, &[TrackedSecret::new("SETUP_PASSWORD", value)]);
        assert_eq!(count, 1);
        assert_eq!(out, r#"{"k":"${SETUP_PASSWORD}"}"#);
    }

    #[test]
    fn sanitize_file_leaves_other_bytes_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let before = format!("{{\n  \"z\": 1,\n    \"token\": \"{TG}\"  ,\"a\": 2\n}}");
        std::fs::write(&path, &before).unwrap();

        let count =
            sanitize_config_file(&path, &[TrackedSecret::new("TELEGRAM_BOT_TOKEN", TG)]).unwrap();
        assert_eq!(count, 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, before.replace(TG, "${TELEGRAM_BOT_TOKEN}"));
    }

    #[test]
    fn sanitize_refuses_unparseable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        std::fs::write(&path, format!("{{\"token\": \"{TG}\"")).unwrap();
        let err = sanitize_config_file(&path, &[TrackedSecret::new("TELEGRAM_BOT_TOKEN", TG)])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(std::fs::read_to_string(&path).unwrap().contains(TG));
    }

    #[test]
    fn sanitize_keeps_file_when_substitution_breaks_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let before = r#"{"channels":{"telegram":{"allowFrom":[5550001234]}}}"#;
        std::fs::write(&path, before).unwrap();

        let err = sanitize_config_file(&path, &[TrackedSecret::new("SOME_API_KEY", "5550001234")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn normalize_keeps_file_when_substitution_breaks_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let before = r#"{"channels":{"telegram":{"allowFrom":[5550001234]}}}"#;
        std::fs::write(&path, before).unwrap();
        let entries = vec![EnvEntry::new("SOME_API_KEY", "5550001234")];

        let err = normalize_onboarded_config(&path, &entries, None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn dashed_key_is_still_substituted() {
        let text = r#"{"apiKey":"dashed-secret-value"}"#;
        let (out, count) =
            substitute_secrets(text, &[TrackedSecret::new("MY-API-KEY", "dashed-secret-value")]);
        assert_eq!(count, 1);
        assert_eq!(out, r#"{"apiKey":"${MY-API-KEY}"}"#);
    }

    #[test]
    fn key_that_would_break_the_reference_is_skipped() {
        let text = r#"{"apiKey":"braced-secret-value"}"#;
        let (out, count) =
            substitute_secrets(text, &[TrackedSecret::new("BAD}KEY", "braced-secret-value")]);
        assert_eq!(count, 0);
        assert_eq!(out, text);
    }

    #[test]
    fn normalize_fills_sections_and_strips_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        std::fs::write(&path, r#"{"gateway":{"auth":{"token":"gw-token-1234567"}},"commands":5}"#)
            .unwrap();
        let entries = vec![
            EnvEntry::new("TELEGRAM_BOT_TOKEN", TG),
            EnvEntry::new("DISCORD_BOT_TOKEN", ""),
        ];

        normalize_onboarded_config(&path, &entries, Some("gw-token-1234567")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains(TG));
        assert!(!text.contains("gw-token-1234567"));
        let cfg: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg["gateway"]["auth"]["token"], "${OPENCLAW_GATEWAY_TOKEN}");
        assert_eq!(cfg["channels"]["telegram"]["enabled"], true);
        assert_eq!(cfg["channels"]["telegram"]["botToken"], "${TELEGRAM_BOT_TOKEN}");
        assert_eq!(cfg["channels"]["telegram"]["dmPolicy"], "pairing");
        assert!(cfg["channels"].get("discord").is_none());
        assert_eq!(cfg["commands"]["restart"], true);
        assert_eq!(cfg["hooks"]["internal"]["enabled"], true);
        assert_eq!(
            cfg["hooks"]["internal"]["entries"]["bootstrap-extra-files"]["paths"],
            json!(["hooks/bootstrap/AGENTS.md", "hooks/bootstrap/TOOLS.md"])
        );
        // Existing key order survives.
        let keys: Vec<&str> = cfg.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(&keys[..2], &["gateway", "commands"]);
    }

    #[test]
    fn normalize_rejects_non_object_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        std::fs::write(&path, "[1,2]").unwrap();
        assert!(matches!(
            normalize_onboarded_config(&path, &[], None).unwrap_err(),
            ConfigError::NotAnObject(_)
        ));
    }
}
