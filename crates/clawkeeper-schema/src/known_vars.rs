use serde::Serialize;

use crate::VarGroup;

/// A credential the dashboard knows how to label and group.
#[derive(Debug, Clone, Serialize)]
pub struct KnownVar {
    pub key: &'static str,
    pub label: &'static str,
    pub group: VarGroup,
    pub hint: &'static str,
}

pub const KNOWN_VARS: &[KnownVar] = &[
    KnownVar {
        key: "ANTHROPIC_API_KEY",
        label: "Anthropic API Key",
        group: VarGroup::Models,
        hint: "From console.anthropic.com",
    },
    KnownVar {
        key: "ANTHROPIC_TOKEN",
        label: "Anthropic Setup Token",
        group: VarGroup::Models,
        hint: "From claude setup-token",
    },
    KnownVar {
        key: "OPENAI_API_KEY",
        label: "OpenAI API Key",
        group: VarGroup::Models,
        hint: "From platform.openai.com",
    },
    KnownVar {
        key: "GEMINI_API_KEY",
        label: "Gemini API Key",
        group: VarGroup::Models,
        hint: "From aistudio.google.com",
    },
    KnownVar {
        key: "GITHUB_TOKEN",
        label: "GitHub Access Token",
        group: VarGroup::Github,
        hint: "Create one with repo scope at github.com/settings/tokens",
    },
    KnownVar {
        key: "GITHUB_WORKSPACE_REPO",
        label: "Workspace Repo",
        group: VarGroup::Github,
        hint: "username/repo or https://github.com/username/repo",
    },
    KnownVar {
        key: "TELEGRAM_BOT_TOKEN",
        label: "Telegram Bot Token",
        group: VarGroup::Channels,
        hint: "From @BotFather",
    },
    KnownVar {
        key: "DISCORD_BOT_TOKEN",
        label: "Discord Bot Token",
        group: VarGroup::Channels,
        hint: "From Discord Developer Portal",
    },
    KnownVar {
        key: "BRAVE_API_KEY",
        label: "Brave Search API Key",
        group: VarGroup::Tools,
        hint: "From brave.com/search/api",
    },
];

/// Keys owned by the deployment. Never listed, never written from the dashboard.
pub const SYSTEM_VARS: &[&str] = &[
    "WEBHOOK_TOKEN",
    "OPENCLAW_GATEWAY_TOKEN",
    "SETUP_PASSWORD",
    "PORT",
    "OPENCLAW_STATE_DIR",
    "OPENCLAW_WORKSPACE_DIR",
];

/// A messaging channel whose enablement follows a single token credential.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelDef {
    pub name: &'static str,
    pub env_key: &'static str,
    /// Field holding the token inside `channels.<name>` of the gateway config.
    pub token_field: &'static str,
}

pub const CHANNEL_DEFS: &[ChannelDef] = &[
    ChannelDef {
        name: "telegram",
        env_key: "TELEGRAM_BOT_TOKEN",
        token_field: "botToken",
    },
    ChannelDef {
        name: "discord",
        env_key: "DISCORD_BOT_TOKEN",
        token_field: "token",
    },
];

/// Look up a known credential by key.
pub fn known_var(key: &str) -> Option<&'static KnownVar> {
    KNOWN_VARS.iter().find(|v| v.key == key)
}

pub fn is_system_var(key: &str) -> bool {
    SYSTEM_VARS.contains(&key)
}

/// Keys whose values must never reach a log line.
pub fn is_secret_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["token", "key", "password"]
        .iter()
        .any(|needle| lower.contains(needle))
}
