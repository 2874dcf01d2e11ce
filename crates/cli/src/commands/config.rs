use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use jukebot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct FieldLine<'a> {
    key: &'a str,
    value: String,
    env_keys: &'a [&'a str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        FieldLine {
            key: "slack.app_token",
            value: redact_token(config.slack.app_token.expose_secret()),
            env_keys: &["JUKEBOT_SLACK_APP_TOKEN", "SLACK_APP_TOKEN"],
        },
        FieldLine {
            key: "slack.bot_token",
            value: redact_token(config.slack.bot_token.expose_secret()),
            env_keys: &["JUKEBOT_SLACK_BOT_TOKEN", "SLACK_TOKEN"],
        },
        FieldLine {
            key: "spotify.client_id",
            value: display_or_empty(&config.spotify.client_id),
            env_keys: &["JUKEBOT_SPOTIFY_CLIENT_ID", "SPOTIFY_ID"],
        },
        FieldLine {
            key: "spotify.client_secret",
            value: redact_secret(config.spotify.client_secret.expose_secret()),
            env_keys: &["JUKEBOT_SPOTIFY_CLIENT_SECRET", "SPOTIFY_SECRET"],
        },
        FieldLine {
            key: "spotify.playlist_name",
            value: display_or_empty(&config.spotify.playlist_name),
            env_keys: &["JUKEBOT_SPOTIFY_PLAYLIST", "SPOTIFY_PLAYLIST"],
        },
        FieldLine {
            key: "spotify.redirect_uri",
            value: config.spotify.redirect_uri.clone(),
            env_keys: &["JUKEBOT_SPOTIFY_REDIRECT_URI"],
        },
        FieldLine {
            key: "spotify.oauth_state",
            value: redact_secret(&config.spotify.oauth_state),
            env_keys: &["JUKEBOT_SPOTIFY_OAUTH_STATE"],
        },
        FieldLine {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["JUKEBOT_SERVER_BIND_ADDRESS"],
        },
        FieldLine {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["JUKEBOT_SERVER_PORT"],
        },
        FieldLine {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["JUKEBOT_LOGGING_LEVEL", "JUKEBOT_LOG_LEVEL"],
        },
        FieldLine {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["JUKEBOT_LOGGING_FORMAT", "JUKEBOT_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        render_line(field.key, &field.value, source)
    }));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["jukebot.toml", "config/jukebot.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn display_or_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "<empty>".to_string()
    } else {
        value.to_string()
    }
}

/// Slack tokens keep their kind prefix (`xapp`, `xoxb`) so a swapped
/// token is still visible in the output.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
