use jukebot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use url::Url;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] =
    ["slack_token_readiness", "spotify_credentials", "redirect_listener"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_spotify_credentials(&config));
            checks.push(check_redirect_listener(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let missing = missing_fields(&[
        ("slack.app_token", config.slack.app_token.expose_secret()),
        ("slack.bot_token", config.slack.bot_token.expose_secret()),
    ]);

    if missing.is_empty() {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: "app and bot tokens present; prefixes validated by config contract"
                .to_string(),
        }
    } else {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: format!("missing {}", missing.join(", ")),
        }
    }
}

fn check_spotify_credentials(config: &AppConfig) -> DoctorCheck {
    let missing = missing_fields(&[
        ("spotify.client_id", config.spotify.client_id.as_str()),
        ("spotify.client_secret", config.spotify.client_secret.expose_secret()),
        ("spotify.playlist_name", config.spotify.playlist_name.as_str()),
    ]);

    if missing.is_empty() {
        DoctorCheck {
            name: "spotify_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "client credentials present; target playlist `{}`",
                config.spotify.playlist_name
            ),
        }
    } else {
        DoctorCheck {
            name: "spotify_credentials",
            status: CheckStatus::Fail,
            details: format!("missing {}", missing.join(", ")),
        }
    }
}

fn check_redirect_listener(config: &AppConfig) -> DoctorCheck {
    let redirect_uri = &config.spotify.redirect_uri;
    match redirect_port(redirect_uri) {
        Some(port) if port == config.server.port => DoctorCheck {
            name: "redirect_listener",
            status: CheckStatus::Pass,
            details: format!(
                "callback {} served on {}:{}",
                config.spotify.callback_path(),
                config.server.bind_address,
                config.server.port
            ),
        },
        Some(port) => DoctorCheck {
            name: "redirect_listener",
            status: CheckStatus::Fail,
            details: format!(
                "redirect_uri `{redirect_uri}` targets port {port} but server.port is {}",
                config.server.port
            ),
        },
        None => DoctorCheck {
            name: "redirect_listener",
            status: CheckStatus::Fail,
            details: format!("redirect_uri `{redirect_uri}` has no usable port"),
        },
    }
}

fn missing_fields<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

fn redirect_port(uri: &str) -> Option<u16> {
    Url::parse(uri.trim()).ok()?.port_or_known_default()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::redirect_port;

    #[test]
    fn redirect_port_falls_back_to_scheme_default() {
        assert_eq!(redirect_port("http://localhost:8080/callback"), Some(8080));
        assert_eq!(redirect_port("https://jukebot.example.com/callback"), Some(443));
        assert_eq!(redirect_port("http://[::1]/callback"), Some(80));
        assert_eq!(redirect_port("not a uri"), None);
    }
}
