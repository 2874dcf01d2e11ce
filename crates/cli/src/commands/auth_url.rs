use jukebot_core::config::{AppConfig, LoadOptions};
use jukebot_spotify::AuthorizationRequest;

use super::CommandResult;

/// Authorization URL for the configured client. The running server only
/// accepts a callback carrying its own state, so a generated state is refused.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("auth-url", "config_validation", error.to_string(), 2)
        }
    };

    if config.spotify.client_id.trim().is_empty() {
        return CommandResult::failure(
            "auth-url",
            "missing_client_id",
            "spotify.client_id is empty; set JUKEBOT_SPOTIFY_CLIENT_ID or SPOTIFY_ID",
            2,
        );
    }

    if config.spotify.oauth_state_generated {
        return CommandResult::failure(
            "auth-url",
            "ephemeral_state",
            "spotify.oauth_state is not configured, so the server generates its own; set \
             JUKEBOT_SPOTIFY_OAUTH_STATE for both processes or use the URL the server logs",
            2,
        );
    }

    match AuthorizationRequest::from_config(&config.spotify).authorize_url() {
        Ok(url) => CommandResult::success("auth-url", url),
        Err(error) => CommandResult::failure("auth-url", "invalid_url", error.to_string(), 1),
    }
}
