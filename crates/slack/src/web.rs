use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::messages::{MessagePoster, PostError};

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Slack error codes that mean the configured tokens will never work.
const FATAL_AUTH_ERRORS: &[&str] = &["invalid_auth", "not_authed", "account_inactive"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack api request failed: {0}")]
    Transport(String),
    #[error("slack api returned error `{0}`")]
    Api(String),
}

impl SlackApiError {
    pub fn is_invalid_auth(&self) -> bool {
        matches!(self, Self::Api(code) if FATAL_AUTH_ERRORS.contains(&code.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

impl ApiResponse {
    fn into_result(self) -> Result<Self, SlackApiError> {
        if self.ok {
            Ok(self)
        } else {
            Err(SlackApiError::Api(self.error.unwrap_or_else(|| "unknown_error".to_owned())))
        }
    }
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    as_user: bool,
}

/// Slack Web API calls used by the bot: identity, Socket Mode URL, and posting.
#[derive(Clone)]
pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl std::fmt::Debug for SlackWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl SlackWebClient {
    pub fn new(http: Client, bot_token: SecretString, app_token: SecretString) -> Self {
        Self { http, base_url: SLACK_API_BASE_URL.to_owned(), bot_token, app_token }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolves the bot's own user id from the bot token.
    pub async fn auth_test(&self) -> Result<String, SlackApiError> {
        let response = self.call("auth.test", &self.bot_token, None::<&()>).await?;
        response.user_id.ok_or_else(|| SlackApiError::Api("missing_user_id".to_owned()))
    }

    /// Opens a Socket Mode session with the app-level token and returns its WSS URL.
    pub async fn open_connection(&self) -> Result<String, SlackApiError> {
        let response = self.call("apps.connections.open", &self.app_token, None::<&()>).await?;
        response.url.ok_or_else(|| SlackApiError::Api("missing_url".to_owned()))
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        token: &SecretString,
        body: Option<&B>,
    ) -> Result<ApiResponse, SlackApiError> {
        let url = format!("{}/{method}", self.base_url.trim_end_matches('/'));
        let mut request = self.http.post(url).bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response =
            request.send().await.map_err(|error| SlackApiError::Transport(error.to_string()))?;
        debug!(method, status = %response.status(), "slack web api responded");

        let response = response
            .error_for_status()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        response
            .json::<ApiResponse>()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?
            .into_result()
    }
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), PostError> {
        let body = PostMessageRequest { channel: channel_id, text, as_user: true };
        match self.call("chat.postMessage", &self.bot_token, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(SlackApiError::Transport(message)) => Err(PostError::Transport(message)),
            Err(SlackApiError::Api(code)) => Err(PostError::Api(code)),
        }
    }
}
