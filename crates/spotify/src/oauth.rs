use std::time::{Duration, Instant};

use jukebot_core::config::SpotifyConfig;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Read current playback, read playback state, modify playback state, modify playlists.
pub const SCOPES: &[&str] = &[
    "user-read-currently-playing",
    "user-read-playback-state",
    "user-modify-playback-state",
    "playlist-modify-public",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    #[error("state mismatch: {received} != {expected}")]
    StateMismatch { expected: String, received: String },
    #[error("authorization callback did not carry a code")]
    MissingCode,
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("couldn't get token: {0}")]
    TokenExchange(String),
    #[error("invalid authorization url: {0}")]
    InvalidUrl(String),
    #[error("couldn't refresh token: {0}")]
    RefreshUnavailable(String),
}

#[derive(Clone)]
pub struct AccessToken {
    pub access_token: SecretString,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub refresh_token: Option<SecretString>,
    pub issued_at: Instant,
}

impl AccessToken {
    /// True when the token has expired or will within `margin`. Tokens
    /// without a lifetime never expire.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_in
            .map(|seconds| self.issued_at.elapsed() + margin >= Duration::from_secs(seconds))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    state: String,
    token_url: String,
}

impl AuthorizationRequest {
    pub fn from_config(config: &SpotifyConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            state: config.oauth_state.clone(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn authorize_url(&self) -> Result<String, OAuthError> {
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", self.state.as_str()),
            ],
        )
        .map_err(|error| OAuthError::InvalidUrl(error.to_string()))?;
        Ok(url.into())
    }

    pub fn verify_state(&self, received: Option<&str>) -> Result<(), OAuthError> {
        let received = received.unwrap_or_default();
        if received == self.state {
            Ok(())
        } else {
            Err(OAuthError::StateMismatch {
                expected: self.state.clone(),
                received: received.to_string(),
            })
        }
    }

    pub async fn exchange_code(&self, http: &Client, code: &str) -> Result<AccessToken, OAuthError> {
        self.request_token(
            http,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .await
    }

    /// Trades a refresh token for a new access token. Spotify may omit the
    /// refresh token from the response, in which case the old one is kept.
    pub async fn refresh(
        &self,
        http: &Client,
        refresh_token: &SecretString,
    ) -> Result<AccessToken, OAuthError> {
        let mut token = self
            .request_token(
                http,
                &[("grant_type", "refresh_token"), ("refresh_token", refresh_token.expose_secret())],
            )
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.clone());
        }
        Ok(token)
    }

    async fn request_token(
        &self,
        http: &Client,
        form: &[(&str, &str)],
    ) -> Result<AccessToken, OAuthError> {
        let issued_at = Instant::now();
        let response = http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(|error| {
                error!(error = %error, "spotify token exchange request failed");
                OAuthError::TokenExchange(format!("token request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(OAuthError::TokenExchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|error| {
            OAuthError::TokenExchange(format!("failed to decode token response: {error}"))
        })?;
        if token.access_token.is_empty() {
            return Err(OAuthError::TokenExchange(
                "token endpoint returned empty access token".to_string(),
            ));
        }

        Ok(AccessToken {
            access_token: token.access_token.into(),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: token.expires_in,
            scope: token.scope,
            refresh_token: token.refresh_token.map(SecretString::from),
            issued_at,
        })
    }
}
