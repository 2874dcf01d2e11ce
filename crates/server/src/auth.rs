use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use jukebot_core::{
    domain::account::find_playlist_by_name, PlaybackApi, PlaybackError, PlaybackSession,
    SessionError, SessionSlot,
};
use jukebot_spotify::{AccessToken, AuthorizationRequest, OAuthError, SpotifyClient};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

pub const LOGIN_COMPLETED: &str = "Login Completed!";
pub const LOGIN_ALREADY_COMPLETED: &str = "Login already completed";

pub type TokenHandoff = Result<AccessToken, OAuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error("authorization callback listener stopped before login completed")]
    HandoffDropped,
    #[error("failed to load the authenticated spotify user: {0}")]
    CurrentUser(#[source] PlaybackError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Clone)]
pub struct CallbackState {
    authorization: Arc<AuthorizationRequest>,
    http: reqwest::Client,
    handoff: Arc<Mutex<Option<oneshot::Sender<TokenHandoff>>>>,
}

impl CallbackState {
    /// Pairs the callback state with the receiving end of the single-use token handoff.
    pub fn new(
        authorization: AuthorizationRequest,
        http: reqwest::Client,
    ) -> (Self, oneshot::Receiver<TokenHandoff>) {
        let (sender, receiver) = oneshot::channel();
        let state = Self {
            authorization: Arc::new(authorization),
            http,
            handoff: Arc::new(Mutex::new(Some(sender))),
        };
        (state, receiver)
    }

    fn take_sender(&self) -> Option<oneshot::Sender<TokenHandoff>> {
        self.handoff.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub fn router(state: CallbackState, callback_path: &str) -> Router {
    Router::new().route(callback_path, get(callback)).with_state(state)
}

pub async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, String) {
    let Some(sender) = state.take_sender() else {
        warn!(
            event_name = "system.auth.duplicate_callback",
            correlation_id = "bootstrap",
            "authorization callback received after login completed"
        );
        return (StatusCode::CONFLICT, LOGIN_ALREADY_COMPLETED.to_owned());
    };

    let (status, body, handoff) = complete_login(&state, params).await;
    if sender.send(handoff).is_err() {
        warn!(
            event_name = "system.auth.handoff_dropped",
            correlation_id = "bootstrap",
            "authorization task is no longer waiting for the token"
        );
    }
    (status, body)
}

async fn complete_login(
    state: &CallbackState,
    params: CallbackParams,
) -> (StatusCode, String, TokenHandoff) {
    if let Err(error) = state.authorization.verify_state(params.state.as_deref()) {
        error!(
            event_name = "system.auth.state_mismatch",
            correlation_id = "bootstrap",
            error = %error,
            "authorization callback state did not match"
        );
        return (StatusCode::NOT_FOUND, error.to_string(), Err(error));
    }

    let code = match (params.error, params.code) {
        (Some(reason), _) => return forbidden(OAuthError::Denied(reason)),
        (None, None) => return forbidden(OAuthError::MissingCode),
        (None, Some(code)) => code,
    };

    match state.authorization.exchange_code(&state.http, &code).await {
        Ok(token) => {
            info!(
                event_name = "system.auth.token_received",
                correlation_id = "bootstrap",
                "spotify access token received"
            );
            (StatusCode::OK, LOGIN_COMPLETED.to_owned(), Ok(token))
        }
        Err(error) => forbidden(error),
    }
}

fn forbidden(error: OAuthError) -> (StatusCode, String, TokenHandoff) {
    error!(
        event_name = "system.auth.token_failed",
        correlation_id = "bootstrap",
        error = %error,
        "spotify authorization failed"
    );
    (StatusCode::FORBIDDEN, error.to_string(), Err(error))
}

/// Logs the login URL, waits for the callback and publishes the authenticated session.
pub async fn authorize(
    authorization: AuthorizationRequest,
    receiver: oneshot::Receiver<TokenHandoff>,
    http: reqwest::Client,
    playlist_name: String,
    slot: SessionSlot,
) -> Result<(), AuthError> {
    let url = authorization.authorize_url()?;
    info!(
        event_name = "system.auth.authorize_url",
        correlation_id = "bootstrap",
        url = %url,
        "log in to Spotify by visiting this page in your browser"
    );

    let token = receiver.await.map_err(|_| AuthError::HandoffDropped)??;
    let api: Arc<dyn PlaybackApi> =
        Arc::new(SpotifyClient::new(http, &token).with_refresh(authorization));
    let session = open_session(api, &playlist_name).await?;

    info!(
        event_name = "system.auth.login_completed",
        correlation_id = "bootstrap",
        user_id = %session.user.id,
        playlist_id = session.playlist.as_ref().map(|playlist| playlist.id.as_str()).unwrap_or("none"),
        "spotify login completed"
    );
    slot.fill(session)?;
    Ok(())
}

/// Resolves the user and target playlist for a freshly authenticated client.
pub async fn open_session(
    api: Arc<dyn PlaybackApi>,
    playlist_name: &str,
) -> Result<PlaybackSession, AuthError> {
    let user = api.current_user().await.map_err(AuthError::CurrentUser)?;

    let playlists = match api.user_playlists(&user.id).await {
        Ok(playlists) => playlists,
        Err(error) => {
            warn!(
                event_name = "system.auth.playlists_failed",
                correlation_id = "bootstrap",
                error = %error,
                "failed to list playlists; add and ban commands will be unavailable"
            );
            Vec::new()
        }
    };
    let playlist = find_playlist_by_name(&playlists, playlist_name).cloned();
    if playlist.is_none() {
        warn!(
            event_name = "system.auth.playlist_missing",
            correlation_id = "bootstrap",
            playlist_name,
            "target playlist not found for the authenticated user"
        );
    }

    match api.playback_device().await {
        Ok(Some(device)) => info!(
            correlation_id = "bootstrap",
            device_name = %device.name,
            device_type = %device.kind,
            "found active playback device"
        ),
        Ok(None) => info!(correlation_id = "bootstrap", "no active playback device"),
        Err(error) => warn!(
            correlation_id = "bootstrap",
            error = %error,
            "failed to read playback device"
        ),
    }

    Ok(PlaybackSession { api, user, playlist, playlist_name: playlist_name.to_owned() })
}
