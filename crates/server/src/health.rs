use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use jukebot_core::SessionSlot;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    session: SessionSlot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub spotify: HealthCheck,
    pub checked_at: String,
}

pub fn router(session: SessionSlot) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { session })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let spotify = spotify_check(&state.session);
    let ready = spotify.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "awaiting_authorization" },
        service: HealthCheck {
            status: "ready",
            detail: "jukebot-server runtime initialized".to_string(),
        },
        spotify,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn spotify_check(session: &SessionSlot) -> HealthCheck {
    match session.session() {
        Ok(session) => HealthCheck {
            status: "ready",
            detail: match &session.playlist {
                Some(playlist) => format!("logged in as {}; playlist {}", session.user.id, playlist.name),
                None => format!(
                    "logged in as {}; playlist {} not found",
                    session.user.id, session.playlist_name
                ),
            },
        },
        Err(error) => HealthCheck { status: "awaiting_authorization", detail: error.to_string() },
    }
}
