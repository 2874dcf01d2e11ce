use std::sync::Arc;

use jukebot_core::{config::AppConfig, BannedArtistRegistry, SessionSlot};
use jukebot_slack::{
    events::jukebox_dispatcher,
    service::JukeboxService,
    socket::{ReconnectPolicy, SocketModeRunner},
    transport::SlackSocketTransport,
    web::SlackWebClient,
};
use jukebot_spotify::AuthorizationRequest;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub http: reqwest::Client,
    pub session: SessionSlot,
    pub registry: Arc<BannedArtistRegistry>,
    pub authorization: AuthorizationRequest,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("jukebot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let session = SessionSlot::new();
    let registry = Arc::new(BannedArtistRegistry::new());
    let web = SlackWebClient::new(
        http.clone(),
        config.slack.bot_token.clone(),
        config.slack.app_token.clone(),
    );

    let service = JukeboxService::new(
        session.clone(),
        registry.clone(),
        Arc::new(web.clone()),
        config.spotify.playlist_name.clone(),
    );
    let slack_runner = SocketModeRunner::new(
        Arc::new(SlackSocketTransport::new(web)),
        jukebox_dispatcher(service),
        ReconnectPolicy::default(),
    );
    let authorization = AuthorizationRequest::from_config(&config.spotify);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        playlist_name = %config.spotify.playlist_name,
        "application components wired"
    );

    Ok(Application { config, http, session, registry, authorization, slack_runner })
}
