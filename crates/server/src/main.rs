mod auth;
mod bootstrap;
mod health;

use std::future::Future;

use anyhow::{anyhow, Result};
use jukebot_core::config::{AppConfig, LoadOptions};
use jukebot_slack::socket::SocketError;
use tokio::task::JoinHandle;
use tracing::{error, info};

type AuthTask = JoinHandle<Result<(), auth::AuthError>>;
type ServerTask = JoinHandle<std::io::Result<()>>;

fn init_logging(config: &AppConfig) {
    use jukebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let (callback_state, receiver) =
        auth::CallbackState::new(app.authorization.clone(), app.http.clone());
    let router = auth::router(callback_state, &app.config.spotify.callback_path())
        .merge(health::router(app.session.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.listening",
        correlation_id = "bootstrap",
        bind_address = %address,
        callback_path = %app.config.spotify.callback_path(),
        "authorization callback and health endpoint started"
    );
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    let auth_task = tokio::spawn(auth::authorize(
        app.authorization,
        receiver,
        app.http,
        app.config.spotify.playlist_name.clone(),
        app.session,
    ));

    info!(event_name = "system.server.started", correlation_id = "bootstrap", "jukebot started");
    let outcome =
        supervise(auth_task, server, app.slack_runner.start(), tokio::signal::ctrl_c()).await;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        clean = outcome.is_ok(),
        banned_artists = app.registry.len(),
        "jukebot stopping"
    );
    outcome
}

/// Runs until shutdown or until any long-lived piece fails. A completed
/// login keeps the process running; a stopped listener does not.
async fn supervise(
    mut auth_task: AuthTask,
    mut server: ServerTask,
    socket: impl Future<Output = Result<(), SocketError>>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    tokio::pin!(socket);
    tokio::pin!(shutdown);

    let mut auth_done = false;
    let outcome = loop {
        tokio::select! {
            joined = &mut auth_task, if !auth_done => {
                auth_done = true;
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => break Err(error.into()),
                    Err(error) => break Err(error.into()),
                }
            }
            served = &mut server => {
                let outcome = match served {
                    Ok(Ok(())) => Err(anyhow!("http listener stopped")),
                    Ok(Err(error)) => Err(error.into()),
                    Err(error) => Err(error.into()),
                };
                if let Err(error) = &outcome {
                    error!(
                        event_name = "system.server.error",
                        correlation_id = "shutdown",
                        error = %error,
                        "http listener terminated unexpectedly"
                    );
                }
                break outcome;
            }
            result = &mut socket => {
                break result.map_err(anyhow::Error::from);
            }
            signal = &mut shutdown => {
                break signal.map_err(anyhow::Error::from);
            }
        }
    };

    auth_task.abort();
    server.abort();
    outcome
}

#[cfg(test)]
mod tests {
    use std::future::{pending, Pending};
    use std::time::Duration;

    use jukebot_slack::socket::SocketError;

    use crate::{auth::AuthError, supervise};

    fn socket_idle() -> Pending<Result<(), SocketError>> {
        pending()
    }

    fn no_signal() -> Pending<std::io::Result<()>> {
        pending()
    }

    #[tokio::test]
    async fn stopped_listener_ends_the_process() {
        let auth_task = tokio::spawn(pending::<Result<(), AuthError>>());
        let server = tokio::spawn(async { Ok(()) });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(auth_task, server, socket_idle(), no_signal()),
        )
        .await
        .expect("supervision must not hang");

        let error = outcome.expect_err("listener exit is fatal");
        assert!(error.to_string().contains("http listener stopped"));
    }

    #[tokio::test]
    async fn failed_login_ends_the_process() {
        let auth_task = tokio::spawn(async { Err(AuthError::HandoffDropped) });
        let server = tokio::spawn(pending());

        let outcome = supervise(auth_task, server, socket_idle(), no_signal()).await;

        assert!(outcome.expect_err("auth failure is fatal").to_string().contains("callback"));
    }

    #[tokio::test]
    async fn completed_login_keeps_running_until_shutdown() {
        let auth_task = tokio::spawn(async { Ok(()) });
        let server = tokio::spawn(pending());
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<(), std::io::Error>(())
        };

        let outcome = supervise(auth_task, server, socket_idle(), shutdown).await;

        assert!(outcome.is_ok());
    }
}
