use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack rejected the configured tokens: {0}")]
    InvalidAuth(String),
    #[error("connection closed before it became stable: {0}")]
    ClosedEarly(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocketError {
    #[error("slack authentication failed: {0}")]
    InvalidAuth(String),
    #[error("socket mode gave up after {attempts} failed connection attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub bot_user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// A connection that stays open this long counts as healthy even if it
    /// carried no events.
    pub stable_after_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000, stable_after_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<ConnectionInfo, TransportError>;
    /// `Ok(None)` means the server closed the stream.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

enum PumpExit {
    StreamClosed,
    DisconnectRequested(String),
}

struct PumpOutcome {
    exit: PumpExit,
    acknowledged: usize,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs until authentication fails or reconnection attempts are exhausted.
    ///
    /// The failure count resets only after a healthy connection, one that
    /// acknowledged an envelope or stayed open for `stable_after_ms`. A stream
    /// that closes before that goes through the same backoff as a failed
    /// connect.
    pub async fn start(&self) -> Result<(), SocketError> {
        let mut attempt = 0_u32;
        loop {
            info!(attempt, "opening socket mode transport connection");
            let connection = match self.transport.connect().await {
                Ok(connection) => connection,
                Err(error) => {
                    self.recover(&mut attempt, error).await?;
                    continue;
                }
            };
            info!(
                attempt,
                bot_user_id = %connection.bot_user_id,
                "socket mode transport connected"
            );
            let opened_at = Instant::now();

            let outcome = match self.pump(&connection).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.recover(&mut attempt, error).await?;
                    continue;
                }
            };

            let reason = match outcome.exit {
                PumpExit::StreamClosed => {
                    info!("socket mode transport stream closed");
                    "stream closed".to_owned()
                }
                PumpExit::DisconnectRequested(reason) => {
                    info!(reason = %reason, "slack requested disconnect");
                    if let Err(error) = self.transport.disconnect().await {
                        debug!(error = %error, "socket mode disconnect failed");
                    }
                    reason
                }
            };

            if self.is_stable(outcome.acknowledged, opened_at.elapsed()) {
                attempt = 0;
            } else {
                self.recover(&mut attempt, TransportError::ClosedEarly(reason)).await?;
            }
        }
    }

    fn is_stable(&self, acknowledged: usize, uptime: Duration) -> bool {
        acknowledged > 0 || uptime >= Duration::from_millis(self.reconnect_policy.stable_after_ms)
    }

    async fn recover(&self, attempt: &mut u32, error: TransportError) -> Result<(), SocketError> {
        if let TransportError::InvalidAuth(message) = error {
            return Err(SocketError::InvalidAuth(message));
        }

        warn!(
            attempt = *attempt,
            max_retries = self.reconnect_policy.max_retries,
            error = %error,
            "socket mode transport failed"
        );
        if *attempt >= self.reconnect_policy.max_retries {
            return Err(SocketError::RetriesExhausted { attempts: *attempt + 1, last_error: error });
        }

        let delay = self.reconnect_policy.backoff(*attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        *attempt += 1;
        Ok(())
    }

    async fn pump(&self, connection: &ConnectionInfo) -> Result<PumpOutcome, TransportError> {
        let mut acknowledged = 0;
        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                return Ok(PumpOutcome { exit: PumpExit::StreamClosed, acknowledged });
            };
            let correlation_id = envelope.envelope_id.clone().unwrap_or_else(|| "none".to_owned());

            info!(
                event_name = "ingress.slack.envelope_received",
                correlation_id = %correlation_id,
                event_type = ?envelope.event.event_type(),
                "received slack envelope"
            );

            if let Some(envelope_id) = envelope.envelope_id.as_deref() {
                match self.transport.acknowledge(envelope_id).await {
                    Ok(()) => {
                        acknowledged += 1;
                        debug!(
                            event_name = "ingress.slack.ack_sent",
                            correlation_id = %correlation_id,
                            "acknowledged slack envelope"
                        )
                    }
                    Err(error) => warn!(
                        event_name = "ingress.slack.ack_sent",
                        correlation_id = %correlation_id,
                        error = %error,
                        "failed to acknowledge slack envelope"
                    ),
                }
            }

            match &envelope.event {
                SlackEvent::Disconnect { reason } => {
                    return Ok(PumpOutcome {
                        exit: PumpExit::DisconnectRequested(reason.clone()),
                        acknowledged,
                    });
                }
                SlackEvent::Error { message } => {
                    warn!(correlation_id = %correlation_id, error = %message, "slack reported error");
                }
                SlackEvent::Hello => info!("slack socket mode session ready"),
                _ => {}
            }

            let context = EventContext {
                correlation_id: correlation_id.clone(),
                bot_user_id: connection.bot_user_id.clone(),
            };
            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                warn!(
                    event_name = "ingress.slack.dispatch_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
            }
        }
    }
}
