use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::{
    events::SlackEnvelope,
    socket::{ConnectionInfo, SocketTransport, TransportError},
    web::{SlackApiError, SlackWebClient},
};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Serialize)]
struct Acknowledgement<'a> {
    envelope_id: &'a str,
}

/// Socket Mode over a WebSocket opened from `apps.connections.open`.
pub struct SlackSocketTransport {
    web: SlackWebClient,
    stream: Mutex<Option<SocketStream>>,
}

impl SlackSocketTransport {
    pub fn new(web: SlackWebClient) -> Self {
        Self { web, stream: Mutex::new(None) }
    }
}

fn connect_error(error: SlackApiError) -> TransportError {
    if error.is_invalid_auth() {
        TransportError::InvalidAuth(error.to_string())
    } else {
        TransportError::Connect(error.to_string())
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    async fn connect(&self) -> Result<ConnectionInfo, TransportError> {
        let bot_user_id = self.web.auth_test().await.map_err(connect_error)?;
        let url = self.web.open_connection().await.map_err(connect_error)?;

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        *self.stream.lock().await = Some(stream);

        Ok(ConnectionInfo { bot_user_id })
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        loop {
            let Some(stream) = guard.as_mut() else {
                return Ok(None);
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => match SlackEnvelope::from_frame(text.as_str()) {
                    Ok(envelope) => return Ok(Some(envelope)),
                    Err(error) => warn!(error = %error, "skipping undecodable socket mode frame"),
                },
                // Pings are answered by tungstenite while reading.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Binary(_))) => debug!("ignoring binary socket mode frame"),
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "socket mode connection closed by slack");
                    *guard = None;
                    return Ok(None);
                }
                Some(Err(error)) => {
                    *guard = None;
                    return Err(TransportError::Receive(error.to_string()));
                }
                None => {
                    *guard = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let payload = serde_json::to_string(&Acknowledgement { envelope_id })
            .map_err(|error| TransportError::Acknowledge(error.to_string()))?;

        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        stream
            .send(Message::Text(payload.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
