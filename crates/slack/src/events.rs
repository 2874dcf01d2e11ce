use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::commands::{
    CommandEnvelope, CommandError, CommandOutcome, CommandRouter, JukeboxCommandService,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    /// Present on `events_api` frames; lifecycle frames carry none and need no ack.
    pub envelope_id: Option<String>,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Hello,
    Message(MessageEvent),
    PresenceChange,
    Disconnect { reason: String },
    Error { message: String },
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Hello => SlackEventType::Hello,
            Self::Message(_) => SlackEventType::Message,
            Self::PresenceChange => SlackEventType::PresenceChange,
            Self::Disconnect { .. } => SlackEventType::Disconnect,
            Self::Error { .. } => SlackEventType::Error,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Hello,
    Message,
    PresenceChange,
    Disconnect,
    Error,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payload: Option<RawPayload>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl RawEvent {
    fn into_event(self) -> SlackEvent {
        match self.kind.as_str() {
            "message" => {}
            "presence_change" => return SlackEvent::PresenceChange,
            _ => return SlackEvent::Unsupported { event_type: self.kind },
        }
        if let Some(subtype) = self.subtype {
            return SlackEvent::Unsupported { event_type: format!("message.{subtype}") };
        }

        match (self.channel, self.user, self.text) {
            (Some(channel_id), Some(user_id), Some(text)) => {
                SlackEvent::Message(MessageEvent { channel_id, user_id, text })
            }
            _ => SlackEvent::Unsupported { event_type: self.kind },
        }
    }
}

impl SlackEnvelope {
    /// Decodes one Socket Mode text frame.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(frame)?;
        let event = match raw.kind.as_str() {
            "hello" => SlackEvent::Hello,
            "disconnect" => {
                SlackEvent::Disconnect { reason: raw.reason.unwrap_or_else(|| "unknown".to_owned()) }
            }
            "error" => {
                SlackEvent::Error { message: raw.message.unwrap_or_else(|| "unknown".to_owned()) }
            }
            "events_api" => match raw.payload.and_then(|payload| payload.event) {
                Some(event) => event.into_event(),
                None => SlackEvent::Unsupported { event_type: "events_api".to_owned() },
            },
            other => SlackEvent::Unsupported { event_type: other.to_owned() },
        };

        Ok(Self { envelope_id: raw.envelope_id, event })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
    pub bot_user_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            correlation_id: "unknown-correlation-id".to_owned(),
            bot_user_id: "unknown-bot-user".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn jukebox_dispatcher<S>(service: S) -> EventDispatcher
where
    S: JukeboxCommandService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service));
    dispatcher
}

/// Returns the command text when `text` starts with a mention of `bot_user_id`.
pub fn strip_mention<'a>(text: &'a str, bot_user_id: &str) -> Option<&'a str> {
    let rest = text.strip_prefix("<@")?.strip_prefix(bot_user_id)?.strip_prefix('>')?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

pub struct MessageHandler<S> {
    router: CommandRouter<S>,
}

impl<S> MessageHandler<S>
where
    S: JukeboxCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: JukeboxCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.user_id == ctx.bot_user_id {
            return Ok(HandlerResult::Ignored);
        }
        let Some(text) = strip_mention(&event.text, &ctx.bot_user_id) else {
            return Ok(HandlerResult::Ignored);
        };

        let command = CommandEnvelope {
            channel_id: event.channel_id.clone(),
            user_id: event.user_id.clone(),
            text: text.to_owned(),
            correlation_id: ctx.correlation_id.clone(),
        };
        Ok(match self.router.route(command).await? {
            CommandOutcome::Handled => HandlerResult::Processed,
            CommandOutcome::Ignored => HandlerResult::Ignored,
        })
    }
}
