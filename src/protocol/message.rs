//! Wire envelope and the factory functions that build it.
//!
//! Every message crossing the bridge, in either direction, is a [`Message`].
//! The payload and schema are opaque JSON values; the bridge only reads the
//! envelope fields (`type`, `name`, `trackId`, flags).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TrackId;

/// Kind of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Command,
    CommandResponse,
    Query,
    QueryResponse,
    Event,
    Error,
}

impl MessageType {
    // ---

    /// The response type a server pairs with this request type.
    ///
    /// Commands map to `CommandResponse`, queries to `QueryResponse`;
    /// every other type maps to itself.
    pub fn response_type(self) -> MessageType {
        // ---
        match self {
            MessageType::Command => MessageType::CommandResponse,
            MessageType::Query => MessageType::QueryResponse,
            other => other,
        }
    }

    /// `true` for the request types that get a correlation entry.
    pub fn is_request(self) -> bool {
        matches!(self, MessageType::Command | MessageType::Query)
    }
}

/// Which way a message travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageDirection {
    ToClient,
    ToServer,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The envelope exchanged with the server.
///
/// `cancelled` and `timed_out` only ever move from `false` to `true`; use
/// [`Message::mark_cancelled`] and [`Message::mark_timed_out`] rather than
/// assigning them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    pub name: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Always equal to `message_type == MessageType::Error`.
    pub is_error: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub cancelled: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub timed_out: bool,

    pub track_id: TrackId,

    /// RFC 3339 timestamp (UTC, millisecond precision).
    pub created: String,

    #[serde(default)]
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    pub direction: MessageDirection,
}

impl Message {
    // ---

    /// Flag the message as locally cancelled.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Flag the message as timed out.
    pub fn mark_timed_out(&mut self) {
        self.timed_out = true;
    }

    /// Serialize to the JSON wire representation.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Input to [`create_message`].
///
/// `track_id` and `direction` are optional; everything the factory derives
/// (`created`, `is_error`) is absent on purpose.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub name: String,
    pub message_type: MessageType,
    pub payload: Value,
    pub module: Option<String>,
    pub schema: Option<Value>,
    pub track_id: Option<TrackId>,
    pub direction: Option<MessageDirection>,
}

impl NewMessage {
    // ---

    /// Start a new message description of the given type.
    pub fn new(name: impl Into<String>, message_type: MessageType, payload: Value) -> Self {
        // ---
        Self {
            name: name.into(),
            message_type,
            payload,
            module: None,
            schema: None,
            track_id: None,
            direction: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn track_id(mut self, track_id: impl Into<TrackId>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    pub fn direction(mut self, direction: MessageDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Raw inbound envelope, before normalization.
///
/// Every field that [`create_message_from_dto`] can derive or default is
/// optional here, so loosely-formed server output still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default)]
    pub module: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub cancelled: Option<bool>,
    #[serde(default)]
    pub timed_out: Option<bool>,
    pub track_id: TrackId,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub direction: Option<MessageDirection>,
}

impl From<Message> for MessageDto {
    fn from(msg: Message) -> Self {
        // ---
        Self {
            module: msg.module,
            name: msg.name,
            message_type: msg.message_type,
            is_error: Some(msg.is_error),
            cancelled: Some(msg.cancelled),
            timed_out: Some(msg.timed_out),
            track_id: msg.track_id,
            created: Some(msg.created),
            payload: msg.payload,
            schema: msg.schema,
            direction: Some(msg.direction),
        }
    }
}

/// Current time in the wire timestamp format.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build a fresh outgoing envelope.
///
/// A track id is generated when none is given, `created` is always now,
/// direction defaults to [`MessageDirection::ToServer`] and `is_error` is
/// derived from the type.
pub fn create_message(opt: NewMessage) -> Message {
    // ---
    Message {
        module: opt.module,
        name: opt.name,
        is_error: opt.message_type == MessageType::Error,
        message_type: opt.message_type,
        cancelled: false,
        timed_out: false,
        track_id: opt.track_id.unwrap_or_else(TrackId::generate),
        created: now_timestamp(),
        payload: opt.payload,
        schema: opt.schema,
        direction: opt.direction.unwrap_or(MessageDirection::ToServer),
    }
}

/// Build a `Command` envelope.
pub fn create_command_message(name: impl Into<String>, payload: Value) -> Message {
    create_message(NewMessage::new(name, MessageType::Command, payload))
}

/// Build a `Query` envelope.
pub fn create_query_message(name: impl Into<String>, payload: Value) -> Message {
    create_message(NewMessage::new(name, MessageType::Query, payload))
}

/// Build an `Event` envelope.
pub fn create_event_message(name: impl Into<String>, payload: Value) -> Message {
    create_message(NewMessage::new(name, MessageType::Event, payload))
}

/// Normalize an inbound envelope.
///
/// `is_error` is recomputed from the type and `direction` falls back to the
/// given default only when absent. Applying this to an already normalized
/// message returns it unchanged.
pub fn create_message_from_dto(
    raw: impl Into<MessageDto>,
    direction: MessageDirection,
) -> Message {
    // ---
    let dto = raw.into();
    Message {
        module: dto.module,
        name: dto.name,
        is_error: dto.message_type == MessageType::Error,
        message_type: dto.message_type,
        cancelled: dto.cancelled.unwrap_or(false),
        timed_out: dto.timed_out.unwrap_or(false),
        track_id: dto.track_id,
        created: dto.created.unwrap_or_else(now_timestamp),
        payload: dto.payload,
        schema: dto.schema,
        direction: dto.direction.unwrap_or(direction),
    }
}
