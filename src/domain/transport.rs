// src/domain/transport.rs

//! Transport adapter abstractions.
//!
//! The bridge talks to the outside world only through the [`Transport`]
//! trait defined here. A transport owns the physical channel (socket, hub
//! connection, in-process loopback) and is responsible for:
//!
//! - establishing the channel in [`Transport::connect`] and handing back a
//!   [`ConnectionHandle`] whose inbox yields every inbound frame in delivery
//!   order, plus channel errors and closure,
//! - transmitting one already-built [`Message`] per
//!   [`Transport::send_network_message`] call,
//! - tearing the channel down in [`Transport::close`].
//!
//! Correlation, timeouts, cancellation and event fan-out all live above this
//! layer. Concrete implementations live under `src/transport/`.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{Message, Result};

/// Identity shared by all transport implementations.
///
/// Each concrete transport embeds this as a field named `base` and returns
/// it from [`Transport::base`]; the default trait methods read from it.
#[derive(Debug, Clone)]
pub struct TransportBase {
    /// Identifier used in log lines.
    pub transport_id: String,
    /// Endpoint the transport connects to, when it has one.
    pub uri: Option<String>,
}

impl TransportBase {
    pub fn new(transport_id: impl Into<String>, uri: Option<String>) -> Self {
        // ---
        Self {
            transport_id: transport_id.into(),
            uri,
        }
    }
}

/// One inbound unit as delivered by the transport.
///
/// Transports that receive text or bytes hand them over untouched; the
/// bridge decodes them. Transports that already hold structured envelopes
/// (e.g. an in-process loopback) may hand over a [`Message`] directly.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Message(Message),
}

impl From<String> for Frame {
    fn from(value: String) -> Self {
        Frame::Text(value)
    }
}

impl From<Message> for Frame {
    fn from(value: Message) -> Self {
        Frame::Message(value)
    }
}

/// Everything a transport can report to the bridge after `connect()`.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A frame arrived on the channel.
    Frame(Frame),
    /// The channel reported a non-fatal error.
    Error(String),
    /// The channel closed, optionally with a reason.
    Closed(Option<String>),
}

/// Handle returned from a successful `connect()`.
///
/// The bridge drains `inbox` in a single receive loop, so frames are
/// processed strictly in the order the transport delivered them.
pub struct ConnectionHandle {
    // ---
    /// Receiver for inbound frames and channel lifecycle events.
    pub inbox: mpsc::Receiver<TransportEvent>,
}

/// Transport adapter.
///
/// Implementations must ensure that:
/// - frames are pushed into the inbox in the order they arrived,
/// - `send_network_message()` does not wait for a reply,
/// - after `close()` the inbox eventually ends (sender dropped).
///
/// The in-memory transport is the reference implementation.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat its methods as
/// ordinary `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Returns the transport id.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Returns the endpoint uri, if any.
    fn uri(&self) -> Option<&str> {
        self.base().uri.as_deref()
    }

    /// Establish the channel.
    async fn connect(&self) -> Result<ConnectionHandle>;

    /// Transmit one envelope.
    async fn send_network_message(&self, msg: &Message) -> Result<()>;

    /// Close the channel and release its resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// Cheap to clone; every clone refers to the same underlying channel.
pub type TransportPtr = Arc<dyn Transport>;
