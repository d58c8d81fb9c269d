use std::fmt;

use thiserror::Error;

use crate::{Message, RequestResponse};

/// Errors that can occur while talking through a [`MessageBridge`](crate::MessageBridge)
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A tracked request failed (server error, timeout or transport failure)
    /// and the configured error policy says the caller should see it.
    ///
    /// The full correlation record is carried so callers can inspect the
    /// request, the error payload and the cancellation/timeout flags.
    #[error("request `{}` failed: {}", .0.request_message.name, .0.reason_text())]
    Request(Box<RequestResponse>),

    /// JSON serialization or deserialization of a payload failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport adapter reported a failure
    #[error("transport error: {0}")]
    Transport(String),

    /// `connect()` has not completed (or the bridge was closed)
    #[error("bridge is not connected")]
    NotConnected,

    /// The result channel of a pending request closed before it settled
    #[error("response channel closed before the request settled")]
    ChannelClosed,
}

impl BridgeError {
    // ---

    /// `true` when this is a rejected request whose failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        // ---
        matches!(self, BridgeError::Request(record) if record.timed_out)
    }

    /// Borrow the correlation record of a rejected request, if any.
    pub fn record(&self) -> Option<&RequestResponse> {
        // ---
        match self {
            BridgeError::Request(record) => Some(record),
            _ => None,
        }
    }
}

/// Channel-level failure reported through `on_error` and kept in
/// [`MessageBridge::bridge_errors`](crate::MessageBridge::bridge_errors).
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    /// An inbound frame could not be decoded into a message.
    Decode { error: String, raw: String },

    /// An `Error` message arrived with no matching pending request.
    UntrackedError(Message),

    /// A tracked request failed.
    Request(Box<RequestResponse>),

    /// The transport reported a failure.
    Transport(String),

    /// The channel closed with a reason.
    Closed(String),
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            ErrorEvent::Decode { error, .. } => write!(f, "undecodable frame: {error}"),
            ErrorEvent::UntrackedError(msg) => {
                write!(f, "untracked error message {}: {}", msg.track_id, msg.payload)
            }
            ErrorEvent::Request(record) => write!(
                f,
                "request `{}` failed: {}",
                record.request_message.name,
                record.reason_text()
            ),
            ErrorEvent::Transport(reason) => write!(f, "transport error: {reason}"),
            ErrorEvent::Closed(reason) => write!(f, "channel closed: {reason}"),
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
