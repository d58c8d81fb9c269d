//! Request/response correlation over an arbitrary message channel
//!
//! A [`MessageBridge`] sends commands, queries and events to a server through
//! a [`Transport`], tags every request with a unique track id and matches the
//! responses that come back to the requests that caused them. On top of the
//! matching it handles per-request timeouts, cancellation policy, event
//! fan-out and interception hooks.
//!
//! The bridge never inspects payloads: they travel as opaque JSON values and
//! are (de)serialized into caller types at the edges.
//!
//! ```no_run
//! # use message_bridge::{create_memory_transport, MessageBridge, RequestOptions};
//! # use serde_json::{json, Value};
//! # async fn demo() -> message_bridge::Result<()> {
//! let (transport, _peer) = create_memory_transport("demo");
//! let bridge = MessageBridge::new(transport);
//! bridge.connect().await?;
//!
//! let items: Option<Value> = bridge
//!     .send_query(RequestOptions::new("GetTodoItemQuery", json!({ "search": "milk" })))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, MutexGuard};

// Macros first so every module below can use them.
mod macros;

mod bridge;
mod bridge_options;
mod domain;
mod error;
mod events;
mod protocol;
mod transport;

// Re-export main types
pub use bridge::{
    // ---
    CreatedEvent,
    CreatedMessage,
    ErrorReason,
    EventOptions,
    MessageBridge,
    RequestOptions,
    RequestResponse,
};

pub use bridge_options::{
    // ---
    BridgeOptions,
    CloseHook,
    ConnectHook,
    CreatedEventInterceptor,
    CreatedMessageInterceptor,
    ErrorHook,
    Logger,
    MessageFilter,
    MessageFormatter,
    MessageHook,
    MessageTransform,
    ParseErrorFormatter,
    RequestCallback,
    TimeoutReasonFormatter,
};

pub use error::{BridgeError, ErrorEvent, Result};
pub use events::{EventCallback, EventDispatcher, EventNames, EventSubscription};

pub use protocol::{
    // ---
    create_command_message,
    create_event_message,
    create_message,
    create_message_from_dto,
    create_query_message,
    now_timestamp,
    Message,
    MessageDirection,
    MessageDto,
    MessageType,
    NewMessage,
    TrackId,
};

pub use transport::{create_memory_transport, MemoryPeer, MemoryPeerSender};

// --- public re-exports
pub use domain::{
    //
    ConnectionHandle,
    Frame,
    Transport,
    TransportBase,
    TransportEvent,
    TransportPtr,
};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Every table guarded this way (pending requests, subscribers, history) is
/// valid after any single insert or remove, so a panic in another holder
/// cannot leave it half-updated.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
