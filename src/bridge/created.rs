//! Prepared requests and events that have not been sent yet.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::BareOutcome;
use crate::{
    // ---
    EventOptions,
    Message,
    MessageBridge,
    MessageHook,
    RequestOptions,
    RequestResponse,
    Result,
    TrackId,
};

/// A command or query built by the bridge and ready to send.
///
/// Clones share the cancellation flag, so a clone can cancel a send that
/// another clone is awaiting.
#[derive(Clone)]
pub struct CreatedMessage {
    // ---
    bridge: MessageBridge,
    pub track_id: TrackId,
    pub request_message: Message,
    pub request_options: Arc<RequestOptions>,
    cancelled: Arc<AtomicBool>,
    send_taps: Vec<MessageHook>,
}

impl CreatedMessage {
    // ---

    pub(crate) fn new(
        bridge: MessageBridge,
        request_message: Message,
        request_options: Arc<RequestOptions>,
    ) -> Self {
        // ---
        Self {
            bridge,
            track_id: request_message.track_id.clone(),
            request_message,
            request_options,
            cancelled: Arc::new(AtomicBool::new(false)),
            send_taps: Vec::new(),
        }
    }

    /// Run `f` with the outgoing message every time this request is sent.
    ///
    /// Meant for interceptors that want to observe or count sends.
    pub fn tap_send(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.send_taps.push(Arc::new(f));
        self
    }

    /// Mark the request cancelled.
    ///
    /// Before sending this decides whether the message goes out at all;
    /// once in flight it marks the pending entry so the response is treated
    /// as cancelled.
    pub fn cancel(&self) {
        // ---
        self.cancelled.store(true, Ordering::SeqCst);
        self.bridge.cancel_request(&self.track_id);
    }

    pub fn is_cancelled(&self) -> bool {
        self.request_message.cancelled || self.cancelled.load(Ordering::SeqCst)
    }

    fn outgoing(&self) -> Message {
        // ---
        let mut msg = self.request_message.clone();
        if self.cancelled.load(Ordering::SeqCst) {
            msg.mark_cancelled();
        }
        for tap in &self.send_taps {
            tap(&msg);
        }
        msg
    }

    /// Send and resolve with the decoded response payload.
    ///
    /// Resolves `Ok(None)` when the request was cancelled or when an error
    /// was suppressed by `avoid_throw_on_non_tracked_error`.
    pub async fn send<TResp: DeserializeOwned>(&self) -> Result<Option<TResp>> {
        // ---
        let outcome = self
            .bridge
            .send_untracked(self.outgoing(), self.request_options.clone())
            .await?;

        match outcome {
            BareOutcome::Response(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            BareOutcome::Response(None) | BareOutcome::SuppressedError(_) => Ok(None),
        }
    }

    /// Send and resolve with the full correlation record.
    pub async fn send_tracked(&self) -> Result<RequestResponse> {
        // ---
        self.bridge
            .send_tracked(self.outgoing(), self.request_options.clone())
            .await
    }
}

impl fmt::Debug for CreatedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.debug_struct("CreatedMessage")
            .field("track_id", &self.track_id)
            .field("request_message", &self.request_message)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// An event built by the bridge and ready to send.
#[derive(Clone)]
pub struct CreatedEvent {
    // ---
    bridge: MessageBridge,
    pub track_id: TrackId,
    pub request_message: Message,
    pub request_options: Arc<EventOptions>,
    cancelled: Arc<AtomicBool>,
}

impl CreatedEvent {
    // ---

    pub(crate) fn new(
        bridge: MessageBridge,
        request_message: Message,
        request_options: Arc<EventOptions>,
    ) -> Self {
        // ---
        Self {
            bridge,
            track_id: request_message.track_id.clone(),
            request_message,
            request_options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the event cancelled; a later `send` is suppressed unless
    /// sending cancelled messages is enabled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.request_message.cancelled || self.cancelled.load(Ordering::SeqCst)
    }

    /// Fire-and-forget send. Resolves once the transport accepted the frame.
    pub async fn send(&self) -> Result<()> {
        // ---
        let mut msg = self.request_message.clone();
        if self.cancelled.load(Ordering::SeqCst) {
            msg.mark_cancelled();
        }
        self.bridge
            .send_event_message(msg, self.request_options.send_cancelled)
            .await
    }
}

impl fmt::Debug for CreatedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.debug_struct("CreatedEvent")
            .field("track_id", &self.track_id)
            .field("request_message", &self.request_message)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
