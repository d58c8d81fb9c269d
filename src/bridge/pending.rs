use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::timeout::RequestTimer;
use crate::{Message, RequestOptions, RequestResponse, TrackId};

/// Outcome delivered to the task awaiting a tracked request.
pub(crate) struct Settlement {
    pub record: RequestResponse,
    /// Effective cancellation, after `resolve_cancelled_*` was applied.
    pub cancelled: bool,
}

/// A request that was sent and is waiting for its response.
pub(crate) struct PendingEntry {
    // ---
    pub request_message: Message,
    pub request_options: Arc<RequestOptions>,
    pub reply: oneshot::Sender<Settlement>,
    pub timer: Option<RequestTimer>,
}

/// Tracks in-flight requests by track id.
///
/// Whoever removes an entry first (response, error or timer) owns its
/// settlement; later arrivals find nothing and are ignored.
pub(crate) struct PendingRequests {
    // ---
    requests: HashMap<TrackId, PendingEntry>,
}

impl PendingRequests {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
        }
    }

    /// Register a pending request.
    ///
    /// Returns the entry previously stored under the same track id, if any.
    pub fn register(&mut self, entry: PendingEntry) -> Option<PendingEntry> {
        // ---
        self.requests
            .insert(entry.request_message.track_id.clone(), entry)
    }

    /// Remove an entry so the caller can settle it.
    pub fn take(&mut self, track_id: &TrackId) -> Option<PendingEntry> {
        // ---
        self.requests.remove(track_id)
    }

    pub fn request_message(&self, track_id: &TrackId) -> Option<&Message> {
        // ---
        self.requests.get(track_id).map(|e| &e.request_message)
    }

    /// Mark a live request cancelled. Returns false if it is not pending.
    pub fn cancel(&mut self, track_id: &TrackId) -> bool {
        // ---
        match self.requests.get_mut(track_id) {
            Some(entry) => {
                entry.request_message.mark_cancelled();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        // ---
        self.requests.len()
    }
}
