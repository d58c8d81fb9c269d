//! Request timeout resolution and the per-request timer.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::BridgeOptions;

/// Effective timeout for a request and the reason text reported on expiry.
///
/// A request-level timeout wins over the channel timeout. `None` means the
/// request waits indefinitely.
pub(crate) fn effective_timeout(
    request_timeout: Option<Duration>,
    bridge: &BridgeOptions,
) -> Option<(Duration, String)> {
    // ---
    let (after, formatter) = match (request_timeout, bridge.timeout) {
        (Some(after), _) => (after, &bridge.timeout_from_request_options_message),
        (None, Some(after)) => (after, &bridge.timeout_from_bridge_options_message),
        (None, None) => return None,
    };

    let reason = match formatter {
        Some(format) => format(after),
        None => format!("timeout after {}ms", after.as_millis()),
    };

    Some((after, reason))
}

/// One-shot timer armed for a pending request.
///
/// Dropping the timer aborts it, so removing the pending entry is enough to
/// guarantee the timeout never fires afterwards.
pub(crate) struct RequestTimer {
    task: JoinHandle<()>,
}

impl RequestTimer {
    // ---

    /// Spawn a timer that runs `on_expire` once `after` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn arm<F>(after: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        // ---
        let task = tokio::spawn(async move {
            time::sleep(after).await;
            on_expire();
        });

        Self { task }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
