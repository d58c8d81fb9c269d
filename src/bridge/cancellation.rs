//! Cancellation rules.
//!
//! Every rule reads a request-level switch first and falls back to the
//! channel default only when the request leaves it unset.

use serde_json::Value;

use crate::{BridgeOptions, Message, RequestOptions};

/// Request-level switch if set, else the channel default, else `false`.
fn resolve(request: Option<bool>, channel: Option<bool>) -> bool {
    request.or(channel).unwrap_or(false)
}

/// `true` when a cancelled outbound message must not reach the transport.
///
/// Messages that are not cancelled are never suppressed.
pub(crate) fn should_suppress_send(
    send_cancelled: Option<bool>,
    message: &Message,
    bridge: &BridgeOptions,
) -> bool {
    // ---
    message.cancelled && !resolve(send_cancelled, bridge.send_cancelled_request)
}

/// Cancellation view of one tracked request against the live options.
pub(crate) struct CancellationPolicy<'a> {
    request: &'a RequestOptions,
    bridge: &'a BridgeOptions,
}

impl<'a> CancellationPolicy<'a> {
    // ---

    pub(crate) fn new(request: &'a RequestOptions, bridge: &'a BridgeOptions) -> Self {
        Self { request, bridge }
    }

    /// Cancelled on either side, unless the request asks to be treated as
    /// never cancelled.
    pub(crate) fn is_effectively_cancelled(
        &self,
        request_message: &Message,
        response_message: Option<&Message>,
    ) -> bool {
        // ---
        let cancelled =
            request_message.cancelled || response_message.is_some_and(|m| m.cancelled);

        cancelled
            && !resolve(
                self.request.resolve_cancelled_for_non_tracked,
                self.bridge.resolve_cancelled_non_tracked_request,
            )
    }

    /// Payload handed to the caller. Hidden for effectively cancelled requests
    /// unless response values are explicitly allowed.
    pub(crate) fn resolve_response_value(&self, cancelled: bool, raw: Value) -> Option<Value> {
        // ---
        let allowed = resolve(
            self.request.allow_response_value_when_cancelled,
            self.bridge.allow_response_value_when_cancelled,
        );
        (!cancelled || allowed).then_some(raw)
    }

    pub(crate) fn should_call_on_success(&self, cancelled: bool) -> bool {
        // ---
        !cancelled
            || resolve(
                self.request.call_on_success_when_request_is_cancelled,
                self.bridge.call_on_success_when_request_is_cancelled,
            )
    }

    pub(crate) fn should_call_on_error(&self, cancelled: bool) -> bool {
        // ---
        !cancelled
            || resolve(
                self.request.call_on_error_when_request_is_cancelled,
                self.bridge.call_on_error_when_request_is_cancelled,
            )
    }
}
