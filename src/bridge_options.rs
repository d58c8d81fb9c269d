//! Channel-wide configuration and hooks.
//!
//! [`BridgeOptions`] holds the defaults every request falls back to, the
//! lifecycle hooks, the interception transforms and the logging switches.
//! Every field is optional so that a partial value can be merged into the
//! live options with [`MessageBridge::set_options`](crate::MessageBridge::set_options):
//! `Some` overrides, `None` leaves the current value alone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{CreatedEvent, CreatedMessage, ErrorEvent, Message, RequestResponse};

/// Hook receiving a message (`on_message`, `on_send`).
pub type MessageHook = Arc<dyn Fn(&Message) + Send + Sync>;

/// Pure `Message → Message` transform (send/receive interception).
pub type MessageTransform = Arc<dyn Fn(Message) -> Message + Send + Sync>;

/// Hook receiving every error the bridge reports.
pub type ErrorHook = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Hook fired when the channel closes, with the reason if one is known.
pub type CloseHook = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Hook fired once the channel is connected.
pub type ConnectHook = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving a settled correlation record.
pub type RequestCallback = Arc<dyn Fn(&RequestResponse) + Send + Sync>;

/// Transform applied to every [`CreatedMessage`] before it is returned.
pub type CreatedMessageInterceptor = Arc<dyn Fn(CreatedMessage) -> CreatedMessage + Send + Sync>;

/// Transform applied to every [`CreatedEvent`] before it is returned.
pub type CreatedEventInterceptor = Arc<dyn Fn(CreatedEvent) -> CreatedEvent + Send + Sync>;

/// Builds the human readable timeout reason from the effective timeout.
pub type TimeoutReasonFormatter = Arc<dyn Fn(Duration) -> String + Send + Sync>;

/// Sink for formatted log lines.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Formats one message into a log line.
pub type MessageFormatter = Arc<dyn Fn(&Message) -> String + Send + Sync>;

/// Formats a decode failure (`error`, `raw input`) into a log line.
pub type ParseErrorFormatter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Restricts message logging to matching message names.
#[derive(Clone)]
pub enum MessageFilter {
    /// Name equals the string.
    Exact(String),
    /// Name contains the string.
    Contains(String),
    /// Arbitrary predicate over the name.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl MessageFilter {
    // ---

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        MessageFilter::Predicate(Arc::new(f))
    }

    /// `true` if a message with this name passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        // ---
        match self {
            MessageFilter::Exact(expected) => name == expected,
            MessageFilter::Contains(fragment) => name.contains(fragment.as_str()),
            MessageFilter::Predicate(f) => f(name),
        }
    }
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            MessageFilter::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            MessageFilter::Contains(s) => f.debug_tuple("Contains").field(s).finish(),
            MessageFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Channel-wide defaults and hooks.
///
/// Request-level settings in [`RequestOptions`](crate::RequestOptions) always
/// win over the matching field here when they are set.
#[derive(Clone, Default)]
pub struct BridgeOptions {
    // --- listeners
    pub on_message: Option<MessageHook>,
    pub on_send: Option<MessageHook>,
    pub on_error: Option<ErrorHook>,
    pub on_close: Option<CloseHook>,
    pub on_connect: Option<ConnectHook>,
    pub on_success: Option<RequestCallback>,

    // --- interception
    /// Applied to every outgoing request/event after direction is fixed,
    /// before it is tracked or sent.
    pub intercept_send_message: Option<MessageTransform>,
    /// Applied to every inbound message after decoding, before history,
    /// `on_message` and dispatch.
    pub intercept_received_message: Option<MessageTransform>,
    pub intercept_created_message_options: Option<CreatedMessageInterceptor>,
    pub intercept_created_event_message_options: Option<CreatedEventInterceptor>,

    // --- errors and timeouts
    pub avoid_throw_on_non_tracked_error: Option<bool>,
    pub throw_on_tracked_error: Option<bool>,
    pub timeout: Option<Duration>,
    pub timeout_from_bridge_options_message: Option<TimeoutReasonFormatter>,
    pub timeout_from_request_options_message: Option<TimeoutReasonFormatter>,

    // --- cancellation defaults
    pub send_cancelled_request: Option<bool>,
    pub resolve_cancelled_non_tracked_request: Option<bool>,
    pub call_on_error_when_request_is_cancelled: Option<bool>,
    pub call_on_success_when_request_is_cancelled: Option<bool>,
    pub allow_response_value_when_cancelled: Option<bool>,

    // --- history
    pub keep_history_for_received_messages: Option<bool>,
    pub keep_history_for_sending_messages: Option<bool>,

    // --- logging
    pub logger: Option<Logger>,
    pub log_parse_incoming_message_error: Option<bool>,
    pub log_parse_incoming_message_error_format: Option<ParseErrorFormatter>,
    pub log_message_received: Option<bool>,
    pub log_message_received_format: Option<MessageFormatter>,
    pub log_message_received_filter: Option<MessageFilter>,
    pub log_sending_message: Option<bool>,
    pub log_sending_message_format: Option<MessageFormatter>,
    pub log_sending_message_filter: Option<MessageFilter>,
}

macro_rules! merge_fields {
    ($target:ident, $patch:ident, $($field:ident),* $(,)?) => {
        $(
            if $patch.$field.is_some() {
                $target.$field = $patch.$field;
            }
        )*
    };
}

impl BridgeOptions {
    // ---

    /// Options with every built-in default filled in.
    ///
    /// This is what a new bridge starts from. `BridgeOptions::default()`
    /// on the other hand is the empty patch.
    pub fn with_defaults() -> Self {
        // ---
        Self {
            allow_response_value_when_cancelled: Some(false),
            keep_history_for_received_messages: Some(false),
            keep_history_for_sending_messages: Some(false),
            log_parse_incoming_message_error: Some(true),
            log_message_received: Some(false),
            log_sending_message: Some(false),
            timeout_from_bridge_options_message: Some(Arc::new(|timeout: Duration| {
                format!("Timeout after {}ms (BridgeOptions.timeout)", timeout.as_millis())
            })),
            timeout_from_request_options_message: Some(Arc::new(|timeout: Duration| {
                format!("Timeout after {}ms (RequestOptions.timeout)", timeout.as_millis())
            })),
            log_parse_incoming_message_error_format: Some(Arc::new(|err: &str, raw: &str| {
                format!("Bridge-Error (parse messageReceived): {err}: {raw}")
            })),
            log_message_received_format: Some(Arc::new(|msg: &Message| {
                format!("Bridge (messageReceived): {msg:?}")
            })),
            log_sending_message_format: Some(Arc::new(|msg: &Message| {
                format!("Bridge (sendingMessage): {msg:?}")
            })),
            ..Self::default()
        }
    }

    /// Shallow merge: every `Some` field of `patch` replaces the current one.
    pub fn merge(&mut self, patch: BridgeOptions) {
        // ---
        merge_fields!(
            self,
            patch,
            on_message,
            on_send,
            on_error,
            on_close,
            on_connect,
            on_success,
            intercept_send_message,
            intercept_received_message,
            intercept_created_message_options,
            intercept_created_event_message_options,
            avoid_throw_on_non_tracked_error,
            throw_on_tracked_error,
            timeout,
            timeout_from_bridge_options_message,
            timeout_from_request_options_message,
            send_cancelled_request,
            resolve_cancelled_non_tracked_request,
            call_on_error_when_request_is_cancelled,
            call_on_success_when_request_is_cancelled,
            allow_response_value_when_cancelled,
            keep_history_for_received_messages,
            keep_history_for_sending_messages,
            logger,
            log_parse_incoming_message_error,
            log_parse_incoming_message_error_format,
            log_message_received,
            log_message_received_format,
            log_message_received_filter,
            log_sending_message,
            log_sending_message_format,
            log_sending_message_filter,
        );
    }

    /// Read a boolean switch; unset means `false`.
    pub(crate) fn flag(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }

    // --- builder methods

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_on_message(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn with_on_send(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    pub fn with_on_error(mut self, f: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn with_on_close(mut self, f: impl Fn(Option<&str>) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn with_on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    pub fn with_on_success(
        mut self,
        f: impl Fn(&RequestResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn with_intercept_send_message(
        mut self,
        f: impl Fn(Message) -> Message + Send + Sync + 'static,
    ) -> Self {
        self.intercept_send_message = Some(Arc::new(f));
        self
    }

    pub fn with_intercept_received_message(
        mut self,
        f: impl Fn(Message) -> Message + Send + Sync + 'static,
    ) -> Self {
        self.intercept_received_message = Some(Arc::new(f));
        self
    }

    pub fn with_intercept_created_message_options(
        mut self,
        f: impl Fn(CreatedMessage) -> CreatedMessage + Send + Sync + 'static,
    ) -> Self {
        self.intercept_created_message_options = Some(Arc::new(f));
        self
    }

    pub fn with_intercept_created_event_message_options(
        mut self,
        f: impl Fn(CreatedEvent) -> CreatedEvent + Send + Sync + 'static,
    ) -> Self {
        self.intercept_created_event_message_options = Some(Arc::new(f));
        self
    }

    pub fn with_avoid_throw_on_non_tracked_error(mut self, value: bool) -> Self {
        self.avoid_throw_on_non_tracked_error = Some(value);
        self
    }

    pub fn with_throw_on_tracked_error(mut self, value: bool) -> Self {
        self.throw_on_tracked_error = Some(value);
        self
    }

    pub fn with_timeout_from_bridge_options_message(
        mut self,
        f: impl Fn(Duration) -> String + Send + Sync + 'static,
    ) -> Self {
        self.timeout_from_bridge_options_message = Some(Arc::new(f));
        self
    }

    pub fn with_timeout_from_request_options_message(
        mut self,
        f: impl Fn(Duration) -> String + Send + Sync + 'static,
    ) -> Self {
        self.timeout_from_request_options_message = Some(Arc::new(f));
        self
    }

    pub fn with_send_cancelled_request(mut self, value: bool) -> Self {
        self.send_cancelled_request = Some(value);
        self
    }

    pub fn with_resolve_cancelled_non_tracked_request(mut self, value: bool) -> Self {
        self.resolve_cancelled_non_tracked_request = Some(value);
        self
    }

    pub fn with_call_on_error_when_request_is_cancelled(mut self, value: bool) -> Self {
        self.call_on_error_when_request_is_cancelled = Some(value);
        self
    }

    pub fn with_call_on_success_when_request_is_cancelled(mut self, value: bool) -> Self {
        self.call_on_success_when_request_is_cancelled = Some(value);
        self
    }

    pub fn with_allow_response_value_when_cancelled(mut self, value: bool) -> Self {
        self.allow_response_value_when_cancelled = Some(value);
        self
    }

    pub fn with_keep_history_for_received_messages(mut self, value: bool) -> Self {
        self.keep_history_for_received_messages = Some(value);
        self
    }

    pub fn with_keep_history_for_sending_messages(mut self, value: bool) -> Self {
        self.keep_history_for_sending_messages = Some(value);
        self
    }

    pub fn with_logger(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Arc::new(f));
        self
    }

    pub fn with_log_parse_incoming_message_error(mut self, value: bool) -> Self {
        self.log_parse_incoming_message_error = Some(value);
        self
    }

    pub fn with_log_parse_incoming_message_error_format(
        mut self,
        f: impl Fn(&str, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.log_parse_incoming_message_error_format = Some(Arc::new(f));
        self
    }

    pub fn with_log_message_received(mut self, value: bool) -> Self {
        self.log_message_received = Some(value);
        self
    }

    pub fn with_log_message_received_format(
        mut self,
        f: impl Fn(&Message) -> String + Send + Sync + 'static,
    ) -> Self {
        self.log_message_received_format = Some(Arc::new(f));
        self
    }

    pub fn with_log_message_received_filter(mut self, filter: MessageFilter) -> Self {
        self.log_message_received_filter = Some(filter);
        self
    }

    pub fn with_log_sending_message(mut self, value: bool) -> Self {
        self.log_sending_message = Some(value);
        self
    }

    pub fn with_log_sending_message_format(
        mut self,
        f: impl Fn(&Message) -> String + Send + Sync + 'static,
    ) -> Self {
        self.log_sending_message_format = Some(Arc::new(f));
        self
    }

    pub fn with_log_sending_message_filter(mut self, filter: MessageFilter) -> Self {
        self.log_sending_message_filter = Some(filter);
        self
    }
}

impl fmt::Debug for BridgeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        // hooks are opaque; show which ones are installed
        f.debug_struct("BridgeOptions")
            .field("timeout", &self.timeout)
            .field("avoid_throw_on_non_tracked_error", &self.avoid_throw_on_non_tracked_error)
            .field("throw_on_tracked_error", &self.throw_on_tracked_error)
            .field("send_cancelled_request", &self.send_cancelled_request)
            .field(
                "resolve_cancelled_non_tracked_request",
                &self.resolve_cancelled_non_tracked_request,
            )
            .field(
                "call_on_error_when_request_is_cancelled",
                &self.call_on_error_when_request_is_cancelled,
            )
            .field(
                "call_on_success_when_request_is_cancelled",
                &self.call_on_success_when_request_is_cancelled,
            )
            .field(
                "allow_response_value_when_cancelled",
                &self.allow_response_value_when_cancelled,
            )
            .field(
                "keep_history_for_received_messages",
                &self.keep_history_for_received_messages,
            )
            .field(
                "keep_history_for_sending_messages",
                &self.keep_history_for_sending_messages,
            )
            .field("log_message_received", &self.log_message_received)
            .field("log_message_received_filter", &self.log_message_received_filter)
            .field("log_sending_message", &self.log_sending_message)
            .field("log_sending_message_filter", &self.log_sending_message_filter)
            .field("on_error", &self.on_error.is_some())
            .field("intercept_send_message", &self.intercept_send_message.is_some())
            .field(
                "intercept_received_message",
                &self.intercept_received_message.is_some(),
            )
            .finish_non_exhaustive()
    }
}
