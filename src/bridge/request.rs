//! Per-request options and the correlation record handed back to callers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Message, RequestCallback, Result};

/// Options for one command or query.
///
/// Every `Option` switch left as `None` falls back to the matching channel
/// default in [`BridgeOptions`](crate::BridgeOptions); a `Some` always wins.
#[derive(Clone)]
pub struct RequestOptions<TReq = Value> {
    pub name: String,
    pub payload: TReq,
    pub module: Option<String>,
    pub schema: Option<Value>,
    pub on_success: Option<RequestCallback>,
    pub on_error: Option<RequestCallback>,
    pub timeout: Option<Duration>,
    pub resolve_cancelled_for_non_tracked: Option<bool>,
    pub send_cancelled: Option<bool>,
    pub call_on_error_when_request_is_cancelled: Option<bool>,
    pub call_on_success_when_request_is_cancelled: Option<bool>,
    pub allow_response_value_when_cancelled: Option<bool>,
}

impl<TReq> RequestOptions<TReq> {
    // ---

    pub fn new(name: impl Into<String>, payload: TReq) -> Self {
        // ---
        Self {
            name: name.into(),
            payload,
            module: None,
            schema: None,
            on_success: None,
            on_error: None,
            timeout: None,
            resolve_cancelled_for_non_tracked: None,
            send_cancelled: None,
            call_on_error_when_request_is_cancelled: None,
            call_on_success_when_request_is_cancelled: None,
            allow_response_value_when_cancelled: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_on_success(
        mut self,
        f: impl Fn(&RequestResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn with_on_error(mut self, f: impl Fn(&RequestResponse) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn with_resolve_cancelled_for_non_tracked(mut self, value: bool) -> Self {
        self.resolve_cancelled_for_non_tracked = Some(value);
        self
    }

    pub fn with_send_cancelled(mut self, value: bool) -> Self {
        self.send_cancelled = Some(value);
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
}

impl<TReq: Serialize> RequestOptions<TReq> {
    // ---

    /// Serialize the payload, keeping every other setting.
    pub fn into_raw(self) -> Result<RequestOptions> {
        // ---
        Ok(RequestOptions {
            payload: serde_json::to_value(&self.payload)?,
            name: self.name,
            module: self.module,
            schema: self.schema,
            on_success: self.on_success,
            on_error: self.on_error,
            timeout: self.timeout,
            resolve_cancelled_for_non_tracked: self.resolve_cancelled_for_non_tracked,
            send_cancelled: self.send_cancelled,
            call_on_error_when_request_is_cancelled: self.call_on_error_when_request_is_cancelled,
            call_on_success_when_request_is_cancelled: self
                .call_on_success_when_request_is_cancelled,
            allow_response_value_when_cancelled: self.allow_response_value_when_cancelled,
        })
    }
}

impl<TReq: fmt::Debug> fmt::Debug for RequestOptions<TReq> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.debug_struct("RequestOptions")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("module", &self.module)
            .field("timeout", &self.timeout)
            .field("send_cancelled", &self.send_cancelled)
            .field(
                "resolve_cancelled_for_non_tracked",
                &self.resolve_cancelled_for_non_tracked,
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
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options for one pushed event.
#[derive(Debug, Clone)]
pub struct EventOptions<T = Value> {
    pub name: String,
    pub payload: T,
    pub module: Option<String>,
    pub send_cancelled: Option<bool>,
}

impl<T> EventOptions<T> {
    // ---

    pub fn new(name: impl Into<String>, payload: T) -> Self {
        // ---
        Self {
            name: name.into(),
            payload,
            module: None,
            send_cancelled: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_send_cancelled(mut self, value: bool) -> Self {
        self.send_cancelled = Some(value);
        self
    }
}

impl<T: Serialize> EventOptions<T> {
    pub fn into_raw(self) -> Result<EventOptions> {
        // ---
        Ok(EventOptions {
            payload: serde_json::to_value(&self.payload)?,
            name: self.name,
            module: self.module,
            send_cancelled: self.send_cancelled,
        })
    }
}

/// Why a tracked request failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorReason<TErr = Value> {
    /// Payload of the `Error` message the server sent back.
    Remote(TErr),
    /// Failure synthesized locally (timeout, transport failure).
    Local(String),
}

impl<TErr> ErrorReason<TErr> {
    // ---

    pub fn remote(&self) -> Option<&TErr> {
        // ---
        match self {
            ErrorReason::Remote(err) => Some(err),
            ErrorReason::Local(_) => None,
        }
    }

    pub fn local(&self) -> Option<&str> {
        // ---
        match self {
            ErrorReason::Local(reason) => Some(reason),
            ErrorReason::Remote(_) => None,
        }
    }
}

impl<TErr: fmt::Display> fmt::Display for ErrorReason<TErr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            ErrorReason::Remote(err) => write!(f, "{err}"),
            ErrorReason::Local(reason) => f.write_str(reason),
        }
    }
}

/// Full correlation record of a settled request.
///
/// `is_error` tells success from failure. On success `response` holds the
/// response payload (hidden when the request was cancelled, unless allowed);
/// on failure `error` and `error_message` describe what went wrong and
/// `response` is `None`.
#[derive(Debug, Clone)]
pub struct RequestResponse<TReq = Value, TResp = Value, TErr = Value> {
    pub request: TReq,
    pub response: Option<TResp>,
    pub request_message: Message,
    pub response_message: Option<Message>,
    pub request_options: Arc<RequestOptions>,
    pub is_error: bool,
    pub error: Option<ErrorReason<TErr>>,
    pub error_message: Option<Message>,
    pub cancelled: bool,
    pub timed_out: bool,
}

impl RequestResponse {
    // ---

    /// Deserialize the opaque payloads into concrete types.
    ///
    /// A remote error payload that does not fit `TErr` becomes an
    /// [`ErrorReason::Local`] quoting the raw payload; `error_message` keeps
    /// the original envelope.
    pub fn decode<TReq, TResp, TErr>(self) -> Result<RequestResponse<TReq, TResp, TErr>>
    where
        TReq: DeserializeOwned,
        TResp: DeserializeOwned,
        TErr: DeserializeOwned,
    {
        // ---
        let response = match self.response {
            Some(value) => serde_json::from_value::<Option<TResp>>(value)?,
            None => None,
        };

        let error = match self.error {
            // An error payload of the wrong shape must not lose the record.
            Some(ErrorReason::Remote(value)) => match serde_json::from_value::<TErr>(value.clone()) {
                Ok(err) => Some(ErrorReason::Remote(err)),
                Err(err) => Some(ErrorReason::Local(format!(
                    "undecodable error payload ({err}): {value}"
                ))),
            },
            Some(ErrorReason::Local(reason)) => Some(ErrorReason::Local(reason)),
            None => None,
        };

        Ok(RequestResponse {
            request: serde_json::from_value(self.request)?,
            response,
            request_message: self.request_message,
            response_message: self.response_message,
            request_options: self.request_options,
            is_error: self.is_error,
            error,
            error_message: self.error_message,
            cancelled: self.cancelled,
            timed_out: self.timed_out,
        })
    }

    /// One-line description of the failure, for error display.
    pub(crate) fn reason_text(&self) -> String {
        // ---
        match &self.error {
            Some(reason) => reason.to_string(),
            None if self.cancelled => "cancelled".to_string(),
            None => "no error payload".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::create_query_message;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Items {
        items: Vec<u32>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ServerError {
        message: String,
    }

    fn record(response: Option<Value>, error: Option<ErrorReason>) -> RequestResponse {
        // ---
        RequestResponse {
            request: json!({ "search": "1" }),
            response,
            request_message: create_query_message("Q", json!({ "search": "1" })),
            response_message: None,
            request_options: Arc::new(RequestOptions::new("Q", json!({ "search": "1" }))),
            is_error: error.is_some(),
            error,
            error_message: None,
            cancelled: false,
            timed_out: false,
        }
    }

    #[test]
    fn decode_typed_response() {
        // ---
        let typed = record(Some(json!({ "items": [1, 2] })), None)
            .decode::<Value, Items, Value>()
            .unwrap();
        assert_eq!(typed.response, Some(Items { items: vec![1, 2] }));
    }

    #[test]
    fn decode_keeps_local_reasons_verbatim() {
        // ---
        let typed = record(None, Some(ErrorReason::Local("Timeout after 5ms".into())))
            .decode::<Value, Items, ServerError>()
            .unwrap();
        assert_eq!(typed.error.unwrap().local(), Some("Timeout after 5ms"));
    }

    #[test]
    fn decode_remote_error_payload() {
        // ---
        let typed = record(None, Some(ErrorReason::Remote(json!({ "message": "not found" }))))
            .decode::<Value, Items, ServerError>()
            .unwrap();
        assert_eq!(
            typed.error.unwrap().remote().map(|e| e.message.as_str()),
            Some("not found")
        );
    }

    #[test]
    fn decode_mismatched_error_payload_keeps_record() {
        // ---
        let mut raw = record(None, Some(ErrorReason::Remote(json!({ "message": "not found" }))));
        raw.error_message = Some(create_query_message("Error", json!({ "message": "not found" })));

        let typed = raw.decode::<Value, Items, String>().unwrap();

        assert!(typed.is_error);
        let reason = typed.error.as_ref().and_then(|e| e.local()).unwrap();
        assert!(reason.starts_with("undecodable error payload"), "{reason}");
        assert!(reason.contains("not found"), "{reason}");
        assert_eq!(
            typed.error_message.unwrap().payload,
            json!({ "message": "not found" })
        );
    }

    #[test]
    fn request_options_into_raw_keeps_settings() {
        // ---
        #[derive(serde::Serialize)]
        struct Search {
            search: String,
        }

        let raw = RequestOptions::new("Q", Search { search: "1".into() })
            .with_timeout(Duration::from_millis(5))
            .with_send_cancelled(true)
            .into_raw()
            .unwrap();

        assert_eq!(raw.timeout, Some(Duration::from_millis(5)));
        assert_eq!(raw.send_cancelled, Some(true));
        assert_eq!(raw.payload, json!({ "search": "1" }));
    }
}
