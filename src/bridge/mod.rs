// src/bridge/mod.rs
//! Request/response correlation over a message channel.
//!
//! This module contains [`MessageBridge`], which sends commands, queries and
//! events through a [`Transport`](crate::Transport) and matches inbound
//! responses to the requests that caused them.
//!
//! # Architecture
//!
//! Every command and query carries a unique track id. Before the message is
//! handed to the transport, a pending entry (request message, options, a
//! oneshot reply channel and an optional timer) is registered under that id.
//!
//! `connect()` spawns a receive loop that decodes inbound frames and routes
//! them:
//!
//! - `Event` messages go to the event dispatcher and never touch pending
//!   state,
//! - responses and errors settle the pending entry with the same track id,
//! - an `Error` with no pending entry is reported through `on_error`.
//!
//! # Settlement
//!
//! A pending entry is settled by whoever removes it from the table first:
//! the matching response, the matching error, the timer, or a failed send.
//! Later arrivals find no entry and are ignored, so every request settles
//! exactly once and no callback fires after settlement.

mod cancellation;
mod created;
mod pending;
mod request;
mod timeout;

pub use created::{CreatedEvent, CreatedMessage};
pub use request::{ErrorReason, EventOptions, RequestOptions, RequestResponse};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use cancellation::{should_suppress_send, CancellationPolicy};
use pending::{PendingEntry, PendingRequests, Settlement};
use timeout::{effective_timeout, RequestTimer};

use crate::{
    // ---
    create_message,
    create_message_from_dto,
    lock_ignore_poison,
    macros::{log_debug, log_error, log_info, log_warn},
    BridgeError,
    BridgeOptions,
    ErrorEvent,
    EventCallback,
    EventDispatcher,
    EventNames,
    EventSubscription,
    Frame,
    Message,
    MessageDirection,
    MessageDto,
    MessageFilter,
    MessageType,
    NewMessage,
    Result,
    TrackId,
    TransportEvent,
    TransportPtr,
};

/// Result of an untracked send, before it is narrowed to a payload.
pub(crate) enum BareOutcome {
    Response(Option<Value>),
    /// The request failed but `avoid_throw_on_non_tracked_error` is set;
    /// carries the error message payload.
    SuppressedError(Option<Value>),
}

enum Dispatch {
    /// Cancelled before sending; nothing reached the transport.
    Suppressed(RequestResponse),
    Pending(oneshot::Receiver<Settlement>),
}

/// Why a pending request failed.
enum FailureCause {
    Remote(Message),
    Timeout(String),
    Transport(String),
}

/// Running bridge instance.
///
/// Cheap to clone (internally `Arc`-backed).
#[derive(Clone)]
pub struct MessageBridge {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    options: Mutex<BridgeOptions>,
    pending: Mutex<PendingRequests>,
    events: EventDispatcher,
    history: Mutex<Vec<Message>>,
    bridge_errors: Mutex<Vec<ErrorEvent>>,
    connected: AtomicBool,
    rx_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        if let Some(task) = lock_ignore_poison(&self.rx_task).take() {
            task.abort();
        }
    }
}

impl MessageBridge {
    // ---

    /// Create a bridge over `transport` with the built-in defaults.
    pub fn new(transport: TransportPtr) -> Self {
        Self::with_options(transport, BridgeOptions::default())
    }

    /// Create a bridge and merge `options` over the built-in defaults.
    pub fn with_options(transport: TransportPtr, options: BridgeOptions) -> Self {
        // ---
        let mut merged = BridgeOptions::with_defaults();
        merged.merge(options);

        Self {
            inner: Arc::new(Inner {
                transport,
                options: Mutex::new(merged),
                pending: Mutex::new(PendingRequests::new()),
                events: EventDispatcher::new(),
                history: Mutex::new(Vec::new()),
                bridge_errors: Mutex::new(Vec::new()),
                connected: AtomicBool::new(false),
                rx_task: Mutex::new(None),
            }),
        }
    }

    /// Merge `patch` into the live options. Fields left `None` keep their value.
    pub fn set_options(&self, patch: BridgeOptions) {
        lock_ignore_poison(&self.inner.options).merge(patch);
    }

    /// Edit the live options in place, e.g. to reset a field to `None`.
    pub fn update_options(&self, f: impl FnOnce(&mut BridgeOptions)) {
        f(&mut lock_ignore_poison(&self.inner.options));
    }

    /// Snapshot of the live options.
    pub fn options(&self) -> BridgeOptions {
        lock_ignore_poison(&self.inner.options).clone()
    }

    pub fn transport(&self) -> &TransportPtr {
        &self.inner.transport
    }

    // --- lifecycle

    /// Open the transport and start the receive loop.
    ///
    /// Connecting again replaces the previous receive loop.
    ///
    /// # Errors
    ///
    /// Returns whatever the transport reports when it cannot connect.
    pub async fn connect(&self) -> Result<()> {
        // ---
        let mut handle = self.inner.transport.connect().await?;
        let weak = Arc::downgrade(&self.inner);

        let rx_task = tokio::spawn(async move {
            // ---
            while let Some(event) = handle.inbox.recv().await {
                let Some(inner) = weak.upgrade() else {
                    // Bridge was dropped
                    break;
                };
                MessageBridge { inner }.handle_transport_event(event);
            }
            log_debug!("bridge inbox closed");
        });

        if let Some(previous) = lock_ignore_poison(&self.inner.rx_task).replace(rx_task) {
            previous.abort();
        }

        self.inner.connected.store(true, Ordering::SeqCst);
        log_info!(
            "bridge connected via {} ({})",
            self.inner.transport.transport_id(),
            self.inner.transport.uri().unwrap_or("no uri")
        );

        if let Some(on_connect) = self.options().on_connect {
            on_connect();
        }
        Ok(())
    }

    /// Close the transport.
    ///
    /// Pending requests are left in place; they still settle through a
    /// timeout if one is configured.
    pub async fn close(&self) -> Result<()> {
        // ---
        self.inner.transport.close().await?;
        self.handle_closed(None);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    // --- request creation

    /// Build a command without sending it.
    ///
    /// `intercept_created_message_options` is applied to the result.
    pub fn create_command<TReq: Serialize>(
        &self,
        options: RequestOptions<TReq>,
    ) -> Result<CreatedMessage> {
        self.create_request(MessageType::Command, options)
    }

    /// Build a query without sending it.
    pub fn create_query<TReq: Serialize>(
        &self,
        options: RequestOptions<TReq>,
    ) -> Result<CreatedMessage> {
        self.create_request(MessageType::Query, options)
    }

    fn create_request<TReq: Serialize>(
        &self,
        message_type: MessageType,
        options: RequestOptions<TReq>,
    ) -> Result<CreatedMessage> {
        // ---
        let options = options.into_raw()?;

        let mut new = NewMessage::new(options.name.clone(), message_type, options.payload.clone());
        if let Some(module) = &options.module {
            new = new.module(module.clone());
        }
        if let Some(schema) = &options.schema {
            new = new.schema(schema.clone());
        }

        let created = CreatedMessage::new(self.clone(), create_message(new), Arc::new(options));

        Ok(match self.options().intercept_created_message_options {
            Some(intercept) => intercept(created),
            None => created,
        })
    }

    /// Build an event without sending it.
    ///
    /// `intercept_created_event_message_options` is applied to the result.
    pub fn create_event<T: Serialize>(&self, options: EventOptions<T>) -> Result<CreatedEvent> {
        // ---
        let options = options.into_raw()?;

        let mut new = NewMessage::new(options.name.clone(), MessageType::Event, options.payload.clone())
            .direction(MessageDirection::ToServer);
        if let Some(module) = &options.module {
            new = new.module(module.clone());
        }

        let created = CreatedEvent::new(self.clone(), create_message(new), Arc::new(options));

        Ok(match self.options().intercept_created_event_message_options {
            Some(intercept) => intercept(created),
            None => created,
        })
    }

    // --- sending

    /// Send a command and resolve with its decoded response payload.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Request` when the command fails (server error,
    ///   timeout or transport failure) and errors are not suppressed
    /// - `BridgeError::Serialization` when the payload or response does not
    ///   (de)serialize
    pub async fn send_command<TReq, TResp>(
        &self,
        options: RequestOptions<TReq>,
    ) -> Result<Option<TResp>>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        self.create_command(options)?.send().await
    }

    /// Send a command and resolve with the decoded correlation record.
    ///
    /// Failures resolve as a record with `is_error` set unless
    /// `throw_on_tracked_error` is enabled.
    pub async fn send_command_tracked<TReq, TResp, TErr>(
        &self,
        options: RequestOptions<TReq>,
    ) -> Result<RequestResponse<TReq, TResp, TErr>>
    where
        TReq: Serialize + DeserializeOwned,
        TResp: DeserializeOwned,
        TErr: DeserializeOwned,
    {
        self.create_command(options)?.send_tracked().await?.decode()
    }

    /// Send a query and resolve with its decoded response payload.
    pub async fn send_query<TReq, TResp>(&self, options: RequestOptions<TReq>) -> Result<Option<TResp>>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        self.create_query(options)?.send().await
    }

    /// Send a query and resolve with the decoded correlation record.
    pub async fn send_query_tracked<TReq, TResp, TErr>(
        &self,
        options: RequestOptions<TReq>,
    ) -> Result<RequestResponse<TReq, TResp, TErr>>
    where
        TReq: Serialize + DeserializeOwned,
        TResp: DeserializeOwned,
        TErr: DeserializeOwned,
    {
        self.create_query(options)?.send_tracked().await?.decode()
    }

    /// Fire-and-forget event.
    pub async fn send_event<T: Serialize>(&self, options: EventOptions<T>) -> Result<()> {
        self.create_event(options)?.send().await
    }

    /// Send a prebuilt request and resolve with the raw response payload.
    ///
    /// Resolves `Ok(None)` for cancelled requests. When the request fails
    /// and `avoid_throw_on_non_tracked_error` is set, resolves with the error
    /// message payload instead of failing.
    pub async fn send_message(
        &self,
        request_message: Message,
        request_options: RequestOptions,
    ) -> Result<Option<Value>> {
        // ---
        match self
            .send_untracked(request_message, Arc::new(request_options))
            .await?
        {
            BareOutcome::Response(value) | BareOutcome::SuppressedError(value) => Ok(value),
        }
    }

    /// Send a prebuilt request and resolve with the full correlation record.
    pub async fn send_message_tracked(
        &self,
        request_message: Message,
        request_options: RequestOptions,
    ) -> Result<RequestResponse> {
        self.send_tracked(request_message, Arc::new(request_options))
            .await
    }

    pub(crate) async fn send_untracked(
        &self,
        request_message: Message,
        request_options: Arc<RequestOptions>,
    ) -> Result<BareOutcome> {
        // ---
        let settled = match self.dispatch(request_message, request_options).await? {
            Dispatch::Suppressed(_) => return Ok(BareOutcome::Response(None)),
            Dispatch::Pending(settled) => settled,
        };

        let Settlement { record, cancelled } =
            settled.await.map_err(|_| BridgeError::ChannelClosed)?;

        if cancelled {
            return Ok(BareOutcome::Response(None));
        }
        if !record.is_error {
            return Ok(BareOutcome::Response(record.response));
        }
        if BridgeOptions::flag(self.options().avoid_throw_on_non_tracked_error) {
            return Ok(BareOutcome::SuppressedError(
                record.error_message.map(|msg| msg.payload),
            ));
        }
        Err(BridgeError::Request(Box::new(record)))
    }

    pub(crate) async fn send_tracked(
        &self,
        request_message: Message,
        request_options: Arc<RequestOptions>,
    ) -> Result<RequestResponse> {
        // ---
        let settled = match self.dispatch(request_message, request_options).await? {
            Dispatch::Suppressed(record) => return Ok(record),
            Dispatch::Pending(settled) => settled,
        };

        let Settlement { record, .. } = settled.await.map_err(|_| BridgeError::ChannelClosed)?;

        if record.is_error && BridgeOptions::flag(self.options().throw_on_tracked_error) {
            return Err(BridgeError::Request(Box::new(record)));
        }
        Ok(record)
    }

    pub(crate) async fn send_event_message(
        &self,
        msg: Message,
        send_cancelled: Option<bool>,
    ) -> Result<()> {
        // ---
        let opts = self.options();
        let msg = match &opts.intercept_send_message {
            Some(intercept) => intercept(msg),
            None => msg,
        };

        if should_suppress_send(send_cancelled, &msg, &opts) {
            log_debug!("cancelled event {} not sent", msg.name);
            return Ok(());
        }
        self.internal_send(&opts, &msg).await
    }

    /// Register the request, send it and hand back the reply channel.
    async fn dispatch(
        &self,
        request_message: Message,
        request_options: Arc<RequestOptions>,
    ) -> Result<Dispatch> {
        // ---
        let opts = self.options();

        let mut msg = request_message;
        msg.direction = MessageDirection::ToServer;
        if let Some(intercept) = &opts.intercept_send_message {
            msg = intercept(msg);
        }

        if should_suppress_send(request_options.send_cancelled, &msg, &opts) {
            log_debug!("cancelled request {} ({}) not sent", msg.name, msg.track_id);
            return Ok(Dispatch::Suppressed(RequestResponse {
                request: msg.payload.clone(),
                response: None,
                request_message: msg,
                response_message: None,
                request_options,
                is_error: false,
                error: None,
                error_message: None,
                cancelled: true,
                timed_out: false,
            }));
        }

        let (reply, settled) = oneshot::channel();
        let track_id = msg.track_id.clone();

        // Reason formatters are user code; run them before taking the lock.
        let deadline = effective_timeout(request_options.timeout, &opts);

        // Register and arm the timer under one lock so the timer can never
        // observe a half-registered entry.
        let replaced = {
            let mut pending = lock_ignore_poison(&self.inner.pending);

            let timer = deadline.map(|(after, reason)| {
                let weak = Arc::downgrade(&self.inner);
                let track_id = track_id.clone();
                RequestTimer::arm(after, move || {
                    if let Some(inner) = weak.upgrade() {
                        MessageBridge { inner }.expire(&track_id, reason);
                    }
                })
            });

            pending.register(PendingEntry {
                request_message: msg.clone(),
                request_options,
                reply,
                timer,
            })
        };
        if replaced.is_some() {
            log_warn!("track id {track_id} reused while pending; previous request abandoned");
        }

        if let Err(err) = self.internal_send(&opts, &msg).await {
            log_error!("sending {} ({track_id}) failed: {err}", msg.name);
            let entry = lock_ignore_poison(&self.inner.pending).take(&track_id);
            if let Some(entry) = entry {
                self.settle_failure(&opts, entry, FailureCause::Transport(err.to_string()));
            }
        }

        Ok(Dispatch::Pending(settled))
    }

    /// History, logging, `on_send`, then the transport.
    async fn internal_send(&self, opts: &BridgeOptions, msg: &Message) -> Result<()> {
        // ---
        if BridgeOptions::flag(opts.keep_history_for_sending_messages) {
            lock_ignore_poison(&self.inner.history).push(msg.clone());
        }

        if BridgeOptions::flag(opts.log_sending_message)
            && passes(opts.log_sending_message_filter.as_ref(), msg)
        {
            let line = match &opts.log_sending_message_format {
                Some(format) => format(msg),
                None => format!("sending {msg:?}"),
            };
            emit_log(opts, &line);
        }

        if let Some(on_send) = &opts.on_send {
            on_send(msg);
        }

        self.inner.transport.send_network_message(msg).await
    }

    // --- receiving

    fn handle_transport_event(&self, event: TransportEvent) {
        // ---
        match event {
            TransportEvent::Frame(frame) => self.receive_frame(frame),
            TransportEvent::Error(reason) => {
                log_warn!("transport error: {reason}");
                self.report_error(&self.options(), ErrorEvent::Transport(reason));
            }
            TransportEvent::Closed(reason) => self.handle_closed(reason),
        }
    }

    /// Decode one inbound frame and route it.
    ///
    /// This is what the receive loop does for every frame; transports that
    /// push frames some other way can call it directly.
    pub fn receive_frame(&self, frame: Frame) {
        // ---
        let decoded = match frame {
            Frame::Text(text) => serde_json::from_str::<MessageDto>(&text).map_err(|e| (e, text)),
            Frame::Binary(bytes) => serde_json::from_slice::<MessageDto>(&bytes)
                .map_err(|e| (e, String::from_utf8_lossy(&bytes).into_owned())),
            Frame::Message(msg) => Ok(MessageDto::from(msg)),
        };

        let opts = self.options();
        let dto = match decoded {
            Ok(dto) => dto,
            Err((err, raw)) => {
                self.report_decode_failure(&opts, err.to_string(), raw);
                return;
            }
        };

        let mut msg = create_message_from_dto(dto, MessageDirection::ToClient);
        if let Some(intercept) = &opts.intercept_received_message {
            msg = intercept(msg);
        }
        self.route_incoming(&opts, msg);
    }

    /// Route one already decoded inbound message.
    ///
    /// The message is normalized and passed through
    /// `intercept_received_message` exactly like a decoded frame.
    pub fn handle_incoming_message(&self, msg: Message) {
        self.receive_frame(Frame::Message(msg));
    }

    fn route_incoming(&self, opts: &BridgeOptions, msg: Message) {
        // ---
        if BridgeOptions::flag(opts.keep_history_for_received_messages) {
            lock_ignore_poison(&self.inner.history).push(msg.clone());
        }

        if BridgeOptions::flag(opts.log_message_received)
            && passes(opts.log_message_received_filter.as_ref(), &msg)
        {
            let line = match &opts.log_message_received_format {
                Some(format) => format(&msg),
                None => format!("received {msg:?}"),
            };
            emit_log(opts, &line);
        }

        if let Some(on_message) = &opts.on_message {
            on_message(&msg);
        }

        if msg.message_type == MessageType::Event {
            if self.inner.events.dispatch(&msg) == 0 {
                log_debug!("event {} has no subscribers", msg.name);
            }
            return;
        }

        if msg.message_type.is_request() {
            log_debug!("ignoring inbound {:?} {} ({})", msg.message_type, msg.name, msg.track_id);
            return;
        }

        let is_error = msg.message_type == MessageType::Error;
        let entry = lock_ignore_poison(&self.inner.pending).take(&msg.track_id);
        match entry {
            Some(entry) if is_error => self.settle_failure(opts, entry, FailureCause::Remote(msg)),
            Some(entry) => self.settle_success(opts, entry, msg),
            None if is_error => self.report_error(opts, ErrorEvent::UntrackedError(msg)),
            None => log_debug!("no pending request for {} ({})", msg.name, msg.track_id),
        }
    }

    fn handle_closed(&self, reason: Option<String>) {
        // ---
        self.inner.connected.store(false, Ordering::SeqCst);
        log_info!("bridge closed");

        if let Some(reason) = &reason {
            lock_ignore_poison(&self.inner.bridge_errors).push(ErrorEvent::Closed(reason.clone()));
        }
        if let Some(on_close) = self.options().on_close {
            on_close(reason.as_deref());
        }
    }

    fn report_decode_failure(&self, opts: &BridgeOptions, error: String, raw: String) {
        // ---
        if BridgeOptions::flag(opts.log_parse_incoming_message_error) {
            let line = match &opts.log_parse_incoming_message_error_format {
                Some(format) => format(&error, &raw),
                None => format!("undecodable frame: {error}"),
            };
            match &opts.logger {
                Some(logger) => logger(&line),
                None => log_warn!("{line}"),
            }
        }
        self.report_error(opts, ErrorEvent::Decode { error, raw });
    }

    fn report_error(&self, opts: &BridgeOptions, event: ErrorEvent) {
        // ---
        log_debug!("bridge error: {event}");
        lock_ignore_poison(&self.inner.bridge_errors).push(event.clone());
        if let Some(on_error) = &opts.on_error {
            on_error(&event);
        }
    }

    // --- settlement

    fn settle_success(&self, opts: &BridgeOptions, entry: PendingEntry, response: Message) {
        // ---
        let PendingEntry {
            request_message,
            request_options,
            reply,
            timer,
        } = entry;
        drop(timer);

        let policy = CancellationPolicy::new(&request_options, opts);
        let cancelled = policy.is_effectively_cancelled(&request_message, Some(&response));

        let record = RequestResponse {
            request: request_message.payload.clone(),
            response: policy.resolve_response_value(cancelled, response.payload.clone()),
            cancelled: request_message.cancelled || response.cancelled,
            timed_out: request_message.timed_out || response.timed_out,
            request_message,
            response_message: Some(response),
            request_options: request_options.clone(),
            is_error: false,
            error: None,
            error_message: None,
        };

        if policy.should_call_on_success(cancelled) {
            if let Some(on_success) = &opts.on_success {
                on_success(&record);
            }
            if let Some(on_success) = &request_options.on_success {
                on_success(&record);
            }
        }

        deliver(reply, Settlement { record, cancelled });
    }

    fn settle_failure(&self, opts: &BridgeOptions, entry: PendingEntry, cause: FailureCause) {
        // ---
        let PendingEntry {
            mut request_message,
            request_options,
            reply,
            timer,
        } = entry;
        drop(timer);

        let (error_message, local_reason) = match cause {
            FailureCause::Remote(msg) => (Some(msg), None),
            FailureCause::Timeout(reason) => {
                request_message.mark_timed_out();
                (None, Some(reason))
            }
            FailureCause::Transport(reason) => (None, Some(reason)),
        };

        let policy = CancellationPolicy::new(&request_options, opts);
        let cancelled = policy.is_effectively_cancelled(&request_message, error_message.as_ref());

        let error = match (local_reason, &error_message) {
            (Some(reason), _) => Some(ErrorReason::Local(reason)),
            (None, Some(msg)) => policy
                .resolve_response_value(cancelled, msg.payload.clone())
                .map(ErrorReason::Remote),
            (None, None) => None,
        };

        let record = RequestResponse {
            request: request_message.payload.clone(),
            response: None,
            cancelled: request_message.cancelled
                || error_message.as_ref().is_some_and(|m| m.cancelled),
            timed_out: request_message.timed_out
                || error_message.as_ref().is_some_and(|m| m.timed_out),
            request_message,
            response_message: None,
            request_options: request_options.clone(),
            is_error: true,
            error,
            error_message,
        };

        if policy.should_call_on_error(cancelled) {
            self.report_error(opts, ErrorEvent::Request(Box::new(record.clone())));
            if let Some(on_error) = &request_options.on_error {
                on_error(&record);
            }
        }

        deliver(reply, Settlement { record, cancelled });
    }

    /// Timer callback: settle the request as timed out if it is still pending.
    fn expire(&self, track_id: &TrackId, reason: String) {
        // ---
        let entry = lock_ignore_poison(&self.inner.pending).take(track_id);
        if let Some(entry) = entry {
            log_debug!("request {} ({track_id}) timed out", entry.request_message.name);
            self.settle_failure(&self.options(), entry, FailureCause::Timeout(reason));
        }
    }

    // --- events

    /// Subscribe to one or more event names.
    ///
    /// The payload is decoded into `T` for each delivery; a payload that does
    /// not decode is logged and skipped for this subscriber.
    pub fn subscribe_event<T, F>(&self, names: impl Into<EventNames>, on_event: F) -> EventSubscription
    where
        T: DeserializeOwned,
        F: Fn(T, &Message) + Send + Sync + 'static,
    {
        // ---
        let callback: EventCallback = Arc::new(move |msg: &Message| {
            match serde_json::from_value::<T>(msg.payload.clone()) {
                Ok(payload) => on_event(payload, msg),
                Err(_err) => log_warn!("event {} payload did not decode: {_err}", msg.name),
            }
        });
        self.inner.events.subscribe(names.into(), callback)
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner.events.subscriber_count(name)
    }

    // --- introspection

    /// Request message of a pending request, as currently tracked.
    pub fn get_tracked_request_message(&self, track_id: &TrackId) -> Option<Message> {
        // ---
        lock_ignore_poison(&self.inner.pending)
            .request_message(track_id)
            .cloned()
    }

    /// Mark a pending request cancelled. Returns `false` if it is not pending.
    pub fn cancel_request(&self, track_id: &TrackId) -> bool {
        lock_ignore_poison(&self.inner.pending).cancel(track_id)
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock_ignore_poison(&self.inner.pending).len()
    }

    /// Messages recorded while history keeping is enabled, oldest first.
    pub fn history(&self) -> Vec<Message> {
        lock_ignore_poison(&self.inner.history).clone()
    }

    pub fn clear_history(&self) {
        lock_ignore_poison(&self.inner.history).clear();
    }

    /// Every error reported on this channel, oldest first.
    pub fn bridge_errors(&self) -> Vec<ErrorEvent> {
        lock_ignore_poison(&self.inner.bridge_errors).clone()
    }
}

fn passes(filter: Option<&MessageFilter>, msg: &Message) -> bool {
    filter.map_or(true, |f| f.matches(&msg.name))
}

fn emit_log(opts: &BridgeOptions, line: &str) {
    // ---
    match &opts.logger {
        Some(logger) => logger(line),
        None => log_info!("{line}"),
    }
}

fn deliver(reply: oneshot::Sender<Settlement>, settlement: Settlement) {
    // ---
    if reply.send(settlement).is_err() {
        log_debug!("request settled after its caller went away");
    }
}
