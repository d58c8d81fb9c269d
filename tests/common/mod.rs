// tests/common/mod.rs

//! In-process todo server used by the integration tests.
//!
//! The server reads every envelope the bridge sends through a [`MemoryPeer`]
//! and answers the way a real backend would: one task per request, so slow
//! handlers do not hold up fast ones.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use message_bridge::{
    // ---
    create_memory_transport,
    create_message,
    BridgeOptions,
    MemoryPeer,
    MemoryPeerSender,
    Message,
    MessageBridge,
    MessageDirection,
    MessageType,
    NewMessage,
    Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTodoItemQuery {
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItems {
    pub items: Vec<TodoItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

type Store = Arc<Mutex<Vec<TodoItem>>>;

pub struct TodoServer {
    // ---
    pub bridge: MessageBridge,
    sender: MemoryPeerSender,
    received: Arc<Mutex<Vec<Message>>>,
    handle: JoinHandle<()>,
}

impl TodoServer {
    // ---
    pub async fn start(id: &str) -> Result<Self> {
        Self::start_with(id, BridgeOptions::default()).await
    }

    pub async fn start_with(id: &str, options: BridgeOptions) -> Result<Self> {
        // ---
        let (transport, peer) = create_memory_transport(id);
        let bridge = MessageBridge::with_options(transport, options);
        bridge.connect().await?;

        let sender = peer.sender();
        let received = Arc::new(Mutex::new(Vec::new()));
        let store: Store = Arc::new(Mutex::new(
            (1..=3)
                .map(|id| TodoItem {
                    id,
                    title: format!("todo{id}"),
                })
                .collect(),
        ));

        let handle = tokio::spawn(serve(peer, store, received.clone()));

        Ok(Self {
            bridge,
            sender,
            received,
            handle,
        })
    }

    /// Every envelope the server has read so far.
    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    /// Raw access to the server-to-bridge direction.
    pub fn sender(&self) -> MemoryPeerSender {
        self.sender.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        // ---
        self.bridge.close().await?;
        self.handle.abort();
        Ok(())
    }
}

async fn serve(mut peer: MemoryPeer, store: Store, received: Arc<Mutex<Vec<Message>>>) {
    // ---
    let sender = peer.sender();
    while let Some(msg) = peer.recv().await {
        received.lock().unwrap().push(msg.clone());

        let sender = sender.clone();
        let store = store.clone();
        tokio::spawn(async move {
            handle(msg, &sender, &store).await;
        });
    }
}

fn reply(request: &Message, payload: Value) -> Message {
    // ---
    let mut msg = create_message(
        NewMessage::new(request.name.clone(), request.message_type.response_type(), payload)
            .track_id(request.track_id.clone())
            .direction(MessageDirection::ToClient),
    );
    // Echo cancellation so the client-side flags can be observed end to end.
    msg.cancelled = request.cancelled;
    msg
}

pub fn error_message(request: &Message, message: String) -> Message {
    // ---
    create_message(
        NewMessage::new("Error", MessageType::Error, json!({ "message": message }))
            .track_id(request.track_id.clone())
            .direction(MessageDirection::ToClient),
    )
}

pub fn event_message(name: &str, payload: Value) -> Message {
    // ---
    create_message(
        NewMessage::new(name, MessageType::Event, payload).direction(MessageDirection::ToClient),
    )
}

async fn handle(msg: Message, sender: &MemoryPeerSender, store: &Store) {
    // ---
    let outgoing: Vec<Message> = match (msg.message_type, msg.name.as_str()) {
        (MessageType::Query, "GetTodoItemQuery") => {
            let search = msg.payload["search"].as_str().unwrap_or_default().to_string();
            let items: Vec<TodoItem> = store
                .lock()
                .unwrap()
                .iter()
                .filter(|item| item.title.contains(&search))
                .cloned()
                .collect();
            vec![reply(&msg, json!({ "items": items }))]
        }
        (MessageType::Query, "SlowQuery") => {
            let delay = msg.payload["delayMs"].as_u64().unwrap_or(5000);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            vec![reply(&msg, json!({ "done": true, "delayMs": delay }))]
        }
        (MessageType::Query, "EchoQuery") => vec![reply(&msg, msg.payload.clone())],
        (MessageType::Command, "UpdateTodoItemCommand") => {
            let item: TodoItem = match serde_json::from_value(msg.payload.clone()) {
                Ok(item) => item,
                Err(err) => {
                    let _ = sender.send(&error_message(&msg, err.to_string())).await;
                    return;
                }
            };
            {
                let mut store = store.lock().unwrap();
                if let Some(existing) = store.iter_mut().find(|i| i.id == item.id) {
                    *existing = item.clone();
                }
            }
            vec![
                reply(&msg, json!({ "success": true })),
                event_message("TodoItemUpdated", json!(item)),
            ]
        }
        (MessageType::Command, "FailingCommand") => {
            vec![error_message(&msg, "Error in command handler for 'FailingCommand'".into())]
        }
        (MessageType::Event, "Ping") => vec![event_message("Pong", msg.payload.clone())],
        (MessageType::Command, name) => vec![error_message(
            &msg,
            format!("Command {name} not found (Register it with addCommand)"),
        )],
        (MessageType::Query, name) => vec![error_message(
            &msg,
            format!("Query {name} not found (Register it with addQuery)"),
        )],
        (MessageType::Event, name) => vec![error_message(
            &msg,
            format!("Event {name} not found (Register it with addEvent)"),
        )],
        _ => Vec::new(),
    };

    for out in &outgoing {
        if sender.send(out).await.is_err() {
            break;
        }
    }
}

/// Route bridge logging to the test writer.
pub fn init_logging() {
    // ---
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
