//! Todo client and server in one process, connected by the memory transport.
//!
//! ```text
//! RUST_LOG=message_bridge=debug cargo run --example todo_memory
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

use message_bridge::{
    // ---
    create_memory_transport,
    create_message,
    BridgeOptions,
    MemoryPeer,
    MessageBridge,
    MessageDirection,
    MessageType,
    NewMessage,
    RequestOptions,
    Result,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TodoItem {
    id: u32,
    title: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TodoItems {
    items: Vec<TodoItem>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let (transport, peer) = create_memory_transport("todo");
    tokio::spawn(serve(peer));

    let options = BridgeOptions::default()
        .with_timeout(Duration::from_secs(2))
        .with_log_sending_message(true)
        .with_logger(|line| println!("{line}"));
    let bridge = MessageBridge::with_options(transport, options);
    bridge.connect().await?;

    let updates = bridge.subscribe_event("TodoItemUpdated", |item: TodoItem, _msg| {
        println!("event: item {} is now {:?}", item.id, item.title);
    });

    let items: Option<TodoItems> = bridge
        .send_query(RequestOptions::new("GetTodoItemQuery", json!({ "search": "todo" })))
        .await?;
    println!("query: {items:?}");

    let _: Option<serde_json::Value> = bridge
        .send_command(RequestOptions::new(
            "UpdateTodoItemCommand",
            TodoItem {
                id: 2,
                title: "buy milk".into(),
            },
        ))
        .await?;

    let missing = bridge
        .send_query_tracked::<_, TodoItems, serde_json::Value>(RequestOptions::new(
            "NoSuchQuery",
            json!({}),
        ))
        .await?;
    println!("missing query failed: {:?}", missing.error);

    // Give the event a moment to arrive before tearing down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    updates.unsubscribe();
    bridge.close().await
}

async fn serve(mut peer: MemoryPeer) {
    // ---
    let sender = peer.sender();
    let mut items: Vec<TodoItem> = (1..=3)
        .map(|id| TodoItem {
            id,
            title: format!("todo{id}"),
        })
        .collect();

    while let Some(msg) = peer.recv().await {
        // ---
        let respond = |payload| {
            create_message(
                NewMessage::new(msg.name.clone(), msg.message_type.response_type(), payload)
                    .track_id(msg.track_id.clone())
                    .direction(MessageDirection::ToClient),
            )
        };

        let mut outgoing = Vec::new();
        match msg.name.as_str() {
            "GetTodoItemQuery" => outgoing.push(respond(json!({ "items": items }))),
            "UpdateTodoItemCommand" => {
                if let Ok(update) = serde_json::from_value::<TodoItem>(msg.payload.clone()) {
                    if let Some(item) = items.iter_mut().find(|i| i.id == update.id) {
                        *item = update.clone();
                    }
                    outgoing.push(respond(json!({ "success": true })));
                    outgoing.push(create_message(
                        NewMessage::new("TodoItemUpdated", MessageType::Event, json!(update))
                            .direction(MessageDirection::ToClient),
                    ));
                }
            }
            name => outgoing.push(create_message(
                NewMessage::new(
                    "Error",
                    MessageType::Error,
                    json!({ "message": format!("{name} not found") }),
                )
                .track_id(msg.track_id.clone())
                .direction(MessageDirection::ToClient),
            )),
        }

        for out in &outgoing {
            if sender.send(out).await.is_err() {
                return;
            }
        }
    }
}
