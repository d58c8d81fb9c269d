// src/transport/memory/transport.rs

//! In-memory loopback transport implementation.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::{
    // ---
    lock_ignore_poison,
    macros::log_debug,
    BridgeError,
    ConnectionHandle,
    Frame,
    Message,
    Result,
    Transport,
    TransportBase,
    TransportEvent,
    TransportPtr,
};

const CHANNEL_CAPACITY: usize = 64;

/// Sender towards the currently connected bridge, if any.
type ClientSlot = Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>;

/// Bridge-side half of the loopback.
struct MemoryTransport {
    // ---
    base: TransportBase,
    to_peer: mpsc::Sender<Message>,
    client: ClientSlot,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    /// Open a fresh inbox for the bridge.
    ///
    /// Connecting again replaces the previous inbox; the old one ends.
    async fn connect(&self) -> Result<ConnectionHandle> {
        // ---
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        *lock_ignore_poison(&self.client) = Some(tx);
        log_debug!("memory transport {} connected", self.base.transport_id);
        Ok(ConnectionHandle { inbox: rx })
    }

    /// Hand the envelope to the peer.
    ///
    /// The peer receives its own copy; later mutation on the bridge side is
    /// not visible to it, just as with a real wire.
    async fn send_network_message(&self, msg: &Message) -> Result<()> {
        // ---
        self.to_peer
            .send(msg.clone())
            .await
            .map_err(|_| BridgeError::Transport("memory peer dropped".into()))
    }

    /// Drop the bridge inbox so its receive loop ends.
    async fn close(&self) -> Result<()> {
        // ---
        lock_ignore_poison(&self.client).take();
        log_debug!("memory transport {} closed", self.base.transport_id);
        Ok(())
    }
}

/// Peer (server-side) half of the loopback.
///
/// `recv()` yields every envelope the bridge sent, in order. Replies and
/// pushed events go back through [`MemoryPeer::sender`].
pub struct MemoryPeer {
    // ---
    inbox: mpsc::Receiver<Message>,
    sender: MemoryPeerSender,
}

impl MemoryPeer {
    // ---

    /// Wait for the next envelope sent by the bridge.
    ///
    /// Returns `None` once the bridge-side transport has been dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }

    /// Take the next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbox.try_recv().ok()
    }

    /// A cloneable handle for replying to the bridge.
    pub fn sender(&self) -> MemoryPeerSender {
        self.sender.clone()
    }
}

/// Cloneable handle that delivers frames to the connected bridge.
#[derive(Clone)]
pub struct MemoryPeerSender {
    client: ClientSlot,
}

impl MemoryPeerSender {
    // ---

    fn current(&self) -> Result<mpsc::Sender<TransportEvent>> {
        // ---
        lock_ignore_poison(&self.client)
            .clone()
            .ok_or(BridgeError::NotConnected)
    }

    async fn deliver(&self, event: TransportEvent) -> Result<()> {
        // ---
        self.current()?
            .send(event)
            .await
            .map_err(|_| BridgeError::Transport("bridge inbox closed".into()))
    }

    /// Send an envelope to the bridge as JSON text.
    pub async fn send(&self, msg: &Message) -> Result<()> {
        // ---
        let text = msg.to_json()?;
        self.deliver(TransportEvent::Frame(Frame::Text(text))).await
    }

    /// Send raw text, bypassing encoding (useful for malformed input).
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.deliver(TransportEvent::Frame(Frame::Text(text.into())))
            .await
    }

    /// Report a channel error to the bridge.
    pub async fn report_error(&self, reason: impl Into<String>) -> Result<()> {
        self.deliver(TransportEvent::Error(reason.into())).await
    }

    /// Close the channel from the peer side.
    ///
    /// The bridge sees a `Closed` event and its inbox ends afterwards.
    pub async fn close(&self, reason: Option<String>) -> Result<()> {
        // ---
        let client = lock_ignore_poison(&self.client)
            .take()
            .ok_or(BridgeError::NotConnected)?;

        client
            .send(TransportEvent::Closed(reason))
            .await
            .map_err(|_| BridgeError::Transport("bridge inbox closed".into()))
    }

    /// `true` while a bridge is connected.
    pub fn is_connected(&self) -> bool {
        lock_ignore_poison(&self.client).is_some()
    }
}

/// Create a connected pair: the bridge-side transport and its peer.
pub fn create_transport(transport_id: impl Into<String>) -> (TransportPtr, MemoryPeer) {
    // ---
    let (to_peer, peer_inbox) = mpsc::channel(CHANNEL_CAPACITY);
    let client: ClientSlot = Arc::new(Mutex::new(None));

    let transport = MemoryTransport {
        base: TransportBase::new(transport_id, Some("memory://".to_string())),
        to_peer,
        client: client.clone(),
    };

    let peer = MemoryPeer {
        inbox: peer_inbox,
        sender: MemoryPeerSender { client },
    };

    (Arc::new(transport), peer)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::create_query_message;
    use serde_json::json;

    #[tokio::test]
    async fn bridge_to_peer_delivers_in_order() {
        // ---
        let (transport, mut peer) = create_transport("t");

        let first = create_query_message("A", json!(1));
        let second = create_query_message("B", json!(2));
        transport.send_network_message(&first).await.unwrap();
        transport.send_network_message(&second).await.unwrap();

        assert_eq!(peer.recv().await.unwrap().name, "A");
        assert_eq!(peer.recv().await.unwrap().name, "B");
        assert!(peer.try_recv().is_none());
    }

    #[tokio::test]
    async fn peer_to_bridge_requires_connect() {
        // ---
        let (transport, peer) = create_transport("t");
        let sender = peer.sender();
        let msg = create_query_message("A", json!(1));

        assert!(matches!(sender.send(&msg).await, Err(BridgeError::NotConnected)));

        let mut handle = transport.connect().await.unwrap();
        sender.send(&msg).await.unwrap();

        match handle.inbox.recv().await {
            Some(TransportEvent::Frame(Frame::Text(text))) => assert!(text.contains("\"A\"")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_ends_the_inbox() {
        // ---
        let (transport, peer) = create_transport("t");
        let mut handle = transport.connect().await.unwrap();
        assert!(peer.sender().is_connected());

        transport.close().await.unwrap();

        assert!(handle.inbox.recv().await.is_none());
        assert!(!peer.sender().is_connected());
    }
}
