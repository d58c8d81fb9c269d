// src/transport/memory/mod.rs

//! In-memory loopback transport.
//!
//! Connects a bridge to an in-process peer that plays the server role. It is
//! intended for tests, demos and as the reference for transport semantics:
//!
//! - frames sent by the peer reach the bridge in the order they were sent,
//! - nothing is dropped because of timing or scheduling,
//! - frames towards the bridge are JSON text, so the bridge's decode path
//!   runs exactly as it would behind a socket.
//!
//! ## Non-Goals
//!
//! No emulation of socket failure modes, reconnect policies or latency.

mod transport;

pub use transport::{create_transport, MemoryPeer, MemoryPeerSender};
