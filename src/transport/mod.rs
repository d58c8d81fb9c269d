//! Transport implementations.
//!
//! Concrete implementations of the domain-level [`Transport`](crate::Transport)
//! trait. Socket and hub bindings live outside this crate; the in-memory
//! loopback is always available and is the reference implementation.

mod memory;

pub use memory::{create_transport as create_memory_transport, MemoryPeer, MemoryPeerSender};
