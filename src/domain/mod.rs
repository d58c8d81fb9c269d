//! Domain layer public interface.
//!
//! Abstractions here are independent of any concrete channel technology.
//! Consumers import through this module, not from individual files.

mod transport;

pub use transport::{
    //
    ConnectionHandle,
    Frame,
    Transport,
    TransportBase,
    TransportEvent,
    TransportPtr,
};
