// src/macros.rs

//
// Logging macros
//
// `logging` feature on  → tracing events under the `message_bridge` target
// `logging` feature off → errors go to stderr, everything else is type-checked
//                         and discarded so call sites never trip unused warnings
//

#![allow(unused_macros)]

#[cfg(feature = "logging")]
macro_rules! bridge_event {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "message_bridge", $($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! bridge_event {
    (error, $($arg:tt)*) => {
        eprintln!("[message_bridge] {}", format_args!($($arg)*))
    };
    ($level:ident, $($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! log_error {
    ($($arg:tt)*) => { $crate::macros::bridge_event!(error, $($arg)*) };
}

macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::macros::bridge_event!(warn, $($arg)*) };
}

macro_rules! log_info {
    ($($arg:tt)*) => { $crate::macros::bridge_event!(info, $($arg)*) };
}

macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::macros::bridge_event!(debug, $($arg)*) };
}

pub(crate) use bridge_event;
pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
