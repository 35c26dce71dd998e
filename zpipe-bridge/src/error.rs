//! Error taxonomy: recoverable command malformations versus fatal bridge
//! failures.

use crate::transport::ZephyrError;
use thiserror::Error;

/// Malformation of a single command.
///
/// Reported as an error record on the output channel; the current command is
/// abandoned and the loop continues to the next block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("duplicate key {0:?} in argument block")]
    DuplicateKey(String),
    #[error("argument block cut off by end of stream")]
    TruncatedArgument,
    #[error("payload ended after {read} of {expected} bytes")]
    TruncatedPayload { expected: usize, read: usize },
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("key {key:?} is not recognized for command {command:?}")]
    UnknownKey { command: String, key: String },
    #[error("command {command:?} requires a {field:?} field")]
    MissingField {
        command: String,
        field: &'static str,
    },
    #[error("field {field:?} has invalid value {value:?}")]
    InvalidField {
        field: &'static str,
        value: String,
    },
    #[error("argument bytes are not valid UTF-8")]
    MalformedUtf8,
}

/// Infrastructure failure in the bridge's own plumbing.
///
/// Unlike [`ProtocolError`], these terminate the process with a non-zero
/// status.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("zephyr initialization failed: {0}")]
    Initialize(#[source] ZephyrError),
    #[error("initial wildcard subscription failed: {0}")]
    InitialSubscription(#[source] ZephyrError),
    #[error("command channel read failed: {0}")]
    CommandIo(#[source] std::io::Error),
    #[error("output channel write failed: {0}")]
    OutputIo(#[source] std::io::Error),
    #[error("zephyr receive failed: {0}")]
    Receive(#[source] ZephyrError),
}
