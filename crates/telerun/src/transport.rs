//! # Message-channel contract consumed by the runtime
//!
//! The core depends on exactly two transport primitives: issue an
//! outbound verb and await its reply, and install a handler for an
//! inbound verb. Envelope framing, correlation IDs, error-envelope
//! encoding, and connection lifecycle are all the channel's concern.
//!
//! ## Invariants
//!
//! - Calls issued in program order are delivered to the peer's handler
//!   in program order.
//! - A handler fault is returned to the caller in the channel's error
//!   envelope, never dropped.
//! - A closed channel rejects every outstanding and subsequent call.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value as Json;

use telewire::Fault;
use telewire::FaultKind;

/// Errors that occur at the channel layer itself.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The channel was closed before the call was issued.
    Closed,
    /// Generic I/O error or internal channel failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Closed => write!(f, "channel closed"),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single remote call.
#[derive(Debug, Clone)]
pub enum CallError {
    /// The peer replied with an error envelope.
    Remote(Fault),
    /// The channel failed before a reply arrived.
    Transport(Error),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(fault) => write!(f, "remote fault: {}", fault),
            Self::Transport(e) => write!(f, "transport failure: {}", e),
        }
    }
}

impl std::error::Error for CallError {}

impl From<Error> for CallError {
    fn from(e: Error) -> Self {
        Self::Transport(e)
    }
}

impl From<Fault> for CallError {
    fn from(fault: Fault) -> Self {
        Self::Remote(fault)
    }
}

impl From<CallError> for Fault {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Remote(fault) => fault,
            CallError::Transport(e) => Fault::new(FaultKind::ConnectionLost, e.to_string()),
        }
    }
}

/// Handler for one inbound verb. A returned fault becomes the caller's
/// error envelope.
pub type Handler = Arc<dyn Fn(Json) -> BoxFuture<'static, std::result::Result<Json, Fault>> + Send + Sync>;

/// A reliable bidirectional message channel between exactly two peers.
///
/// This trait is designed to be object-safe (`Arc<dyn Channel>`). The
/// runtime never sees correlation IDs or framing; it only issues verbs
/// and installs verb handlers.
#[async_trait::async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Send an outbound verb and await its reply. Resolves with the reply
    /// payload, or rejects with the peer's fault or a transport failure.
    async fn call_remote(&self, method: &str, payload: Json) -> std::result::Result<Json, CallError>;

    /// Install the handler for an inbound verb, replacing any previous
    /// handler for the same name.
    fn register_incoming_call(&self, method: &str, handler: Handler);
}
