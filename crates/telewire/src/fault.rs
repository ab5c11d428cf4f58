//! # Fault Taxonomy
//!
//! The error kinds a peer can surface through the transport's error
//! envelope. A `Fault` describes the *remote* operation failing; errors
//! of the transport itself live in `telerun`.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The abstract kind of a wire-carried failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultKind {
    /// An incoming reference named an ID with no live stub and no
    /// accompanying description.
    UnknownRemote,
    /// An incoming `idRemote` named an ID not registered locally.
    UnknownLocal,
    /// A class description named a parent not yet received.
    UnknownParentClass,
    /// The peer re-introduced an ID that is already live.
    DuplicateRemote,
    /// A local method invocation threw; message carries the user error.
    UserException,
    /// The transport closed with calls outstanding.
    ConnectionLost,
    /// The host cannot honor the operation; the runtime degrades.
    Unsupported,
    /// The payload or frame was malformed.
    Protocol,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::UnknownRemote => "unknown remote object",
            FaultKind::UnknownLocal => "unknown local object",
            FaultKind::UnknownParentClass => "unknown parent class",
            FaultKind::DuplicateRemote => "duplicate remote object",
            FaultKind::UserException => "user exception",
            FaultKind::ConnectionLost => "connection lost",
            FaultKind::Unsupported => "unsupported",
            FaultKind::Protocol => "protocol violation",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wire-carried failure: kind plus human-readable message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A user-level exception thrown by a local operation. The runtime
    /// never swallows these; the envelope carries them to the caller.
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(FaultKind::UserException, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Protocol, message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}
