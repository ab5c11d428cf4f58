//! # Caller-facing errors
//!
//! What a call on a stub or session can fail with: a wire-carried fault
//! (raised locally or by the peer), a transport failure, or a local
//! dispatch miss against the mirrored class table.

use std::fmt;

use telewire::Fault;

use crate::transport;
use crate::transport::CallError;

#[derive(Debug, Clone)]
pub enum Error {
    /// A fault raised while marshalling or by the peer; the kind
    /// distinguishes the cases of the taxonomy.
    Fault(Fault),
    /// The channel failed before a reply arrived.
    Transport(transport::Error),
    /// The mirrored class does not declare the member.
    NoSuchMember { class: String, member: String },
    /// The mirrored getter has no companion setter.
    NoSetter { class: String, property: String },
    /// The mirrored class carries no iterator tag.
    NotIterable { class: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "{}", fault),
            Self::Transport(e) => write!(f, "transport failure: {}", e),
            Self::NoSuchMember { class, member } => {
                write!(f, "class '{}' has no member '{}'", class, member)
            }
            Self::NoSetter { class, property } => {
                write!(f, "getter '{}' on class '{}' has no setter", property, class)
            }
            Self::NotIterable { class } => write!(f, "class '{}' is not iterable", class),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<CallError> for Error {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Remote(fault) => Self::Fault(fault),
            CallError::Transport(e) => Self::Transport(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
