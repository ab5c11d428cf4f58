// crates/telerun/src/lib.rs
//! Transparent object-graph RPC runtime.
//!
//! Two peers connected by a reliable bidirectional message channel
//! expose ordinary in-process objects to each other: classed objects,
//! functions, getters and setters, and async iterators, all behind one
//! uniform asynchronous call discipline. Classes are mirrored on first
//! use, identity is preserved both ways by an ID registry, and dropping
//! a proxy releases the peer's object.
//!
//! The channel contract is two primitives (`call_remote` +
//! `register_incoming_call`); everything beneath — framing, correlation,
//! error envelopes — belongs to the channel binding. An in-process
//! duplex binding ships in [`channel`].

pub mod channel;
pub mod error;
pub mod object;
pub mod session;
pub mod stub;
pub mod transport;

mod marshal;
mod mirror;
mod registry;

pub use crate::channel::LocalChannel;
pub use crate::error::Error;
pub use crate::object::Callable;
pub use crate::object::ClassShape;
pub use crate::object::HostObject;
pub use crate::object::NativeFn;
pub use crate::object::SequenceIterator;
pub use crate::object::Value;
pub use crate::session::Constructor;
pub use crate::session::Session;
pub use crate::stub::RemoteIterator;
pub use crate::stub::Stub;
pub use crate::transport::Channel;

pub use telewire::ClassDesc;
pub use telewire::Fault;
pub use telewire::FaultKind;
pub use telewire::GetterDesc;
pub use telewire::IteratorKind;
pub use telewire::ObjectId;
