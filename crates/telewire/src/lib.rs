// crates/telewire/src/lib.rs
//! Wire grammar for the telerun object-graph RPC protocol.
//!
//! Everything two peers exchange is defined here: the JSON value grammar,
//! class descriptions, the nine verb payloads, and the fault taxonomy.
//! This crate is pure data; the runtime lives in `telerun`.

mod class;
mod fault;
mod value;
mod verb;


pub use crate::value::ObjectId;
pub use crate::value::WireValue;
pub use crate::value::FUNCTION_CLASS;

pub use crate::class::ClassDesc;
pub use crate::class::GetterDesc;
pub use crate::class::IteratorKind;

pub use crate::verb::Verb;
pub use crate::verb::NewPayload;
pub use crate::verb::CallPayload;
pub use crate::verb::FuncPayload;
pub use crate::verb::GetPayload;
pub use crate::verb::SetPayload;
pub use crate::verb::IterPayload;
pub use crate::verb::DelPayload;

pub use crate::fault::Fault;
pub use crate::fault::FaultKind;
