//! # Wire Verbs
//!
//! The nine fixed method names exchanged over the transport, and the
//! payload schema of each. Envelope framing and correlation are the
//! transport's concern; these are only the method names and bodies.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::class::IteratorKind;
use crate::value::ObjectId;
use crate::value::WireValue;

/// One of the fixed wire verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Handshake: reply is the marshalled seed object.
    Start,
    /// An array of class descriptions. Ack-only reply.
    Class,
    /// Construct an instance of a named class.
    New,
    /// Invoke a callable value.
    Call,
    /// Invoke a named method on an object.
    Func,
    /// Read a mirrored getter.
    Get,
    /// Write through a mirrored setter. Ack-only reply.
    Set,
    /// Open the iteration protocol; reply is an iterator stub.
    Iter,
    /// Release a remote object. No reply expected.
    Del,
}

impl Verb {
    pub const ALL: [Verb; 9] = [
        Verb::Start,
        Verb::Class,
        Verb::New,
        Verb::Call,
        Verb::Func,
        Verb::Get,
        Verb::Set,
        Verb::Iter,
        Verb::Del,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Class => "class",
            Verb::New => "new",
            Verb::Call => "call",
            Verb::Func => "func",
            Verb::Get => "get",
            Verb::Set => "set",
            Verb::Iter => "iter",
            Verb::Del => "del",
        }
    }

    pub fn from_name(name: &str) -> Option<Verb> {
        Verb::ALL.iter().copied().find(|v| v.as_str() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `new {className, args}` — reply is the new object's wire form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayload {
    pub class_name: String,
    pub args: Vec<WireValue>,
}

/// `call {obj, args}` — invoke a callable value by ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallPayload {
    pub obj: ObjectId,
    pub args: Vec<WireValue>,
}

/// `func {obj, name, args}` — invoke a method on an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuncPayload {
    pub obj: ObjectId,
    pub name: String,
    pub args: Vec<WireValue>,
}

/// `get {obj, name}` — read a getter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetPayload {
    pub obj: ObjectId,
    pub name: String,
}

/// `set {obj, name, value}` — write through a setter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetPayload {
    pub obj: ObjectId,
    pub name: String,
    pub value: WireValue,
}

/// `iter {obj, symbol}` — open iteration; the symbol names the protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterPayload {
    pub obj: ObjectId,
    pub symbol: IteratorKind,
}

/// `del {idRemote}` — the sender dropped its stub for this ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelPayload {
    pub id_remote: ObjectId,
}
