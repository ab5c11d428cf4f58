//! # Wire Values
//!
//! The JSON grammar for values crossing the peer boundary. Plain data
//! travels by value; objects travel as ID references whose owner is
//! marked by the key (`idLocal` = sender-owned, `idRemote` =
//! receiver-owned).

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// An opaque printable token naming an object across the wire.
///
/// The peer that first exposed the object owns the ID. IDs are never
/// reused within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// The class name that marks a local reference as a callable value.
pub const FUNCTION_CLASS: &str = "Function";

/// A value in its wire form.
///
/// Variant order is load-bearing for deserialization: untagged matching
/// tries variants top to bottom, so `Described` must precede `LocalRef`
/// for a payload carrying both `idLocal` and `properties` to always read
/// as a full object introduction, and `LocalRef` must precede `RemoteRef`
/// so the discriminating key is the one that is present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<WireValue>),
    /// A by-value field bag. The receiver materializes a fresh copy.
    Plain {
        #[serde(rename = "plainObject")]
        plain_object: BTreeMap<String, WireValue>,
    },
    /// A full object description: the first time the sender exposes this
    /// instance. The named class must already have been described.
    Described {
        #[serde(rename = "idLocal")]
        id_local: ObjectId,
        #[serde(rename = "className")]
        class_name: String,
        properties: BTreeMap<String, WireValue>,
    },
    /// A reference to an object owned by the sender. `className` is only
    /// carried for callables ([`FUNCTION_CLASS`]).
    LocalRef {
        #[serde(rename = "idLocal")]
        id_local: ObjectId,
        #[serde(rename = "className", skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
    },
    /// A reference to an object owned by the receiver, returning home.
    RemoteRef {
        #[serde(rename = "idRemote")]
        id_remote: ObjectId,
    },
}

impl WireValue {
    /// A local reference carrying the callable marker.
    pub fn function_ref(id: ObjectId) -> Self {
        WireValue::LocalRef {
            id_local: id,
            class_name: Some(FUNCTION_CLASS.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        WireValue::Bool(b)
    }
}

impl From<i64> for WireValue {
    fn from(n: i64) -> Self {
        WireValue::Number(n.into())
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::Text(s.to_string())
    }
}
