//! # In-memory values and the host object model
//!
//! [`Value`] is what flows through the runtime. Plain records are owned
//! trees and marshal by value; classed objects, callables, and stubs
//! carry identity and marshal by reference. The split is type-level, so
//! there is never a question of what counts as a plain record.
//!
//! Local objects exposed to the peer implement [`HostObject`]: a
//! declared [`ClassShape`] plus dynamic member dispatch. Callable values
//! implement [`Callable`].

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Number;

use telewire::Fault;
use telewire::GetterDesc;
use telewire::IteratorKind;
use telewire::ObjectId;

use crate::stub::Stub;

/// A value flowing through the runtime.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Value>),
    /// A by-value field bag with no class identity.
    Record(BTreeMap<String, Value>),
    /// A local classed object, marshalled by reference.
    Object(Arc<dyn HostObject>),
    /// A callable value, local or remote.
    Function(Arc<dyn Callable>),
    /// A proxy for an object owned by the peer.
    Stub(Arc<Stub>),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Number(n.into())
    }

    /// Finite floats become numbers; NaN and infinities have no JSON
    /// form and collapse to null.
    pub fn float(f: f64) -> Self {
        match Number::from_f64(f) {
            Some(n) => Value::Number(n),
            None => Value::Null,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn record(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Value::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn object(object: impl HostObject + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn function(callable: impl Callable + 'static) -> Self {
        Value::Function(Arc::new(callable))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_stub(&self) -> Option<&Arc<Stub>> {
        match self {
            Value::Stub(stub) => Some(stub),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<dyn Callable>> {
        match self {
            Value::Function(callable) => Some(callable),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            Value::Object(object) => write!(f, "Object({})", object.shape().name),
            Value::Function(_) => f.write_str("Function"),
            Value::Stub(stub) => write!(f, "Stub({}#{})", stub.class_name(), stub.id()),
        }
    }
}

impl PartialEq for Value {
    /// Data values compare structurally; identities compare by pointer.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Function(a), Value::Function(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Stub(a), Value::Stub(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// The locally declared shape of a host class: what the peer will see
/// once the class is mirrored. Parent shapes chain by ownership.
#[derive(Clone, Debug)]
pub struct ClassShape {
    pub name: String,
    pub parent: Option<Box<ClassShape>>,
    pub functions: Vec<String>,
    pub getters: Vec<GetterDesc>,
    pub properties: Vec<String>,
    pub iterator: Option<IteratorKind>,
}

impl ClassShape {
    pub fn builder(name: impl Into<String>) -> ClassShapeBuilder {
        ClassShapeBuilder {
            shape: ClassShape {
                name: name.into(),
                parent: None,
                functions: Vec::new(),
                getters: Vec::new(),
                properties: Vec::new(),
                iterator: None,
            },
        }
    }

    /// The inheritance chain, root ancestor first.
    pub fn lineage(&self) -> Vec<&ClassShape> {
        let mut chain = Vec::new();
        let mut cursor = Some(self);
        while let Some(shape) = cursor {
            chain.push(shape);
            cursor = shape.parent.as_deref();
        }
        chain.reverse();
        chain
    }
}

pub struct ClassShapeBuilder {
    shape: ClassShape,
}

impl ClassShapeBuilder {
    pub fn extends(mut self, parent: ClassShape) -> Self {
        self.shape.parent = Some(Box::new(parent));
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.shape.functions.push(name.into());
        self
    }

    pub fn getter(mut self, name: impl Into<String>, has_setter: bool) -> Self {
        self.shape.getters.push(GetterDesc::new(name, has_setter));
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.shape.properties.push(name.into());
        self
    }

    pub fn iterator(mut self, kind: IteratorKind) -> Self {
        self.shape.iterator = Some(kind);
        self
    }

    pub fn build(self) -> ClassShape {
        self.shape
    }
}

/// The surface a local object exposes to the peer.
///
/// Every operation the peer can perform on a stub lands here: method
/// invocation, getter/setter access, and opening iteration. Defaults
/// reject with a user fault, so implementors only fill in what their
/// shape declares.
#[async_trait]
pub trait HostObject: Send + Sync {
    /// The declared shape. Must be stable for the object's lifetime.
    fn shape(&self) -> ClassShape;

    /// Own data properties transmitted with the first exposure.
    /// Underscore-prefixed names are filtered before transmission.
    fn properties(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, Fault> {
        let _ = args;
        Err(Fault::user(format!(
            "no method '{}' on class '{}'",
            method,
            self.shape().name
        )))
    }

    async fn get(&self, property: &str) -> Result<Value, Fault> {
        Err(Fault::user(format!(
            "no getter '{}' on class '{}'",
            property,
            self.shape().name
        )))
    }

    async fn set(&self, property: &str, value: Value) -> Result<(), Fault> {
        let _ = value;
        Err(Fault::user(format!(
            "no setter '{}' on class '{}'",
            property,
            self.shape().name
        )))
    }

    /// Produce the iterator object backing an `iter` exchange. The
    /// returned object is marshalled like any other and must answer
    /// `next` with a `{value, done}` record.
    async fn iterate(&self, kind: IteratorKind) -> Result<Arc<dyn HostObject>, Fault> {
        let _ = kind;
        Err(Fault::user(format!(
            "class '{}' is not iterable",
            self.shape().name
        )))
    }
}

/// A callable value.
#[async_trait]
pub trait Callable: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<Value, Fault>;

    /// The peer-assigned ID when this callable is itself a stub for a
    /// remote function; local callables return `None`.
    fn remote_id(&self) -> Option<&ObjectId> {
        None
    }
}

/// Wraps a plain closure as a callable value.
pub struct NativeFn<F>(pub F);

#[async_trait]
impl<F> Callable for NativeFn<F>
where
    F: Fn(Vec<Value>) -> Result<Value, Fault> + Send + Sync,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, Fault> {
        (self.0)(args)
    }
}

/// A host iterator over a fixed sequence: `next` yields `{value, done}`
/// records until the sequence is exhausted.
pub struct SequenceIterator {
    items: Mutex<VecDeque<Value>>,
}

impl SequenceIterator {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }
}

#[async_trait]
impl HostObject for SequenceIterator {
    fn shape(&self) -> ClassShape {
        ClassShape::builder("SequenceIterator").function("next").build()
    }

    async fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<Value, Fault> {
        if method != "next" {
            return Err(Fault::user(format!("no method '{}' on iterator", method)));
        }
        let step = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        Ok(match step {
            Some(value) => Value::record([("done", Value::Bool(false)), ("value", value)]),
            None => Value::record([("done", Value::Bool(true)), ("value", Value::Null)]),
        })
    }
}
