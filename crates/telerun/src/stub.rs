//! # Remote proxies
//!
//! A [`Stub`] stands in for an object owned by the peer. It dispatches
//! by lookup against the mirrored class table: a member call first
//! resolves the name through the class chain, then forwards the verb
//! over the channel. Dropping the last reference to a proxy releases
//! the peer's slot (the GC bridge).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use async_trait::async_trait;

use telewire::CallPayload;
use telewire::Fault;
use telewire::FaultKind;
use telewire::FuncPayload;
use telewire::GetPayload;
use telewire::IterPayload;
use telewire::ObjectId;
use telewire::SetPayload;
use telewire::Verb;

use crate::error::Error;
use crate::marshal;
use crate::object::Callable;
use crate::object::Value;
use crate::session::SessionInner;

/// A proxy for a classed object owned by the peer.
///
/// The stub's surface is whatever the mirrored class description
/// declares; members resolve through the parent chain and misses fail
/// locally before any wire traffic.
pub struct Stub {
    id: ObjectId,
    class_name: String,
    properties: Mutex<BTreeMap<String, Value>>,
    session: Weak<SessionInner>,
}

impl Stub {
    pub(crate) fn new(id: ObjectId, class_name: String, session: Weak<SessionInner>) -> Self {
        Self {
            id,
            class_name,
            properties: Mutex::new(BTreeMap::new()),
            session,
        }
    }

    /// The peer-assigned ID. Never changes once assigned.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Snapshot of a data property as transmitted with the object's
    /// description. Reads are local; no wire traffic.
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.properties
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    pub(crate) fn assign_prop(&self, name: String, value: Value) {
        self.properties
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, value);
    }

    fn session(&self) -> Result<Arc<SessionInner>, Error> {
        self.session
            .upgrade()
            .ok_or(Error::Transport(crate::transport::Error::Closed))
    }

    /// Invoke a mirrored method: one `func` exchange.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, Error> {
        let session = self.session()?;
        if !session.mirror.has_function(&self.class_name, method) {
            return Err(Error::NoSuchMember {
                class: self.class_name.clone(),
                member: method.to_string(),
            });
        }

        let mut wire_args = Vec::with_capacity(args.len());
        for arg in &args {
            wire_args.push(marshal::outgoing(&session, arg).await?);
        }
        let payload = marshal::encode(&FuncPayload {
            obj: self.id.clone(),
            name: method.to_string(),
            args: wire_args,
        })?;
        let reply = session.channel.call_remote(Verb::Func.as_str(), payload).await?;
        Ok(marshal::incoming(&session, marshal::decode(reply)?)?)
    }

    /// Read a mirrored getter: one `get` exchange.
    pub async fn get(&self, property: &str) -> Result<Value, Error> {
        let session = self.session()?;
        if session.mirror.getter(&self.class_name, property).is_none() {
            return Err(Error::NoSuchMember {
                class: self.class_name.clone(),
                member: property.to_string(),
            });
        }

        let payload = marshal::encode(&GetPayload {
            obj: self.id.clone(),
            name: property.to_string(),
        })?;
        let reply = session.channel.call_remote(Verb::Get.as_str(), payload).await?;
        Ok(marshal::incoming(&session, marshal::decode(reply)?)?)
    }

    /// Write through a mirrored setter: one `set` exchange.
    pub async fn set(&self, property: &str, value: Value) -> Result<(), Error> {
        let session = self.session()?;
        match session.mirror.getter(&self.class_name, property) {
            None => {
                return Err(Error::NoSuchMember {
                    class: self.class_name.clone(),
                    member: property.to_string(),
                })
            }
            Some(getter) if !getter.has_setter => {
                return Err(Error::NoSetter {
                    class: self.class_name.clone(),
                    property: property.to_string(),
                })
            }
            Some(_) => {}
        }

        let wire = marshal::outgoing(&session, &value).await?;
        let payload = marshal::encode(&SetPayload {
            obj: self.id.clone(),
            name: property.to_string(),
            value: wire,
        })?;
        session.channel.call_remote(Verb::Set.as_str(), payload).await?;
        Ok(())
    }

    /// Open the remote iteration protocol: one `iter` exchange whose
    /// reply is the iterator's own stub.
    pub async fn iterate(&self) -> Result<RemoteIterator, Error> {
        let session = self.session()?;
        let Some(kind) = session.mirror.iterator_kind(&self.class_name) else {
            return Err(Error::NotIterable {
                class: self.class_name.clone(),
            });
        };

        let payload = marshal::encode(&IterPayload {
            obj: self.id.clone(),
            symbol: kind,
        })?;
        let reply = session.channel.call_remote(Verb::Iter.as_str(), payload).await?;
        match marshal::incoming(&session, marshal::decode(reply)?)? {
            Value::Stub(stub) => Ok(RemoteIterator { stub }),
            other => Err(Error::Fault(Fault::protocol(format!(
                "iter reply was not an object reference but {:?}",
                other
            )))),
        }
    }
}

impl Drop for Stub {
    fn drop(&mut self) {
        if let Some(session) = self.session.upgrade() {
            session.release_remote(self.id.clone());
        }
    }
}

/// A callable stub for a peer-owned function: invoking it is one `call`
/// exchange.
pub struct RemoteFunction {
    id: ObjectId,
    session: Weak<SessionInner>,
}

impl RemoteFunction {
    pub(crate) fn new(id: ObjectId, session: Weak<SessionInner>) -> Self {
        Self { id, session }
    }
}

#[async_trait]
impl Callable for RemoteFunction {
    async fn call(&self, args: Vec<Value>) -> Result<Value, Fault> {
        let Some(session) = self.session.upgrade() else {
            return Err(Fault::new(FaultKind::ConnectionLost, "session is gone"));
        };

        let mut wire_args = Vec::with_capacity(args.len());
        for arg in &args {
            wire_args.push(marshal::outgoing(&session, arg).await?);
        }
        let payload = marshal::encode(&CallPayload {
            obj: self.id.clone(),
            args: wire_args,
        })?;
        let reply = session
            .channel
            .call_remote(Verb::Call.as_str(), payload)
            .await
            .map_err(Fault::from)?;
        marshal::incoming(&session, marshal::decode(reply)?)
    }

    fn remote_id(&self) -> Option<&ObjectId> {
        Some(&self.id)
    }
}

impl Drop for RemoteFunction {
    fn drop(&mut self) {
        if let Some(session) = self.session.upgrade() {
            session.release_remote(self.id.clone());
        }
    }
}

/// Pull-style remote iteration: each `next` is one `func` exchange
/// against the iterator stub, yielding until the peer reports `done`.
pub struct RemoteIterator {
    stub: Arc<Stub>,
}

impl std::fmt::Debug for RemoteIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIterator")
            .field("id", self.stub.id())
            .finish()
    }
}

impl RemoteIterator {
    /// The next element, or `None` once the remote sequence ends.
    pub async fn next(&self) -> Result<Option<Value>, Error> {
        let step = self.stub.invoke("next", Vec::new()).await?;
        let Value::Record(mut fields) = step else {
            return Err(Error::Fault(Fault::protocol(
                "iterator step was not a {value, done} record",
            )));
        };
        if matches!(fields.get("done"), Some(Value::Bool(true))) {
            return Ok(None);
        }
        Ok(Some(fields.remove("value").unwrap_or(Value::Null)))
    }
}
