//! # Value Marshaller
//!
//! The two recursive transforms between in-memory [`Value`]s and wire
//! descriptors. Outgoing is async because introducing an object may
//! first require a completed `class` exchange for its lineage; incoming
//! is synchronous.
//!
//! ## Invariants
//!
//! - An object's ID is registered before its properties are walked, so
//!   self-referential graphs marshal as back-edge references.
//! - A stub is registered before its properties are unmarshalled, so
//!   self-referential descriptions resolve to the stub being built.
//! - Underscore-prefixed property names never cross the wire.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use telewire::Fault;
use telewire::FaultKind;
use telewire::WireValue;
use telewire::FUNCTION_CLASS;

use crate::object::Value;
use crate::registry::LocalHandle;
use crate::registry::RemoteHandle;
use crate::session::SessionInner;
use crate::stub::RemoteFunction;
use crate::stub::Stub;

/// Encode a payload into the channel's JSON body.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Json, Fault> {
    serde_json::to_value(value).map_err(|e| Fault::protocol(format!("payload encoding: {}", e)))
}

/// Decode a channel JSON body into a payload.
pub(crate) fn decode<T: DeserializeOwned>(payload: Json) -> Result<T, Fault> {
    serde_json::from_value(payload)
        .map_err(|e| Fault::protocol(format!("malformed payload: {}", e)))
}

/// Outgoing transform: in-memory value → wire descriptor.
pub(crate) fn outgoing<'a>(
    session: &'a Arc<SessionInner>,
    value: &'a Value,
) -> BoxFuture<'a, Result<WireValue, Fault>> {
    Box::pin(async move {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Bool(b) => Ok(WireValue::Bool(*b)),
            Value::Number(n) => Ok(WireValue::Number(n.clone())),
            Value::Text(s) => Ok(WireValue::Text(s.clone())),

            Value::List(items) => {
                let mut wire = Vec::with_capacity(items.len());
                for item in items {
                    wire.push(outgoing(session, item).await?);
                }
                Ok(WireValue::List(wire))
            }

            Value::Record(fields) => {
                let mut wire = BTreeMap::new();
                for (name, field) in fields {
                    wire.insert(name.clone(), outgoing(session, field).await?);
                }
                Ok(WireValue::Plain { plain_object: wire })
            }

            Value::Function(callable) => {
                // a function stub goes home as the peer's own ID
                if let Some(id) = callable.remote_id() {
                    return Ok(WireValue::RemoteRef {
                        id_remote: id.clone(),
                    });
                }
                let (id, _) = session
                    .registry
                    .expose(LocalHandle::Function(callable.clone()));
                Ok(WireValue::function_ref(id))
            }

            Value::Stub(stub) => Ok(WireValue::RemoteRef {
                id_remote: stub.id().clone(),
            }),

            Value::Object(object) => {
                let shape = object.shape();
                let (id, introduced) = session
                    .registry
                    .expose(LocalHandle::Object(object.clone()));
                if !introduced {
                    return Ok(WireValue::LocalRef {
                        id_local: id,
                        class_name: None,
                    });
                }

                session
                    .mirror
                    .ensure_described(&shape, &session.channel)
                    .await?;

                let mut properties = BTreeMap::new();
                for (name, field) in object.properties() {
                    if name.starts_with('_') {
                        continue;
                    }
                    let wire = outgoing(session, &field).await?;
                    properties.insert(name, wire);
                }
                Ok(WireValue::Described {
                    id_local: id,
                    class_name: shape.name,
                    properties,
                })
            }
        }
    })
}

/// Incoming transform: wire descriptor → in-memory value.
pub(crate) fn incoming(session: &Arc<SessionInner>, wire: WireValue) -> Result<Value, Fault> {
    match wire {
        WireValue::Null => Ok(Value::Null),
        WireValue::Bool(b) => Ok(Value::Bool(b)),
        WireValue::Number(n) => Ok(Value::Number(n)),
        WireValue::Text(s) => Ok(Value::Text(s)),

        WireValue::List(items) => items
            .into_iter()
            .map(|item| incoming(session, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        WireValue::Plain { plain_object } => {
            let mut fields = BTreeMap::new();
            for (name, field) in plain_object {
                fields.insert(name, incoming(session, field)?);
            }
            Ok(Value::Record(fields))
        }

        WireValue::Described {
            id_local,
            class_name,
            properties,
        } => {
            let stub = Arc::new(Stub::new(
                id_local.clone(),
                class_name,
                Arc::downgrade(session),
            ));
            session
                .registry
                .register_remote(id_local, RemoteHandle::Stub(Arc::downgrade(&stub)))?;
            for (name, field) in properties {
                let value = incoming(session, field)?;
                stub.assign_prop(name, value);
            }
            Ok(Value::Stub(stub))
        }

        WireValue::LocalRef {
            id_local,
            class_name,
        } => {
            if let Some(existing) = session.registry.remote(&id_local) {
                return Ok(existing);
            }
            if class_name.as_deref() == Some(FUNCTION_CLASS) {
                let function = Arc::new(RemoteFunction::new(
                    id_local.clone(),
                    Arc::downgrade(session),
                ));
                session.registry.register_remote(
                    id_local,
                    RemoteHandle::Function(Arc::downgrade(&function)),
                )?;
                return Ok(Value::Function(function));
            }
            Err(Fault::new(
                FaultKind::UnknownRemote,
                format!(
                    "reference to id '{}' without a live stub or description",
                    id_local
                ),
            ))
        }

        WireValue::RemoteRef { id_remote } => session
            .registry
            .local(&id_remote)
            .map(LocalHandle::into_value),
    }
}
