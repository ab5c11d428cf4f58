//! # Dispatch Core
//!
//! [`Session::start`] installs a handler for each of the nine wire
//! verbs and publishes the seed object; from then on the session is
//! symmetric — either peer may expose, call, construct, iterate, and
//! release. Inbound handlers dereference the target through the
//! registry, unmarshal arguments, perform the local operation, and
//! reply with the marshalled result; any fault travels back in the
//! channel's error envelope untouched.

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value as Json;

use telewire::CallPayload;
use telewire::ClassDesc;
use telewire::DelPayload;
use telewire::Fault;
use telewire::FaultKind;
use telewire::FuncPayload;
use telewire::GetPayload;
use telewire::IterPayload;
use telewire::NewPayload;
use telewire::ObjectId;
use telewire::SetPayload;
use telewire::Verb;

use crate::error::Error;
use crate::marshal;
use crate::mirror::Mirror;
use crate::object::HostObject;
use crate::object::Value;
use crate::registry::LocalHandle;
use crate::registry::Registry;
use crate::transport::Channel;
use crate::transport::Handler;

/// Factory backing the `new` verb for one class name.
pub type Constructor =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Arc<dyn HostObject>, Fault>> + Send + Sync>;

/// One peer's endpoint of an object-graph RPC session.
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) channel: Arc<dyn Channel>,
    pub(crate) registry: Registry,
    pub(crate) mirror: Mirror,
    constructors: DashMap<String, Constructor>,
    seed: Value,
    gc_warned: AtomicBool,
}

impl Session {
    /// One-shot initialization: installs every verb handler on the
    /// channel and publishes `seed` as the reply to the peer's `start`.
    pub fn start(channel: Arc<dyn Channel>, seed: Value) -> Session {
        let inner = Arc::new(SessionInner {
            channel,
            registry: Registry::new(),
            mirror: Mirror::new(),
            constructors: DashMap::new(),
            seed,
            gc_warned: AtomicBool::new(false),
        });
        register_handlers(&inner);
        Session { inner }
    }

    /// Fetch the peer's seed object, seeding the remote graph.
    pub async fn remote_start(&self) -> Result<Value, Error> {
        let reply = self
            .inner
            .channel
            .call_remote(Verb::Start.as_str(), Json::Null)
            .await?;
        Ok(marshal::incoming(&self.inner, marshal::decode(reply)?)?)
    }

    /// Ask the peer to construct an instance of a mirrored class;
    /// resolves with the new object's stub.
    pub async fn new_remote(&self, class_name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let mut wire_args = Vec::with_capacity(args.len());
        for arg in &args {
            wire_args.push(marshal::outgoing(&self.inner, arg).await?);
        }
        let payload = marshal::encode(&NewPayload {
            class_name: class_name.to_string(),
            args: wire_args,
        })?;
        let reply = self
            .inner
            .channel
            .call_remote(Verb::New.as_str(), payload)
            .await?;
        Ok(marshal::incoming(&self.inner, marshal::decode(reply)?)?)
    }

    /// Install the factory backing the `new` verb for `class_name`.
    /// Which classes to offer is the embedder's decision.
    pub fn register_constructor(&self, class_name: impl Into<String>, constructor: Constructor) {
        self.inner.constructors.insert(class_name.into(), constructor);
    }
}

impl SessionInner {
    /// GC bridge: a dropped proxy releases the peer's slot. The `del`
    /// is fire-and-forget; send failures are logged, never raised.
    pub(crate) fn release_remote(&self, id: ObjectId) {
        if !self.registry.forget_remote(&id) {
            // a newer proxy owns the slot; no release owed
            return;
        }
        let payload = match marshal::encode(&DelPayload {
            id_remote: id.clone(),
        }) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        let channel = self.channel.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = channel.call_remote(Verb::Del.as_str(), payload).await {
                        tracing::warn!(id = %id, error = %e, "failed to release remote object");
                    }
                });
            }
            Err(_) => {
                if !self.gc_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "no async runtime at proxy drop; remote objects leak until the session ends"
                    );
                }
            }
        }
    }
}

fn register_handlers(inner: &Arc<SessionInner>) {
    install(inner, Verb::Start, |session, _payload| async move {
        tracing::debug!("serving start handshake");
        let seed = session.seed.clone();
        let wire = marshal::outgoing(&session, &seed).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Class, |session, payload| async move {
        let descriptions: Vec<ClassDesc> = marshal::decode(payload)?;
        for desc in descriptions {
            session.mirror.receive(desc)?;
        }
        Ok(Json::Null)
    });

    install(inner, Verb::New, |session, payload| async move {
        let NewPayload { class_name, args } = marshal::decode(payload)?;
        let Some(constructor) = session
            .constructors
            .get(&class_name)
            .map(|entry| entry.value().clone())
        else {
            return Err(Fault::user(format!(
                "no constructor registered for class '{}'",
                class_name
            )));
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(marshal::incoming(&session, arg)?);
        }
        let object = constructor(values).await?;
        let wire = marshal::outgoing(&session, &Value::Object(object)).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Call, |session, payload| async move {
        let CallPayload { obj, args } = marshal::decode(payload)?;
        let LocalHandle::Function(callable) = session.registry.local(&obj)? else {
            return Err(Fault::protocol(format!(
                "id '{}' does not name a callable",
                obj
            )));
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(marshal::incoming(&session, arg)?);
        }
        let result = callable.call(values).await?;
        let wire = marshal::outgoing(&session, &result).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Func, |session, payload| async move {
        let FuncPayload { obj, name, args } = marshal::decode(payload)?;
        tracing::debug!(obj = %obj, method = %name, "dispatching func");
        let LocalHandle::Object(object) = session.registry.local(&obj)? else {
            return Err(Fault::protocol(format!("id '{}' does not name an object", obj)));
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(marshal::incoming(&session, arg)?);
        }
        let result = object.invoke(&name, values).await?;
        let wire = marshal::outgoing(&session, &result).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Get, |session, payload| async move {
        let GetPayload { obj, name } = marshal::decode(payload)?;
        let LocalHandle::Object(object) = session.registry.local(&obj)? else {
            return Err(Fault::protocol(format!("id '{}' does not name an object", obj)));
        };
        let result = object.get(&name).await?;
        let wire = marshal::outgoing(&session, &result).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Set, |session, payload| async move {
        let SetPayload { obj, name, value } = marshal::decode(payload)?;
        let LocalHandle::Object(object) = session.registry.local(&obj)? else {
            return Err(Fault::protocol(format!("id '{}' does not name an object", obj)));
        };
        let value = marshal::incoming(&session, value)?;
        object.set(&name, value).await?;
        Ok(Json::Null)
    });

    install(inner, Verb::Iter, |session, payload| async move {
        let IterPayload { obj, symbol } = marshal::decode(payload)?;
        let LocalHandle::Object(object) = session.registry.local(&obj)? else {
            return Err(Fault::protocol(format!("id '{}' does not name an object", obj)));
        };
        let iterator = object.iterate(symbol).await?;
        let wire = marshal::outgoing(&session, &Value::Object(iterator)).await?;
        marshal::encode(&wire)
    });

    install(inner, Verb::Del, |session, payload| async move {
        let DelPayload { id_remote } = marshal::decode(payload)?;
        tracing::debug!(id = %id_remote, "peer released its stub");
        session.registry.release_local(&id_remote);
        Ok(Json::Null)
    });
}

/// Installs one verb handler. Handlers hold the session weakly so a
/// dropped session does not keep itself alive through the channel.
fn install<F, Fut>(inner: &Arc<SessionInner>, verb: Verb, handle: F)
where
    F: Fn(Arc<SessionInner>, Json) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Json, Fault>> + Send + 'static,
{
    let weak = Arc::downgrade(inner);
    let handler: Handler = Arc::new(move |payload| {
        let fut: BoxFuture<'static, Result<Json, Fault>> = match weak.upgrade() {
            Some(session) => Box::pin(handle(session, payload)),
            None => Box::pin(async {
                Err(Fault::new(FaultKind::ConnectionLost, "session is gone"))
            }),
        };
        fut
    });
    inner.channel.register_incoming_call(verb.as_str(), handler);
}
