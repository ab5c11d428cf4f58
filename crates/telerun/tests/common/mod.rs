//! Shared fixtures for the end-to-end suites: a host object graph, a
//! recording channel decorator for wire-trace assertions, and the
//! two-session rig the scenarios run on.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as Json;

use telerun::transport::CallError;
use telerun::transport::Handler;
use telerun::Callable;
use telerun::Channel;
use telerun::ClassShape;
use telerun::Fault;
use telerun::HostObject;
use telerun::IteratorKind;
use telerun::LocalChannel;
use telerun::NativeFn;
use telerun::SequenceIterator;
use telerun::Session;
use telerun::Stub;
use telerun::Value;

/// Every outbound `(method, payload)` a session issued, in order.
pub type Trace = Arc<Mutex<Vec<(String, Json)>>>;

/// Channel decorator that records outbound calls before delegating.
pub struct RecordingChannel {
    inner: Arc<dyn Channel>,
    trace: Trace,
}

impl RecordingChannel {
    pub fn wrap(inner: Arc<dyn Channel>) -> (Arc<Self>, Trace) {
        let trace: Trace = Arc::new(Mutex::new(Vec::new()));
        let channel = Arc::new(Self {
            inner,
            trace: trace.clone(),
        });
        (channel, trace)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn call_remote(&self, method: &str, payload: Json) -> Result<Json, CallError> {
        self.trace
            .lock()
            .unwrap()
            .push((method.to_string(), payload.clone()));
        self.inner.call_remote(method, payload).await
    }

    fn register_incoming_call(&self, method: &str, handler: Handler) {
        self.inner.register_incoming_call(method, handler);
    }
}

pub fn methods(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
}

pub fn count(trace: &Trace, method: &str) -> usize {
    trace.lock().unwrap().iter().filter(|(m, _)| m == method).count()
}

/// Class names carried by `class` verbs, in send order.
pub fn described_classes(trace: &Trace) -> Vec<String> {
    trace
        .lock()
        .unwrap()
        .iter()
        .filter(|(m, _)| m == "class")
        .flat_map(|(_, payload)| {
            payload
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|desc| desc["className"].as_str().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Payloads of a given verb, in send order.
pub fn payloads(trace: &Trace, method: &str) -> Vec<Json> {
    trace
        .lock()
        .unwrap()
        .iter()
        .filter(|(m, _)| m == method)
        .map(|(_, payload)| payload.clone())
        .collect()
}

fn movable_shape() -> ClassShape {
    ClassShape::builder("Movable").function("go").build()
}

/// A classed object with a getter/setter pair, a read-only getter, a
/// declared property, a private field, and an inherited method.
pub struct Car {
    owner: Mutex<String>,
    color: &'static str,
}

impl Car {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: Mutex::new(owner.to_string()),
            color: "red",
        }
    }
}

#[async_trait]
impl HostObject for Car {
    fn shape(&self) -> ClassShape {
        ClassShape::builder("Car")
            .extends(movable_shape())
            .getter("owner", true)
            .getter("vin", false)
            .property("color")
            .build()
    }

    fn properties(&self) -> Vec<(String, Value)> {
        vec![
            ("color".to_string(), Value::text(self.color)),
            ("_serviceCode".to_string(), Value::int(7)),
        ]
    }

    async fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<Value, Fault> {
        match method {
            "go" => Ok(Value::text("vroom")),
            other => Err(Fault::user(format!("no method '{}' on Car", other))),
        }
    }

    async fn get(&self, property: &str) -> Result<Value, Fault> {
        match property {
            "owner" => Ok(Value::Text(self.owner.lock().unwrap().clone())),
            "vin" => Ok(Value::text("WDB-42")),
            other => Err(Fault::user(format!("no getter '{}' on Car", other))),
        }
    }

    async fn set(&self, property: &str, value: Value) -> Result<(), Fault> {
        match property {
            "owner" => match value.as_str() {
                Some(owner) => {
                    *self.owner.lock().unwrap() = owner.to_string();
                    Ok(())
                }
                None => Err(Fault::user("owner must be a string")),
            },
            other => Err(Fault::user(format!("no setter '{}' on Car", other))),
        }
    }
}

/// An async-iterable object producing 1, 2, 3.
pub struct NumberStream;

#[async_trait]
impl HostObject for NumberStream {
    fn shape(&self) -> ClassShape {
        ClassShape::builder("NumberStream")
            .iterator(IteratorKind::AsyncIterator)
            .build()
    }

    async fn iterate(&self, _kind: IteratorKind) -> Result<Arc<dyn HostObject>, Fault> {
        Ok(Arc::new(SequenceIterator::new(vec![
            Value::int(1),
            Value::int(2),
            Value::int(3),
        ])))
    }
}

/// A linkable node: two of these form an object-graph cycle.
pub struct Node {
    label: &'static str,
    next: Mutex<Option<Value>>,
}

impl Node {
    pub fn new(label: &'static str) -> Arc<Node> {
        Arc::new(Node {
            label,
            next: Mutex::new(None),
        })
    }

    pub fn link(&self, next: Value) {
        *self.next.lock().unwrap() = Some(next);
    }
}

#[async_trait]
impl HostObject for Node {
    fn shape(&self) -> ClassShape {
        ClassShape::builder("Node")
            .property("label")
            .property("next")
            .build()
    }

    fn properties(&self) -> Vec<(String, Value)> {
        vec![
            ("label".to_string(), Value::text(self.label)),
            (
                "next".to_string(),
                self.next.lock().unwrap().clone().unwrap_or(Value::Null),
            ),
        ]
    }
}

fn add(args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::int(args.iter().filter_map(Value::as_i64).sum()))
}

/// The seed object: hands out the same car, adder, and stream on every
/// call, echoes arguments, throws on demand, and remembers one value
/// for identity checks.
pub struct Garage {
    car: Arc<Car>,
    adder: Arc<dyn Callable>,
    stream: Arc<NumberStream>,
    loop_head: Arc<Node>,
    slot: Mutex<Option<Value>>,
}

impl Garage {
    pub fn new() -> Self {
        let head = Node::new("a");
        let tail = Node::new("b");
        head.link(Value::Object(tail.clone()));
        tail.link(Value::Object(head.clone()));

        Self {
            car: Arc::new(Car::new("Fred")),
            adder: Arc::new(NativeFn(add)),
            stream: Arc::new(NumberStream),
            loop_head: head,
            slot: Mutex::new(None),
        }
    }
}

#[async_trait]
impl HostObject for Garage {
    fn shape(&self) -> ClassShape {
        ClassShape::builder("Garage")
            .function("car")
            .function("plain")
            .function("adder")
            .function("echo")
            .function("boom")
            .function("keep")
            .function("same")
            .function("numbers")
            .function("loop")
            .build()
    }

    async fn invoke(&self, method: &str, mut args: Vec<Value>) -> Result<Value, Fault> {
        match method {
            "car" => Ok(Value::Object(self.car.clone())),
            "plain" => Ok(Value::record([
                ("a", Value::int(1)),
                ("b", Value::record([("c", Value::int(2))])),
            ])),
            "adder" => Ok(Value::Function(self.adder.clone())),
            "echo" => Ok(if args.is_empty() {
                Value::Null
            } else {
                args.remove(0)
            }),
            "boom" => Err(Fault::user("boom")),
            "keep" => {
                *self.slot.lock().unwrap() = args.into_iter().next();
                Ok(Value::Null)
            }
            "same" => {
                let stored = self.slot.lock().unwrap();
                Ok(Value::Bool(stored.as_ref() == args.first()))
            }
            "numbers" => Ok(Value::Object(self.stream.clone())),
            "loop" => Ok(Value::Object(self.loop_head.clone())),
            other => Err(Fault::user(format!("no method '{}' on Garage", other))),
        }
    }
}

/// A connected pair of sessions with wire traces on both ends. The
/// server seeds a [`Garage`]; `seed_stub` is the client's proxy for it.
pub struct Rig {
    pub server: Session,
    pub client: Session,
    pub server_trace: Trace,
    pub client_trace: Trace,
    pub seed_stub: Arc<Stub>,
}

pub async fn rig() -> Rig {
    let (near, far) = LocalChannel::pair();
    let (server_channel, server_trace) = RecordingChannel::wrap(near);
    let (client_channel, client_trace) = RecordingChannel::wrap(far);

    let server = Session::start(server_channel, Value::object(Garage::new()));
    let client = Session::start(client_channel, Value::Null);

    let seed = client.remote_start().await.expect("start handshake failed");
    let Value::Stub(seed_stub) = seed else {
        panic!("expected the seed to arrive as a stub, got {:?}", seed);
    };

    Rig {
        server,
        client,
        server_trace,
        client_trace,
        seed_stub,
    }
}

/// Invoke a method expected to reply with a stub.
pub async fn invoke_stub(stub: &Arc<Stub>, method: &str) -> Arc<Stub> {
    match stub.invoke(method, Vec::new()).await {
        Ok(Value::Stub(result)) => result,
        Ok(other) => panic!("expected '{}' to reply with a stub, got {:?}", method, other),
        Err(e) => panic!("'{}' failed: {}", method, e),
    }
}
