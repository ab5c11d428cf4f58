//! End-to-end scenarios over an in-process duplex pair: mirroring,
//! getters and setters, function values, plain-object copies, async
//! iteration, identity round-trips, and error propagation.

mod common;

use std::sync::Arc;

use common::invoke_stub;
use common::rig;
use common::Car;

use telerun::Constructor;
use telerun::Error;
use telerun::Fault;
use telerun::FaultKind;
use telerun::Value;

#[tokio::test]
async fn start_handshake_seeds_the_remote_graph() {
    let rig = rig().await;
    assert_eq!(rig.seed_stub.class_name(), "Garage");
}

#[tokio::test]
async fn getter_setter_round_trip() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;

    assert_eq!(car.get("owner").await.expect("get owner"), Value::text("Fred"));

    car.set("owner", Value::text("Wilma")).await.expect("set owner");
    assert_eq!(car.get("owner").await.expect("get owner"), Value::text("Wilma"));
}

#[tokio::test]
async fn descriptions_arrive_parent_first() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;
    assert_eq!(car.class_name(), "Car");

    let classes = common::described_classes(&rig.server_trace);
    let movable = classes.iter().position(|c| c == "Movable");
    let car_pos = classes.iter().position(|c| c == "Car");
    assert!(
        movable.is_some() && movable < car_pos,
        "expected Movable before Car in {:?}",
        classes
    );

    // each class is described exactly once per session
    assert_eq!(classes.iter().filter(|c| *c == "Car").count(), 1);
    assert_eq!(classes.iter().filter(|c| *c == "Movable").count(), 1);
}

#[tokio::test]
async fn methods_resolve_through_the_parent_chain() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;

    // `go` is declared on Movable, not Car
    let reply = car.invoke("go", Vec::new()).await.expect("inherited call");
    assert_eq!(reply, Value::text("vroom"));
}

#[tokio::test]
async fn function_values_are_first_class() {
    let rig = rig().await;

    let adder = rig
        .seed_stub
        .invoke("adder", Vec::new())
        .await
        .expect("fetch adder");
    let Value::Function(callable) = &adder else {
        panic!("expected a callable, got {:?}", adder);
    };

    let sum = callable
        .call(vec![Value::int(3), Value::int(4)])
        .await
        .expect("remote call");
    assert_eq!(sum, Value::int(7));

    // a later return of the same function resolves to the same stub
    let again = rig
        .seed_stub
        .invoke("adder", Vec::new())
        .await
        .expect("fetch adder again");
    assert_eq!(adder, again);

    // and echoing the stub home returns the very same value
    let echoed = rig
        .seed_stub
        .invoke("echo", vec![adder.clone()])
        .await
        .expect("echo adder");
    assert_eq!(echoed, adder);
}

#[tokio::test]
async fn plain_objects_copy_by_value() {
    let rig = rig().await;

    let first = rig
        .seed_stub
        .invoke("plain", Vec::new())
        .await
        .expect("fetch record");
    let Value::Record(mut fields) = first else {
        panic!("expected a record, got {:?}", first);
    };

    // mutate the copy: the server's original is untouched
    fields.insert("a".to_string(), Value::int(9));

    let second = rig
        .seed_stub
        .invoke("plain", Vec::new())
        .await
        .expect("fetch record again");
    assert_eq!(
        second,
        Value::record([
            ("a", Value::int(1)),
            ("b", Value::record([("c", Value::int(2))])),
        ])
    );
}

#[tokio::test]
async fn async_iteration_pulls_through_an_iterator_stub() {
    let rig = rig().await;
    let stream = invoke_stub(&rig.seed_stub, "numbers").await;

    let iterator = stream.iterate().await.expect("open iteration");
    let mut collected = Vec::new();
    while let Some(value) = iterator.next().await.expect("pull") {
        collected.push(value);
    }
    assert_eq!(collected, vec![Value::int(1), Value::int(2), Value::int(3)]);

    // one iter exchange, then one func pull per element plus the end
    assert_eq!(common::count(&rig.client_trace, "iter"), 1);
    let pulls = common::payloads(&rig.client_trace, "func")
        .into_iter()
        .filter(|payload| payload["name"] == "next")
        .count();
    assert_eq!(pulls, 4);
}

#[tokio::test]
async fn cyclic_graphs_marshal_as_back_edges() {
    let rig = rig().await;
    let head = invoke_stub(&rig.seed_stub, "loop").await;

    let Some(Value::Stub(tail)) = head.prop("next") else {
        panic!("expected head.next to be a stub");
    };
    let Some(Value::Stub(back)) = tail.prop("next") else {
        panic!("expected tail.next to be a stub");
    };

    assert!(Arc::ptr_eq(&back, &head), "the cycle must close on the same stub");
    assert_eq!(head.prop("label"), Some(Value::text("a")));
    assert_eq!(tail.prop("label"), Some(Value::text("b")));
}

#[tokio::test]
async fn local_objects_round_trip_by_identity() {
    let rig = rig().await;

    // client-owned object, sent out and echoed back
    let car: Arc<dyn telerun::HostObject> = Arc::new(Car::new("Barney"));
    let sent = Value::Object(car.clone());

    let echoed = rig
        .seed_stub
        .invoke("echo", vec![sent.clone()])
        .await
        .expect("echo object");
    assert_eq!(echoed, sent, "the echoed value must be the same reference");
}

#[tokio::test]
async fn peer_sees_the_same_object_across_calls() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;

    // park the stub server-side, then hand it over again
    rig.seed_stub
        .invoke("keep", vec![Value::Stub(car.clone())])
        .await
        .expect("keep");
    let same = rig
        .seed_stub
        .invoke("same", vec![Value::Stub(car.clone())])
        .await
        .expect("same");
    assert_eq!(same, Value::Bool(true));
}

#[tokio::test]
async fn at_most_one_stub_per_remote_id() {
    let rig = rig().await;
    let first = invoke_stub(&rig.seed_stub, "car").await;
    let second = invoke_stub(&rig.seed_stub, "car").await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn underscore_members_never_cross_the_wire() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;

    assert_eq!(car.prop("color"), Some(Value::text("red")));
    assert_eq!(car.prop("_serviceCode"), None);

    for payload in common::payloads(&rig.server_trace, "class") {
        let text = payload.to_string();
        assert!(
            !text.contains("\"_"),
            "class description leaked an underscore member: {}",
            text
        );
    }
}

#[tokio::test]
async fn user_exceptions_propagate_with_their_message() {
    let rig = rig().await;

    let err = rig
        .seed_stub
        .invoke("boom", Vec::new())
        .await
        .expect_err("boom must fail");
    match err {
        Error::Fault(Fault { kind, message }) => {
            assert_eq!(kind, FaultKind::UserException);
            assert_eq!(message, "boom");
        }
        other => panic!("expected a user fault, got {:?}", other),
    }
}

#[tokio::test]
async fn undeclared_members_fail_before_any_wire_traffic() {
    let rig = rig().await;
    let car = invoke_stub(&rig.seed_stub, "car").await;
    let traffic_before = rig.client_trace.lock().unwrap().len();

    match car.invoke("fly", Vec::new()).await.expect_err("no such method") {
        Error::NoSuchMember { class, member } => {
            assert_eq!(class, "Car");
            assert_eq!(member, "fly");
        }
        other => panic!("expected a member miss, got {:?}", other),
    }

    match car
        .set("vin", Value::text("forged"))
        .await
        .expect_err("vin is read-only")
    {
        Error::NoSetter { property, .. } => assert_eq!(property, "vin"),
        other => panic!("expected a setter miss, got {:?}", other),
    }

    match car.iterate().await.expect_err("cars do not iterate") {
        Error::NotIterable { class } => assert_eq!(class, "Car"),
        other => panic!("expected not-iterable, got {:?}", other),
    }

    assert_eq!(
        rig.client_trace.lock().unwrap().len(),
        traffic_before,
        "local dispatch misses must not reach the wire"
    );
}

#[tokio::test]
async fn new_remote_constructs_on_the_peer() {
    let rig = rig().await;

    let constructor: Constructor = Arc::new(|mut args| {
        Box::pin(async move {
            let owner = args
                .pop()
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| Fault::user("Car::new takes an owner name"))?;
            Ok(Arc::new(Car::new(&owner)) as Arc<dyn telerun::HostObject>)
        })
    });
    rig.server.register_constructor("Car", constructor);

    let built = rig
        .client
        .new_remote("Car", vec![Value::text("Betty")])
        .await
        .expect("remote construction");
    let Value::Stub(stub) = built else {
        panic!("expected a stub, got {:?}", built);
    };
    assert_eq!(stub.class_name(), "Car");
    assert_eq!(stub.get("owner").await.expect("get owner"), Value::text("Betty"));
}

#[tokio::test]
async fn new_remote_without_a_constructor_is_rejected() {
    let rig = rig().await;

    let err = rig
        .client
        .new_remote("Spaceship", Vec::new())
        .await
        .expect_err("no such constructor");
    match err {
        Error::Fault(fault) => assert_eq!(fault.kind, FaultKind::UserException),
        other => panic!("expected a fault, got {:?}", other),
    }
}
