//! A subscription ring (a -> b -> c -> a) must deliver exactly one pass
//! around the loop: origin tracking has to stop the write from reaching
//! any node it has already visited, or this test hangs instead of
//! failing an assertion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hbus::core::{CoreResult, ObjectId, Origin, Subscribable, Value, ValueKind, Variable, Writable};

struct Probe {
    id: ObjectId,
    calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl Writable for Probe {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        ValueKind::Int
    }
    async fn write(&self, value: Value, _origin: Origin) -> CoreResult<()> {
        self.calls.lock().unwrap().push(value);
        Ok(())
    }
}

#[tokio::test]
async fn cyclic_subscription_ring_terminates_after_one_pass() {
    let a = Variable::new(ValueKind::Int, "a");
    let b = Variable::new(ValueKind::Int, "b");
    let c = Variable::new(ValueKind::Int, "c");

    a.subscribe(b.clone(), None);
    b.subscribe(c.clone(), None);
    c.subscribe(a.clone(), None);

    let probe = Arc::new(Probe { id: ObjectId::new(), calls: Mutex::new(Vec::new()) });
    a.subscribe(probe.clone(), None);

    tokio::time::timeout(Duration::from_secs(2), a.write(Value::Int(7), Origin::root()))
        .await
        .expect("cyclic write must terminate, not hang")
        .unwrap();

    assert_eq!(a.current().await, Some(Value::Int(7)));
    assert_eq!(b.current().await, Some(Value::Int(7)));
    assert_eq!(c.current().await, Some(Value::Int(7)));
    assert_eq!(
        probe.calls.lock().unwrap().len(),
        1,
        "a's own fan-out must see exactly the original write, never a reflected one from around the ring"
    );
}

#[tokio::test]
async fn two_node_mutual_subscription_does_not_loop() {
    let a = Variable::new(ValueKind::Int, "a");
    let b = Variable::new(ValueKind::Int, "b");
    a.subscribe(b.clone(), None);
    b.subscribe(a.clone(), None);

    tokio::time::timeout(Duration::from_secs(2), a.write(Value::Int(1), Origin::root()))
        .await
        .expect("mutual subscription must terminate")
        .unwrap();

    assert_eq!(a.current().await, Some(Value::Int(1)));
    assert_eq!(b.current().await, Some(Value::Int(1)));

    // A second, distinct value still only makes it around once.
    tokio::time::timeout(Duration::from_secs(2), b.write(Value::Int(2), Origin::root()))
        .await
        .expect("mutual subscription must terminate on the second write too")
        .unwrap();
    assert_eq!(a.current().await, Some(Value::Int(2)));
    assert_eq!(b.current().await, Some(Value::Int(2)));
}
