//! The full process lifecycle (`shc.supervisor.ServiceLifecycle`
//! equivalent): interfaces connect and subscribe, variables pull their
//! initial value from a provider, and timers start firing — all driven
//! by one `start_all()` call — then `shutdown_all()` tears every piece
//! back down and nothing fires again afterward.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hbus::core::{CoreResult, ObjectId, Origin, Reading, Subscribable, Value, ValueKind, Variable, Writable};
use hbus::supervisor::{ProcessSupervisor, SupervisorConfig};
use hbus::timer::{Every, RandomFn, Timer};
use hbus_test_utils::FakeInterface;

struct CountingSink {
    id: ObjectId,
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl Writable for CountingSink {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        ValueKind::Unit
    }
    async fn write(&self, _value: Value, _origin: Origin) -> CoreResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn full_process_lifecycle_starts_and_stops_cleanly() {
    let process = ProcessSupervisor::new();

    let iface = FakeInterface::new("iface", 0);
    process.register_interface(iface.clone(), SupervisorConfig::default()).await;

    let provider = Variable::new(ValueKind::Int, "provider");
    provider.write(Value::Int(42), Origin::root()).await.unwrap();
    let sink = Variable::new(ValueKind::Int, "sink");
    sink.set_provider(provider.clone(), None, false);
    process.register_variable(sink.clone()).await;

    let schedule = Every::new(Duration::from_millis(50)).aligned(false).with_jitter(Duration::ZERO, RandomFn::Uniform);
    let timer = Timer::new("tick", schedule);
    let ticks = Arc::new(AtomicUsize::new(0));
    timer.subscribe(Arc::new(CountingSink { id: ObjectId::new(), count: ticks.clone() }), None);
    process.register_timer(timer).await;

    process.start_all().await.unwrap();

    assert_eq!(sink.current().await, Some(Value::Int(42)), "registered variables must pull their provider value during startup");
    assert_eq!(iface.connect_calls(), 1);
    assert_eq!(iface.subscribe_calls(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 1, "the registered timer must have fired at least once by now");

    process.shutdown_all().await;
    let ticks_at_shutdown = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), ticks_at_shutdown, "a cancelled timer must not fire again after shutdown");

    assert_eq!(process.wait_for_stop().await, 0);
    assert_eq!(iface.disconnect_calls(), 1);
}
