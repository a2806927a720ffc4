//! Run-loop behaviour against an in-memory bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::json;
use vany_bus::{
    decode, encode, BusClient, BusError, Capability, InMemoryBus, Message, MessageType,
    Subscription,
};
use vany_node::{
    Actor, BasicNode, DispatchTable, HandlerError, Node, NodeConfig, NodeContext, NodeError,
    NodeState,
};

const TOPIC: &str = "vany";

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn publish(bus: &InMemoryBus, message: &Message) {
    bus.publish(TOPIC, encode(message).unwrap()).unwrap();
}

fn collect(sub: &mut Subscription, kind: &str, want: usize) -> Vec<Message> {
    let mut seen = Vec::new();
    wait_until(Duration::from_secs(2), || {
        for payload in sub.drain().unwrap() {
            let msg = decode(&payload).unwrap();
            if msg.kind.to_string() == kind {
                seen.push(msg);
            }
        }
        seen.len() >= want
    });
    seen
}

/// Counts `voltage` requests; fails or panics on request.
struct Meter {
    hits: Arc<AtomicUsize>,
    ticks: Arc<AtomicUsize>,
    observed: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl Meter {
    fn new() -> Self {
        Self {
            hits: Arc::default(),
            ticks: Arc::default(),
            observed: Arc::default(),
            stopped: Arc::default(),
        }
    }

    fn on_voltage(&mut self, message: &Message, _ctx: &NodeContext) -> Result<(), HandlerError> {
        if message.data.get("fail").is_some() {
            return Err(HandlerError::InvalidData("asked to fail".into()));
        }
        if message.data.get("panic").is_some() {
            panic!("asked to panic");
        }
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Actor for Meter {
    fn name(&self) -> &str {
        "Meter"
    }

    fn register(table: &mut DispatchTable<Self>) {
        table.register(Capability::Voltage, Meter::on_voltage);
    }

    fn on_message(&mut self, _message: &Message, _ctx: &NodeContext) {
        self.observed.fetch_add(1, Ordering::SeqCst);
    }

    fn tick(&mut self, _ctx: &NodeContext) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stop(&mut self, _ctx: &NodeContext) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_hello_elicits_one_response_per_node() {
    let bus = Arc::new(InMemoryBus::new());
    let mut probe = bus.subscribe(TOPIC).unwrap();

    let handles: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| Node::spawn(BasicNode::new(name), bus.clone(), NodeConfig::default()).unwrap())
        .collect();

    let request = Message::broadcast("Probe", Capability::Hello, json!({}));
    publish(&bus, &request);

    let responses = collect(&mut probe, "hello_response", 3);
    assert_eq!(responses.len(), 3);
    for response in &responses {
        assert_eq!(response.hash, request.hash);
        assert_eq!(response.sid, None);
        assert_eq!(response.to, "Probe");
        assert_eq!(response.data, json!({}));
    }
    let mut senders: Vec<_> = responses.iter().map(|r| r.from.clone()).collect();
    senders.sort();
    assert_eq!(senders, vec!["A", "B", "C"]);

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_dispatch_is_selective() {
    let bus = Arc::new(InMemoryBus::new());
    let meter = Meter::new();
    let hits = meter.hits.clone();
    let observed = meter.observed.clone();
    let handle = Node::spawn(meter, bus.clone(), NodeConfig::default()).unwrap();

    for kind in ["btscan", "voltage_response", "Voltage", "custom"] {
        publish(&bus, &Message::broadcast("Probe", MessageType::from(kind), json!({})));
    }
    publish(&bus, &Message::broadcast("Probe", Capability::Voltage, json!({})));

    assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
    assert!(wait_until(Duration::from_secs(2), || observed.load(Ordering::SeqCst) == 5));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(handle.stats().dispatched, 1);

    handle.join().unwrap();
}

#[test]
fn test_malformed_payload_does_not_stop_dispatch() {
    let bus = Arc::new(InMemoryBus::new());
    let meter = Meter::new();
    let hits = meter.hits.clone();
    let handle = Node::spawn(meter, bus.clone(), NodeConfig::default()).unwrap();

    bus.publish(TOPIC, Bytes::from_static(b"{not json")).unwrap();
    bus.publish(TOPIC, Bytes::from_static(b"[{\"version\":1}]")).unwrap();
    bus.publish(TOPIC, Bytes::new()).unwrap();
    publish(&bus, &Message::broadcast("Probe", Capability::Voltage, json!({})));

    assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
    assert_eq!(handle.stats().decode_failures, 3);
    assert_eq!(handle.state(), NodeState::Running);

    handle.join().unwrap();
}

#[test]
fn test_handler_failure_and_panic_are_absorbed() {
    let bus = Arc::new(InMemoryBus::new());
    let meter = Meter::new();
    let hits = meter.hits.clone();
    let handle = Node::spawn(meter, bus.clone(), NodeConfig::default()).unwrap();

    publish(&bus, &Message::broadcast("Probe", Capability::Voltage, json!({"fail": true})));
    publish(&bus, &Message::broadcast("Probe", Capability::Voltage, json!({"panic": true})));
    publish(&bus, &Message::broadcast("Probe", Capability::Voltage, json!({})));

    assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
    assert_eq!(handle.stats().handler_failures, 2);
    assert_eq!(handle.state(), NodeState::Running);

    handle.join().unwrap();
}

#[test]
fn test_lifecycle_and_hooks() {
    let bus = Arc::new(InMemoryBus::new());
    let meter = Meter::new();
    let ticks = meter.ticks.clone();
    let stopped = meter.stopped.clone();

    let config = NodeConfig::default().poll_interval(Duration::from_millis(2));
    let handle = Node::spawn(meter, bus.clone(), config).unwrap();
    assert_eq!(handle.name(), "Meter");
    assert_eq!(handle.state(), NodeState::Running);
    assert_eq!(bus.subscriber_count(TOPIC), 1);

    assert!(wait_until(Duration::from_secs(2), || ticks.load(Ordering::SeqCst) >= 3));

    handle.stop();
    assert!(wait_until(Duration::from_secs(2), || handle.state() == NodeState::Stopped));
    assert!(wait_until(Duration::from_secs(2), || handle.is_finished()));
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(TOPIC), 0);

    handle.join().unwrap();
}

#[test]
fn test_closed_bus_is_fatal_at_spawn() {
    let bus = Arc::new(InMemoryBus::new());
    bus.close();

    let err = Node::spawn(BasicNode::new("A"), bus, NodeConfig::default()).unwrap_err();
    assert!(matches!(err, NodeError::BusConnect(BusError::Closed)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let bus = Arc::new(InMemoryBus::new());
    let err = Node::spawn(BasicNode::new("A"), bus.clone(), NodeConfig::with_topic("")).unwrap_err();
    assert!(matches!(err, NodeError::Config(_)));
    assert_eq!(bus.subscriber_count(""), 0);
}

#[test]
fn test_node_stops_when_bus_closes() {
    let bus = Arc::new(InMemoryBus::new());
    let handle = Node::spawn(BasicNode::new("A"), bus.clone(), NodeConfig::default()).unwrap();

    bus.close();
    assert!(wait_until(Duration::from_secs(2), || handle.state() == NodeState::Stopped));
    handle.join().unwrap();
}

#[test]
fn test_node_sees_its_own_hello() {
    let bus = Arc::new(InMemoryBus::new());
    let mut probe = bus.subscribe(TOPIC).unwrap();
    let handle = Node::spawn(BasicNode::new("Solo"), bus.clone(), NodeConfig::default()).unwrap();

    // A node publishing hello on the shared topic answers itself too.
    let ctx = NodeContext::new("Solo", TOPIC, bus.clone());
    let request = Message::broadcast("Solo", Capability::Hello, json!({}));
    ctx.publish(&request).unwrap();

    let responses = collect(&mut probe, "hello_response", 1);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].from, "Solo");
    assert_eq!(responses[0].hash, request.hash);

    handle.join().unwrap();
}
