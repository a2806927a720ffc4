//! End-to-end flows through a full runtime with in-memory collaborators.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use vany_bus::{
    decode, BusClient, Capability, MessageHeader, MessageType, SessionId, Subscription,
};
use vany_gateway::{OutboundFrame, SessionReceiver};
use vany_node::{BasicNode, Node, NodeConfig};
use vany_runtime::{RuntimeConfig, VanyRuntime};
use vany_workers::{DeviceScanner, DiscoveredDevice, InMemoryTelemetrySink, ScanError};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn frames_until(rx: &mut SessionReceiver, want: usize, timeout: Duration) -> Vec<OutboundFrame> {
    let mut frames = Vec::new();
    wait_until(timeout, || {
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames.len() >= want
    });
    frames
}

fn response_body(frame: &OutboundFrame) -> (MessageHeader, Value) {
    serde_json::from_str(&frame.payload).unwrap()
}

struct OneDevice;

impl DeviceScanner for OneDevice {
    fn scan(&mut self, _duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        Ok(vec![DiscoveredDevice::new("AA:BB", Some(-60), Some("Device1".into()))])
    }
}

fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        request_timeout: None,
        sample_interval: Duration::from_millis(20),
        ..RuntimeConfig::default()
    }
}

fn start() -> VanyRuntime {
    VanyRuntime::start_with(&test_config(), InMemoryTelemetrySink::new(), OneDevice).unwrap()
}

fn find_request(sub: &mut Subscription, kind: Capability) -> Option<vany_bus::Message> {
    let mut found = None;
    wait_until(Duration::from_secs(2), || {
        for bytes in sub.drain().unwrap() {
            if let Ok(message) = decode(&bytes) {
                if message.kind == MessageType::Request(kind) {
                    found = Some(message);
                }
            }
        }
        found.is_some()
    });
    found
}

#[test]
fn test_btscan_reaches_only_requesting_session() {
    let runtime = start();
    let mut tap = runtime.bus().subscribe("vany").unwrap();
    let (s1, mut rx1) = runtime.sessions().open_session();
    let (_s2, mut rx2) = runtime.sessions().open_session();

    runtime
        .gateway()
        .enqueue_request("BluetoothScanner", "btscan", json!({"time": 1}), Some(s1.clone()))
        .unwrap();

    let request = find_request(&mut tap, Capability::BtScan).expect("request on bus");
    assert_eq!(request.sid.as_ref(), Some(&s1));

    let frames = frames_until(&mut rx1, 1, Duration::from_secs(2));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "btscan_response");

    let (header, data) = response_body(&frames[0]);
    assert_eq!(header.hash, request.hash);
    assert_eq!(header.from, "BluetoothScanner");
    assert_eq!(
        data,
        json!({"discovered_devices": [{"addr": "AA:BB", "rssi": -60, "name": "Device1"}]})
    );

    std::thread::sleep(Duration::from_millis(50));
    assert!(rx2.try_recv().is_err());

    runtime.shutdown().unwrap();
}

#[test]
fn test_hello_fans_in_from_every_node() {
    let runtime = start();
    let extra = Node::spawn(BasicNode::new("Extra"), runtime.bus(), NodeConfig::default()).unwrap();
    let (_sid, mut rx) = runtime.sessions().open_session();

    runtime
        .gateway()
        .enqueue_request("All", Capability::Hello, json!({}), Some(SessionId::new("ignored")))
        .unwrap();

    let frames = frames_until(&mut rx, 4, Duration::from_secs(2));
    let mut senders: Vec<String> = frames
        .iter()
        .filter(|f| f.event == "hello_response")
        .map(|f| response_body(f).0.from)
        .collect();
    senders.sort();
    assert_eq!(
        senders,
        vec!["BluetoothScanner", "Extra", "Gateway", "TeslaBattery"]
    );

    extra.join().unwrap();
    runtime.shutdown().unwrap();
}

#[test]
fn test_voltage_after_sampling() {
    let runtime = start();
    let (sid, mut rx) = runtime.sessions().open_session();

    std::thread::sleep(Duration::from_millis(60));
    runtime
        .gateway()
        .enqueue_request("TeslaBattery", "voltage", Value::Null, Some(sid))
        .unwrap();

    let frames = frames_until(&mut rx, 1, Duration::from_secs(2));
    assert_eq!(frames[0].event, "voltage_response");
    let (_, data) = response_body(&frames[0]);
    let volts = data["volts"].as_f64().unwrap();
    assert!((9.0..=11.0).contains(&volts));

    runtime.shutdown().unwrap();
}

#[test]
fn test_malformed_bus_traffic_does_not_stop_nodes() {
    let runtime = start();
    let bus = runtime.bus();
    bus.publish("vany", bytes::Bytes::from_static(b"not json")).unwrap();
    bus.publish("vany", bytes::Bytes::from_static(b"")).unwrap();

    let (sid, mut rx) = runtime.sessions().open_session();
    runtime
        .gateway()
        .enqueue_request("BluetoothScanner", "btscan", json!({}), Some(sid))
        .unwrap();

    let frames = frames_until(&mut rx, 1, Duration::from_secs(2));
    assert_eq!(frames[0].event, "btscan_response");
    assert!(wait_until(Duration::from_secs(2), || runtime
        .nodes()
        .iter()
        .all(|n| n.stats().decode_failures >= 2)));

    runtime.shutdown().unwrap();
}

#[test]
fn test_shutdown_stops_all_nodes() {
    let runtime = start();
    let bus = runtime.bus();
    let gateway = runtime.gateway();
    assert_eq!(runtime.nodes().len(), 3);

    runtime.shutdown().unwrap();

    assert!(bus.is_closed());
    assert!(gateway
        .enqueue_request("All", Capability::Hello, json!({}), None)
        .is_err());
}

#[test]
fn test_start_writes_telemetry_to_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = RuntimeConfig {
        data_dir: dir.path().to_path_buf(),
        ..test_config()
    };
    let runtime = VanyRuntime::start(&config).unwrap();

    let log = dir.path().join("TeslaBattery.jsonl");
    assert!(wait_until(Duration::from_secs(2), || {
        std::fs::read_to_string(&log)
            .map(|s| s.lines().count() >= 1)
            .unwrap_or(false)
    }));

    runtime.shutdown().unwrap();
}
