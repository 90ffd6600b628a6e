//! Session manager and TCP transport behavior.

use std::io::BufRead;
use std::net::TcpStream;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use motion_relay::config::MotiondConfig;
use motion_relay::{
    BoundingBox, Detection, EventServer, LabelMap, LogAlarm, LoopingSource, MotionEvent, Pipeline,
    ScriptedDetector, ServerConfig, SessionManager, SourceConfig, SubscriberRegistry,
    SyntheticSource, TcpBroadcaster,
};

fn parked_person() -> Detection {
    Detection {
        bbox: BoundingBox::new(90, 90, 110, 110),
        class_id: 0,
        confidence: 0.9,
    }
}

/// Session, registry, and an installed pipeline that emits one event per
/// frame at ~200 fps.
fn build_session() -> (Arc<SessionManager>, Arc<SubscriberRegistry>) {
    let mut cfg = MotiondConfig::default();
    cfg.confidence_threshold = 0.5;
    cfg.tracking.sample_interval = 1;
    cfg.source.target_fps = 200;

    let stop = Arc::new(AtomicBool::new(false));
    let session = Arc::new(SessionManager::new(stop));
    let registry = Arc::new(SubscriberRegistry::new(Arc::downgrade(&session)));

    let source = LoopingSource::new(Box::new(SyntheticSource::new(SourceConfig::default())));
    let pipeline = Pipeline::new(
        &cfg,
        source,
        Box::new(ScriptedDetector::new(vec![vec![parked_person()]])),
        LabelMap::parse("person\n"),
        Box::new(LogAlarm),
        Box::new(TcpBroadcaster::new(registry.clone())),
    );
    session.install_pipeline(pipeline);
    (session, registry)
}

#[test]
fn concurrent_first_connections_start_exactly_one_loop() {
    let (session, _registry) = build_session();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        handles.push(std::thread::spawn(move || session.on_subscriber_connect()));
    }
    let started: usize = handles
        .into_iter()
        .map(|h| h.join().expect("join") as usize)
        .sum();

    assert_eq!(started, 1);
    assert!(session.started());
    assert_eq!(session.subscriber_count(), 8);

    session.shutdown().expect("shutdown");
}

#[test]
fn disconnects_do_not_stop_the_loop() {
    let (session, _registry) = build_session();

    assert!(session.on_subscriber_connect());
    session.on_subscriber_disconnect();
    assert_eq!(session.subscriber_count(), 0);
    assert!(session.started());

    // A later connection must not spawn a second loop.
    assert!(!session.on_subscriber_connect());

    session.shutdown().expect("shutdown");
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    data: MotionEvent,
}

#[test]
fn subscriber_receives_object_data_events_over_tcp() {
    let (session, registry) = build_session();

    let server = EventServer::new(ServerConfig {
        addr: "127.0.0.1:0".to_string(),
    });
    let handle = server.spawn(session.clone(), registry).expect("spawn");

    let client = TcpStream::connect(handle.addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("read timeout");

    let mut reader = std::io::BufReader::new(client);
    let mut line = String::new();
    reader.read_line(&mut line).expect("read event line");

    let envelope: Envelope = serde_json::from_str(&line).expect("parse envelope");
    assert_eq!(envelope.event, "object_data");
    assert_eq!(envelope.data.kind, "person");
    assert_eq!(envelope.data.position.x, 100);
    assert_eq!(envelope.data.position.y, 100);

    drop(reader);
    handle.stop().expect("server stop");
    session.shutdown().expect("session shutdown");
}
