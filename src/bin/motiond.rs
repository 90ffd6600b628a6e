//! motiond - object tracking and motion event daemon
//!
//! This daemon:
//! 1. Pulls frames from the configured source (looping at end of stream)
//! 2. Runs the detection backend and filters malformed detections
//! 3. Tracks detections across frames and classifies motion
//! 4. Drives the alarm device when a tracked object stays stopped
//! 5. Samples motion events and broadcasts them to TCP subscribers
//!
//! The producer loop starts lazily on the first subscriber connection and
//! runs until the process is stopped.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use motion_relay::config::MotiondConfig;
use motion_relay::{
    AlarmSink, CommandAlarm, Detector, EventServer, LabelMap, LogAlarm, LoopingSource, Pipeline,
    ServerConfig, SessionManager, StubDetector, SubscriberRegistry, TcpBroadcaster,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Object tracking and motion event daemon")]
struct Args {
    /// Bind address for the event server.
    #[arg(long, env = "MOTIOND_ADDR")]
    addr: Option<String>,

    /// Frame source path (stub://<name> selects the synthetic source).
    #[arg(long, env = "MOTIOND_SOURCE")]
    source: Option<String>,

    /// Label map file, one label per line.
    #[arg(long, env = "MOTIOND_LABELS")]
    labels: Option<PathBuf>,

    /// Minimum confidence threshold for accepting detections.
    #[arg(long, env = "MOTIOND_CONFIDENCE_THRESHOLD")]
    threshold: Option<f32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Config file and env first, CLI flags last.
    let mut cfg = MotiondConfig::load()?;
    if let Some(addr) = args.addr {
        cfg.server_addr = addr;
    }
    if let Some(source) = args.source {
        cfg.source.path = source;
    }
    if let Some(labels) = args.labels {
        cfg.labels_path = Some(labels);
    }
    if let Some(threshold) = args.threshold {
        cfg.confidence_threshold = threshold;
    }
    cfg.validate()?;

    let labels = match &cfg.labels_path {
        Some(path) => LabelMap::load(path)?,
        None => {
            log::warn!("no label file configured; events carry generic labels");
            LabelMap::default()
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let session = Arc::new(SessionManager::new(stop));
    let registry = Arc::new(SubscriberRegistry::new(Arc::downgrade(&session)));

    let source = LoopingSource::new(motion_relay::ingest::open_source(&cfg.source)?);
    let detector: Box<dyn Detector> = Box::new(StubDetector::new());
    let alarm: Box<dyn AlarmSink> = match &cfg.alarm.command {
        Some(command) => Box::new(CommandAlarm::new(command)?),
        None => Box::new(LogAlarm),
    };
    let broadcaster = TcpBroadcaster::new(registry.clone());

    let pipeline = Pipeline::new(
        &cfg,
        source,
        detector,
        labels,
        alarm,
        Box::new(broadcaster),
    );
    session.install_pipeline(pipeline);

    let server = EventServer::new(ServerConfig {
        addr: cfg.server_addr.clone(),
    });
    let handle = server.spawn(session.clone(), registry)?;

    log::info!("motiond running; event server listening on {}", handle.addr);
    log::info!(
        "source={} fps={} confidence_threshold={} movement_threshold={} stop_alarm_threshold={} sample_interval={}",
        cfg.source.path,
        cfg.source.target_fps,
        cfg.confidence_threshold,
        cfg.tracking.movement_threshold,
        cfg.tracking.stop_alarm_threshold,
        cfg.tracking.sample_interval
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })?;

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    handle.stop()?;
    session.shutdown()?;
    Ok(())
}
