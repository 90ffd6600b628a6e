//! Event transport and session management.
//!
//! Subscribers are plain TCP connections; each event is one
//! newline-delimited JSON envelope `{"event": ..., "data": ...}`. The
//! producer never blocks on delivery: writes carry a short timeout and a
//! failed subscriber is dropped, not retried.
//!
//! `SessionManager` guarantees exactly one producer loop per process
//! lifetime: the first subscriber connection starts it through an atomic
//! check-and-set, later connections and disconnections leave it alone,
//! and it keeps tracking with zero subscribers.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::pipeline::{EventBroadcast, Pipeline};
use crate::MotionEvent;

const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_millis(50);
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// -------------------- Session manager --------------------

pub struct SessionManager {
    started: AtomicBool,
    subscriber_count: AtomicUsize,
    pipeline: Mutex<Option<Pipeline>>,
    stop: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            started: AtomicBool::new(false),
            subscriber_count: AtomicUsize::new(0),
            pipeline: Mutex::new(None),
            stop,
            join: Mutex::new(None),
        }
    }

    /// Hand the session its pipeline. Must happen before the first
    /// subscriber connects.
    pub fn install_pipeline(&self, pipeline: Pipeline) {
        *self.pipeline.lock().expect("pipeline lock poisoned") = Some(pipeline);
    }

    /// First connection wins the check-and-set and spawns the producer
    /// thread; every other call is bookkeeping only. Returns whether this
    /// call started the loop.
    pub fn on_subscriber_connect(&self) -> bool {
        let subscribers = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("subscriber connected ({} active)", subscribers);

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let Some(mut pipeline) = self.pipeline.lock().expect("pipeline lock poisoned").take()
        else {
            log::error!("no pipeline installed; producer loop not started");
            return false;
        };
        let stop = self.stop.clone();
        let join = std::thread::spawn(move || pipeline.run(&stop));
        *self.join.lock().expect("join lock poisoned") = Some(join);
        true
    }

    /// Disconnects never stop the loop; events are simply unconsumed.
    pub fn on_subscriber_disconnect(&self) {
        let before = self.subscriber_count.load(Ordering::SeqCst);
        if before > 0 {
            self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        }
        log::info!(
            "subscriber disconnected ({} active)",
            before.saturating_sub(1)
        );
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }

    /// Stop the producer loop and wait for it. Only the process shutdown
    /// path calls this.
    pub fn shutdown(&self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        let join = self
            .join
            .lock()
            .map_err(|_| anyhow!("join lock poisoned"))?
            .take();
        if let Some(join) = join {
            join.join()
                .map_err(|_| anyhow!("producer thread panicked"))?;
        }
        Ok(())
    }
}

// -------------------- Subscriber registry --------------------

/// Shared list of subscriber connections. The accept loop adds; the
/// broadcast path prunes on write failure.
pub struct SubscriberRegistry {
    streams: Mutex<Vec<TcpStream>>,
    session: Weak<SessionManager>,
}

impl SubscriberRegistry {
    pub fn new(session: Weak<SessionManager>) -> Self {
        Self {
            streams: Mutex::new(Vec::new()),
            session,
        }
    }

    pub fn add(&self, stream: TcpStream) {
        self.streams.lock().expect("streams lock poisoned").push(stream);
    }

    pub fn len(&self) -> usize {
        self.streams.lock().expect("streams lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one line to every subscriber, dropping any that fail.
    pub fn broadcast_line(&self, line: &[u8]) {
        use std::io::Write;

        let mut streams = self.streams.lock().expect("streams lock poisoned");
        let mut dropped = 0usize;
        streams.retain_mut(|stream| match stream.write_all(line) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("dropping subscriber: {}", e);
                dropped += 1;
                false
            }
        });
        drop(streams);

        if dropped > 0 {
            if let Some(session) = self.session.upgrade() {
                for _ in 0..dropped {
                    session.on_subscriber_disconnect();
                }
            }
        }
    }
}

// -------------------- Broadcaster --------------------

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: &'a MotionEvent,
}

/// Fire-and-forget event fan-out over the subscriber registry.
pub struct TcpBroadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl TcpBroadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }
}

impl EventBroadcast for TcpBroadcaster {
    fn broadcast(&self, event: &str, data: &MotionEvent) {
        let envelope = Envelope { event, data };
        let mut line = match serde_json::to_vec(&envelope) {
            Ok(line) => line,
            Err(e) => {
                log::error!("event serialization failed: {}", e);
                return;
            }
        };
        line.push(b'\n');
        self.registry.broadcast_line(&line);
    }
}

// -------------------- Event server --------------------

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5001".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("event server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct EventServer {
    cfg: ServerConfig,
}

impl EventServer {
    pub fn new(cfg: ServerConfig) -> Self {
        Self { cfg }
    }

    pub fn spawn(
        self,
        session: Arc<SessionManager>,
        registry: Arc<SubscriberRegistry>,
    ) -> Result<ServerHandle> {
        let listener = TcpListener::bind(&self.cfg.addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            run_accept_loop(listener, session, registry, shutdown_thread);
        });

        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_accept_loop(
    listener: TcpListener,
    session: Arc<SessionManager>,
    registry: Arc<SubscriberRegistry>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("client connected from {}", peer);
                if let Err(e) = prepare_subscriber(&stream) {
                    log::warn!("rejecting subscriber {}: {}", peer, e);
                    continue;
                }
                registry.add(stream);
                session.on_subscriber_connect();
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("event server accept failed: {}", e);
                break;
            }
        }
    }
}

fn prepare_subscriber(stream: &TcpStream) -> Result<()> {
    // The listener is nonblocking; subscriber writes must instead time
    // out so a slow consumer drops its own events, not the producer.
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(SUBSCRIBER_WRITE_TIMEOUT))?;
    Ok(())
}
