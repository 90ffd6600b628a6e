//! The producer pipeline.
//!
//! One `Pipeline` instance owns all tracking state and runs the full
//! per-frame cycle: clock tick, frame pull, detection, ingestion filter,
//! tracker update, alarm reconciliation, event sampling, broadcast. It is
//! driven by exactly one thread (the session manager's producer thread);
//! `step` is the unit of work and `run` is the daemon loop around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;

use crate::alarm::AlarmSink;
use crate::config::{AssociationKind, MotiondConfig};
use crate::detect::{accept_detections, Detector, LabelMap};
use crate::ingest::LoopingSource;
use crate::track::{
    AlarmCommand, AlarmController, EventSampler, FrameClock, NearestCenterAssociation,
    PositionalAssociation, Tracker,
};
use crate::MotionEvent;

/// Event name on the wire.
pub const OBJECT_DATA_EVENT: &str = "object_data";

/// Outbound event channel. Delivery is fire-and-forget: implementations
/// must not block the producer, and delivery failures are theirs to
/// swallow and log.
pub trait EventBroadcast: Send {
    fn broadcast(&self, event: &str, data: &MotionEvent);
}

pub struct Pipeline {
    clock: FrameClock,
    source: LoopingSource,
    detector: Box<dyn Detector>,
    tracker: Tracker,
    alarm_controller: AlarmController,
    alarm: Box<dyn AlarmSink>,
    sampler: EventSampler,
    labels: LabelMap,
    broadcaster: Box<dyn EventBroadcast>,
    confidence_threshold: f32,
    frame_interval: Duration,
}

impl Pipeline {
    pub fn new(
        cfg: &MotiondConfig,
        source: LoopingSource,
        detector: Box<dyn Detector>,
        labels: LabelMap,
        alarm: Box<dyn AlarmSink>,
        broadcaster: Box<dyn EventBroadcast>,
    ) -> Self {
        let association: Box<dyn crate::track::AssociationStrategy> =
            match cfg.tracking.association {
                AssociationKind::Positional => Box::new(PositionalAssociation),
                AssociationKind::NearestCenter => Box::new(NearestCenterAssociation),
            };
        Self {
            clock: FrameClock::new(),
            source,
            detector,
            tracker: Tracker::new(
                association,
                cfg.tracking.movement_threshold,
                cfg.tracking.stop_alarm_threshold,
            ),
            alarm_controller: AlarmController::new(cfg.alarm.retrigger),
            alarm,
            sampler: EventSampler::new(cfg.tracking.sample_interval),
            labels,
            broadcaster,
            confidence_threshold: cfg.confidence_threshold,
            frame_interval: Duration::from_millis(1000 / u64::from(cfg.source.target_fps.max(1))),
        }
    }

    /// Process one frame tick. Returns the number of events broadcast.
    pub fn step(&mut self) -> Result<usize> {
        let tick = self.clock.tick();
        let frame = self.source.next_frame()?;

        let raw = match self.detector.detect(&frame) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("detector failed on frame {}: {}", tick.frame_count, e);
                return Ok(0);
            }
        };
        let detections = accept_detections(raw, self.confidence_threshold);

        let tracked = self.tracker.update(&detections, tick.time_diff);

        // Alarm device failures are logged here and do not touch tracking
        // or emission.
        match self.alarm_controller.reconcile(self.tracker.states()) {
            AlarmCommand::Start => {
                if let Err(e) = self.alarm.start_alarm() {
                    log::warn!("alarm start failed: {}", e);
                }
            }
            AlarmCommand::Stop => {
                if let Err(e) = self.alarm.stop_alarm() {
                    log::warn!("alarm stop failed: {}", e);
                }
            }
            AlarmCommand::None => {}
        }

        let events = self
            .sampler
            .maybe_emit(tick.frame_count, &tracked, &self.labels);
        for event in &events {
            self.broadcaster.broadcast(OBJECT_DATA_EVENT, event);
        }
        Ok(events.len())
    }

    /// Run until `stop` is set. Each iteration yields after its event
    /// batch so connection handling is never starved, and paces itself to
    /// the source's target frame rate.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!(
            "producer loop started (pacing {} ms/frame)",
            self.frame_interval.as_millis()
        );
        while !stop.load(Ordering::SeqCst) {
            if let Err(e) = self.step() {
                log::error!("frame tick failed: {}", e);
            }
            std::thread::yield_now();
            std::thread::sleep(self.frame_interval);
        }
        self.release();
        log::info!(
            "producer loop stopped after {} frames",
            self.clock.frames_processed()
        );
    }

    /// Shutdown path: make sure the alarm device is not left sounding.
    fn release(&mut self) {
        if self.alarm_controller.is_active() {
            if let Err(e) = self.alarm.stop_alarm() {
                log::warn!("alarm stop on shutdown failed: {}", e);
            }
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.clock.frames_processed()
    }
}
