use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::SourceConfig;

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:5001";
const DEFAULT_SOURCE_PATH: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;
const DEFAULT_MOVEMENT_THRESHOLD: f64 = 2.0;
const DEFAULT_STOP_ALARM_THRESHOLD: u32 = 8;
const DEFAULT_SAMPLE_INTERVAL: u64 = 20;

#[derive(Debug, Deserialize, Default)]
struct MotiondConfigFile {
    server: Option<ServerConfigFile>,
    source: Option<SourceConfigFile>,
    labels: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    tracking: Option<TrackingConfigFile>,
    alarm: Option<AlarmConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    movement_threshold: Option<f64>,
    stop_alarm_threshold: Option<u32>,
    sample_interval: Option<u64>,
    association: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmConfigFile {
    retrigger: Option<bool>,
    command: Option<String>,
}

/// Which association strategy pairs detections with previous slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AssociationKind {
    #[default]
    Positional,
    NearestCenter,
}

impl AssociationKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "nearest-center" | "nearest_center" => Ok(Self::NearestCenter),
            other => Err(anyhow!(
                "unknown association strategy '{}' (expected positional or nearest-center)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotiondConfig {
    pub server_addr: String,
    pub source: SourceConfig,
    pub labels_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub tracking: TrackingSettings,
    pub alarm: AlarmSettings,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Center displacement (pixels) above which a slot counts as moving.
    pub movement_threshold: f64,
    /// Consecutive stopped ticks before the alarm is requested.
    pub stop_alarm_threshold: u32,
    /// Emit events every N-th frame tick.
    pub sample_interval: u64,
    pub association: AssociationKind,
}

#[derive(Debug, Clone, Default)]
pub struct AlarmSettings {
    /// Reissue the start side effect every tick while stopped-and-over-
    /// threshold, instead of once per transition.
    pub retrigger: bool,
    /// Player command to run while the alarm is active; log-only when
    /// absent.
    pub command: Option<String>,
}

impl MotiondConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTIOND_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MotiondConfigFile) -> Result<Self> {
        let server_addr = file
            .server
            .and_then(|server| server.addr)
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());
        let source = SourceConfig {
            path: file
                .source
                .as_ref()
                .and_then(|source| source.path.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
        };
        let confidence_threshold = file
            .detector
            .and_then(|detector| detector.confidence_threshold)
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        let tracking = TrackingSettings {
            movement_threshold: file
                .tracking
                .as_ref()
                .and_then(|tracking| tracking.movement_threshold)
                .unwrap_or(DEFAULT_MOVEMENT_THRESHOLD),
            stop_alarm_threshold: file
                .tracking
                .as_ref()
                .and_then(|tracking| tracking.stop_alarm_threshold)
                .unwrap_or(DEFAULT_STOP_ALARM_THRESHOLD),
            sample_interval: file
                .tracking
                .as_ref()
                .and_then(|tracking| tracking.sample_interval)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL),
            association: match file.tracking.and_then(|tracking| tracking.association) {
                Some(value) => AssociationKind::parse(&value)?,
                None => AssociationKind::default(),
            },
        };
        let alarm = match file.alarm {
            Some(alarm) => AlarmSettings {
                retrigger: alarm.retrigger.unwrap_or(false),
                command: alarm.command,
            },
            None => AlarmSettings::default(),
        };
        Ok(Self {
            server_addr,
            source,
            labels_path: file.labels,
            confidence_threshold,
            tracking,
            alarm,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("MOTIOND_ADDR") {
            if !addr.trim().is_empty() {
                self.server_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("MOTIOND_SOURCE") {
            if !path.trim().is_empty() {
                self.source.path = path;
            }
        }
        if let Ok(path) = std::env::var("MOTIOND_LABELS") {
            if !path.trim().is_empty() {
                self.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = std::env::var("MOTIOND_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("MOTIOND_CONFIDENCE_THRESHOLD must be a float"))?;
        }
        if let Ok(value) = std::env::var("MOTIOND_MOVEMENT_THRESHOLD") {
            self.tracking.movement_threshold = value
                .parse()
                .map_err(|_| anyhow!("MOTIOND_MOVEMENT_THRESHOLD must be a float"))?;
        }
        if let Ok(value) = std::env::var("MOTIOND_STOP_ALARM_THRESHOLD") {
            self.tracking.stop_alarm_threshold = value
                .parse()
                .map_err(|_| anyhow!("MOTIOND_STOP_ALARM_THRESHOLD must be an integer"))?;
        }
        if let Ok(value) = std::env::var("MOTIOND_SAMPLE_INTERVAL") {
            self.tracking.sample_interval = value
                .parse()
                .map_err(|_| anyhow!("MOTIOND_SAMPLE_INTERVAL must be an integer"))?;
        }
        if let Ok(value) = std::env::var("MOTIOND_ASSOCIATION") {
            if !value.trim().is_empty() {
                self.tracking.association = AssociationKind::parse(&value)?;
            }
        }
        if let Ok(value) = std::env::var("MOTIOND_ALARM_COMMAND") {
            if !value.trim().is_empty() {
                self.alarm.command = Some(value);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be in [0, 1)"));
        }
        if self.tracking.movement_threshold < 0.0 {
            return Err(anyhow!("movement_threshold must be non-negative"));
        }
        if self.tracking.stop_alarm_threshold == 0 {
            return Err(anyhow!("stop_alarm_threshold must be at least 1"));
        }
        if self.tracking.sample_interval == 0 {
            return Err(anyhow!("sample_interval must be at least 1"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be at least 1"));
        }
        Ok(())
    }
}

impl Default for MotiondConfig {
    fn default() -> Self {
        Self::from_file(MotiondConfigFile::default()).expect("defaults are valid")
    }
}

fn read_config_file(path: &Path) -> Result<MotiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let cfg = MotiondConfig::default();
        assert_eq!(cfg.server_addr, DEFAULT_SERVER_ADDR);
        assert_eq!(cfg.source.path, DEFAULT_SOURCE_PATH);
        assert_eq!(cfg.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(cfg.tracking.movement_threshold, DEFAULT_MOVEMENT_THRESHOLD);
        assert_eq!(
            cfg.tracking.stop_alarm_threshold,
            DEFAULT_STOP_ALARM_THRESHOLD
        );
        assert_eq!(cfg.tracking.sample_interval, DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(cfg.tracking.association, AssociationKind::Positional);
        assert!(!cfg.alarm.retrigger);
        assert!(cfg.alarm.command.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn association_kind_parses_both_strategies() {
        assert_eq!(
            AssociationKind::parse("positional").expect("parse"),
            AssociationKind::Positional
        );
        assert_eq!(
            AssociationKind::parse("nearest-center").expect("parse"),
            AssociationKind::NearestCenter
        );
        assert!(AssociationKind::parse("kalman").is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut cfg = MotiondConfig::default();
        cfg.confidence_threshold = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = MotiondConfig::default();
        cfg.tracking.sample_interval = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MotiondConfig::default();
        cfg.tracking.stop_alarm_threshold = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MotiondConfig::default();
        cfg.tracking.movement_threshold = -1.0;
        assert!(cfg.validate().is_err());
    }
}
