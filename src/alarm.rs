//! Alarm device boundary.
//!
//! The audible alarm is an opaque external effect with two operations.
//! Device failures are the caller's to log; they must never affect
//! tracking or event emission.

use std::process::{Child, Command};

use anyhow::{anyhow, Context, Result};

pub trait AlarmSink: Send {
    fn start_alarm(&mut self) -> Result<()>;
    fn stop_alarm(&mut self) -> Result<()>;
}

/// Log-only sink, the default when no alarm command is configured.
pub struct LogAlarm;

impl AlarmSink for LogAlarm {
    fn start_alarm(&mut self) -> Result<()> {
        log::warn!("ALARM START (no alarm command configured)");
        Ok(())
    }

    fn stop_alarm(&mut self) -> Result<()> {
        log::info!("alarm stop");
        Ok(())
    }
}

/// Runs a configured player command (e.g. `aplay alarm.wav`) while the
/// alarm is active and kills it on stop. Whitespace-split, no shell.
pub struct CommandAlarm {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandAlarm {
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("alarm command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            child: None,
        })
    }
}

impl AlarmSink for CommandAlarm {
    fn start_alarm(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            // Still playing from a previous start (retrigger mode).
            if child.try_wait()?.is_none() {
                return Ok(());
            }
            self.child = None;
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .with_context(|| format!("failed to spawn alarm command '{}'", self.program))?;
        self.child = Some(child);
        Ok(())
    }

    fn stop_alarm(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill().context("failed to kill alarm command")?;
            }
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for CommandAlarm {
    fn drop(&mut self) {
        let _ = self.stop_alarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_alarm_rejects_empty_command() {
        assert!(CommandAlarm::new("   ").is_err());
    }

    #[test]
    fn command_alarm_splits_program_and_args() {
        let alarm = CommandAlarm::new("aplay -q alarm.wav").expect("parse");
        assert_eq!(alarm.program, "aplay");
        assert_eq!(alarm.args, vec!["-q", "alarm.wav"]);
    }

    #[test]
    fn command_alarm_start_stop_round_trip() {
        let mut alarm = CommandAlarm::new("sleep 30").expect("parse");
        alarm.start_alarm().expect("start");
        assert!(alarm.child.is_some());
        alarm.stop_alarm().expect("stop");
        assert!(alarm.child.is_none());
    }

    #[test]
    fn log_alarm_is_infallible() {
        let mut alarm = LogAlarm;
        assert!(alarm.start_alarm().is_ok());
        assert!(alarm.stop_alarm().is_ok());
    }
}
