//! Frame ingestion sources.
//!
//! Frame acquisition is a boundary concern: the pipeline consumes an
//! effectively infinite sequence of frames and treats "no frame available"
//! as end-of-stream, never as an error. The restart-from-the-beginning
//! policy for finite sources lives here, in `LoopingSource`, not in the
//! pipeline.
//!
//! Sources:
//! - `SyntheticSource` (`stub://` paths): deterministic generated frames
//!   for development and tests.
//!
//! Real video decode (files, RTSP, V4L2) is an external collaborator; a
//! deployment wires its own `FrameSource` implementation.

mod synthetic;

pub use synthetic::SyntheticSource;

use anyhow::{anyhow, Result};

/// One frame of raw pixel data handed to the detector.
#[derive(Clone, Debug)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Configuration for a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Source path. `stub://<name>` selects the synthetic source.
    pub path: String,
    /// Target frame rate; the pipeline paces itself to this.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "stub://camera".to_string(),
            target_fps: 10,
        }
    }
}

/// A sequence of frames. `next_frame` returning `Ok(None)` means the
/// source reached its end; `rewind` restarts it from the beginning.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
    fn rewind(&mut self) -> Result<()>;
    /// Frames produced since the source was opened (not reset by rewind).
    fn frames_captured(&self) -> u64;
}

/// Build a source from config. Only `stub://` paths are recognized here;
/// anything else must be wired by the host as its own `FrameSource`.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.path.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.clone())));
    }
    Err(anyhow!(
        "unsupported frame source path '{}' (expected stub://)",
        config.path
    ))
}

/// Boundary wrapper implementing the loop-forever policy: on end of
/// stream the inner source is rewound and read again.
pub struct LoopingSource {
    inner: Box<dyn FrameSource>,
}

impl LoopingSource {
    pub fn new(inner: Box<dyn FrameSource>) -> Self {
        Self { inner }
    }

    /// Pull the next frame, restarting the source at end of stream.
    ///
    /// A source that stays empty across two consecutive rewinds is
    /// reported as an error rather than spun on forever.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let mut rewinds = 0u32;
        loop {
            match self.inner.next_frame()? {
                Some(frame) => return Ok(frame),
                None => {
                    if rewinds >= 2 {
                        return Err(anyhow!("frame source produced no frames after rewind"));
                    }
                    log::info!("frame source reached end of stream, rewinding");
                    self.inner.rewind()?;
                    rewinds += 1;
                }
            }
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.inner.frames_captured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finite source: yields `remaining` frames, then end-of-stream until
    /// rewound.
    struct FiniteSource {
        len: u64,
        cursor: u64,
        captured: u64,
    }

    impl FiniteSource {
        fn new(len: u64) -> Self {
            Self {
                len,
                cursor: 0,
                captured: 0,
            }
        }
    }

    impl FrameSource for FiniteSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.cursor >= self.len {
                return Ok(None);
            }
            self.cursor += 1;
            self.captured += 1;
            Ok(Some(Frame {
                pixels: vec![0u8; 4],
                width: 2,
                height: 2,
            }))
        }

        fn rewind(&mut self) -> Result<()> {
            self.cursor = 0;
            Ok(())
        }

        fn frames_captured(&self) -> u64 {
            self.captured
        }
    }

    #[test]
    fn looping_source_restarts_at_end_of_stream() {
        let mut source = LoopingSource::new(Box::new(FiniteSource::new(2)));

        for _ in 0..7 {
            source.next_frame().expect("frame");
        }
        assert_eq!(source.frames_captured(), 7);
    }

    #[test]
    fn looping_source_rejects_empty_source() {
        let mut source = LoopingSource::new(Box::new(FiniteSource::new(0)));

        let err = source.next_frame().unwrap_err();
        assert!(format!("{err}").contains("no frames"));
    }

    #[test]
    fn open_source_rejects_unknown_paths() {
        let config = SourceConfig {
            path: "rtsp://camera-1".to_string(),
            target_fps: 10,
        };
        assert!(open_source(&config).is_err());

        let config = SourceConfig::default();
        assert!(open_source(&config).is_ok());
    }
}
