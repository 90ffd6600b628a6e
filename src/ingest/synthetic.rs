//! Synthetic frame source for `stub://` paths.
//!
//! Generates small deterministic frames so the daemon and tests can run
//! without a camera or video file. The scene shifts every 50 frames to
//! give downstream motion detection something to chew on.

use anyhow::Result;

use super::{Frame, FrameSource, SourceConfig};

const STUB_WIDTH: u32 = 640;
const STUB_HEIGHT: u32 = 480;

pub struct SyntheticSource {
    path: String,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        log::info!("SyntheticSource: opened {}", config.path);
        Self {
            path: config.path,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (STUB_WIDTH * STUB_HEIGHT * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(Frame {
            pixels,
            width: STUB_WIDTH,
            height: STUB_HEIGHT,
        }))
    }

    fn rewind(&mut self) -> Result<()> {
        // The synthetic stream never ends, but honor the contract.
        log::debug!("SyntheticSource: rewind {}", self.path);
        self.scene_state = 0;
        Ok(())
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_never_ends() {
        let mut source = SyntheticSource::new(SourceConfig::default());
        for _ in 0..3 {
            let frame = source.next_frame().expect("frame").expect("some frame");
            assert_eq!(frame.width, STUB_WIDTH);
            assert_eq!(frame.pixels.len(), (STUB_WIDTH * STUB_HEIGHT * 3) as usize);
        }
        assert_eq!(source.frames_captured(), 3);
    }
}
