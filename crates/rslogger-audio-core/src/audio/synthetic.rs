use crate::{
    AudioSettings, CoreResult,
    audio::{CaptureChunk, CaptureSource, CaptureStream},
};

use std::{
    f32::consts::TAU,
    time::{Duration, Instant},
};

/// Generates a sine tone in real time instead of reading a device.
///
/// Lets a module run on machines without audio hardware and keeps the
/// timing behaviour of a real stream: blocks are produced at the configured
/// sample rate, not faster.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticCaptureSource {
    frequency: f32,
    block: Duration,
}

impl SyntheticCaptureSource {
    /// 440 Hz tone delivered in 10 ms blocks.
    pub fn new() -> Self {
        Self {
            frequency: 440.0,
            block: Duration::from_millis(10),
        }
    }

    /// Use a different tone frequency.
    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }
}

impl Default for SyntheticCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for SyntheticCaptureSource {
    fn open(&self, settings: &AudioSettings) -> CoreResult<Box<dyn CaptureStream>> {
        settings.validate()?;

        let frames_per_block =
            ((settings.samplerate as f64) * self.block.as_secs_f64()).max(1.0) as usize;

        Ok(Box::new(SineStream {
            phase: 0.0,
            step: TAU * self.frequency / settings.samplerate as f32,
            channels: usize::from(settings.channels),
            frames_per_block,
            block: self.block,
            next_due: Instant::now() + self.block,
        }))
    }
}

struct SineStream {
    phase: f32,
    step: f32,
    channels: usize,
    frames_per_block: usize,
    block: Duration,
    next_due: Instant,
}

impl CaptureStream for SineStream {
    fn next_chunk(&mut self, timeout: Duration) -> CoreResult<CaptureChunk> {
        let now = Instant::now();
        if self.next_due > now {
            let wait = self.next_due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(CaptureChunk::Timeout);
            }
            std::thread::sleep(wait);
        }
        self.next_due += self.block;

        let mut samples = Vec::with_capacity(self.frames_per_block * self.channels);
        for _ in 0..self.frames_per_block {
            let value = 0.25 * self.phase.sin();
            samples.extend(std::iter::repeat_n(value, self.channels));
            self.phase = (self.phase + self.step) % TAU;
        }

        Ok(CaptureChunk::Samples(samples))
    }
}
