// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{info, span, Level as TraceLevel};

use super::{ErrorHandler, FrameSink, StreamFormat};
use crate::error::Error;

/// Amplitude of the constant background noise the mock produces.
pub const NOISE_AMPLITUDE: f32 = 0.001;

/// The signal level of a mock instrument. Shared between the mock audio input
/// and anything that plays the instrument, such as the mock MIDI output.
#[derive(Default)]
pub struct Level(AtomicU32);

impl Level {
    pub fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// A mock device that synthesizes input on a background thread. The signal is
/// a square wave at the current level over a small constant noise floor.
#[derive(Clone)]
pub struct Device {
    name: String,
    format: StreamFormat,
    block_size: u32,
    level: Arc<Level>,
    fail_after: Option<usize>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, format: StreamFormat, block_size: u32) -> Device {
        Device {
            name: name.to_string(),
            format,
            block_size: block_size.max(1),
            level: Arc::new(Level::default()),
            fail_after: None,
        }
    }

    #[cfg(test)]
    /// Fails the stream once this many blocks have been delivered.
    pub fn fail_after(mut self, blocks: usize) -> Device {
        self.fail_after = Some(blocks);
        self
    }

    #[cfg(test)]
    /// The level that drives this device's signal.
    pub fn level(&self) -> Arc<Level> {
        self.level.clone()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) (Mock)",
            self.name, self.format.channels
        )
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(
        &self,
        mut sink: Box<dyn FrameSink>,
        mut on_error: ErrorHandler,
    ) -> Result<Box<dyn super::Stream>, Error> {
        let span = span!(TraceLevel::INFO, "start capture (mock)");
        let _enter = span.enter();

        let stopped = Arc::new(AtomicBool::new(false));
        let format = self.format;
        let frames = self.block_size as usize;
        let level = self.level.clone();
        let fail_after = self.fail_after;
        let block_duration =
            Duration::from_secs_f64(frames as f64 / format.sample_rate.max(1) as f64);

        let join_handle = {
            let stopped = stopped.clone();
            thread::Builder::new()
                .name(format!("{}-capture", self.name))
                .spawn(move || {
                    let mut block = Vec::with_capacity(frames * format.bytes_per_frame());
                    let mut sign = 1.0f32;
                    let mut delivered = 0;
                    while !stopped.load(Ordering::Relaxed) {
                        if fail_after.is_some_and(|count| delivered >= count) {
                            on_error(Error::AudioInput("mock stream failure".into()));
                            break;
                        }
                        block.clear();
                        let level = level.get();
                        for _ in 0..frames {
                            let value = sign * (level + NOISE_AMPLITUDE);
                            for _ in 0..format.channels {
                                format.encoding.encode(value, &mut block);
                            }
                            sign = -sign;
                        }
                        if !sink.on_frames(&block, frames) {
                            break;
                        }
                        delivered += 1;
                        thread::sleep(block_duration);
                    }
                })
                .map_err(|e| Error::AudioInput(e.to_string()))?
        };

        info!(device = self.name, "Mock capture started.");
        Ok(Box::new(Stream {
            stopped,
            join_handle: Some(join_handle),
        }))
    }
}

/// The running mock capture thread.
pub struct Stream {
    stopped: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl super::Stream for Stream {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(join_handle) = self.join_handle.take() {
            let _ = join_handle.join();
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        super::Stream::stop(self);
    }
}
