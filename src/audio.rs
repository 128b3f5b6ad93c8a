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
use std::{fmt, sync::Arc};

use crate::config;
use crate::devices::DeviceInfo;
use crate::error::Error;

pub mod buffer;
pub mod cpal;
pub mod format;
pub mod mock;

pub use format::StreamFormat;

/// Receives blocks of raw interleaved frames from a running capture stream.
/// Called on the audio backend's thread, so implementations must not block.
pub trait FrameSink: Send {
    /// Handles a block of frames. Returning false asks the stream to stop
    /// delivering.
    fn on_frames(&mut self, data: &[u8], frames: usize) -> bool;
}

/// Called from the audio backend when a running stream fails.
pub type ErrorHandler = Box<dyn FnMut(Error) + Send>;

/// An audio input device that can record.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// The format frames will be delivered in, including the sample rate the
    /// device actually runs at.
    fn format(&self) -> StreamFormat;

    /// Starts capturing, delivering every block to the sink. Errors raised by
    /// the stream after it has started go to on_error.
    fn start(
        &self,
        sink: Box<dyn FrameSink>,
        on_error: ErrorHandler,
    ) -> Result<Box<dyn Stream>, Error>;
}

/// A running capture stream. Dropping it stops capture as well.
pub trait Stream {
    fn stop(&mut self);
}

/// Lists input devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Error> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Error> {
    let device = config.device();
    let format = StreamFormat {
        encoding: config.encoding()?,
        channels: config.channels(),
        sample_rate: config.sample_rate(),
    };

    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            format,
            config.block_size(),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config, format)?))
}
