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

mod midir;
pub mod mock;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const PROGRAM_CHANGE: u8 = 0xC0;

/// A MIDI output that the instrument being sampled listens to.
pub trait Output: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Sends a single channel message. The channel is carried in the low
    /// nibble of the status byte. Two byte messages ignore data2.
    fn send_message(&self, status: u8, data1: u8, data2: u8) -> Result<(), Error>;
}

/// Lists output ports known to midir.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Error> {
    midir::list()
}

/// Gets the output described by the configuration.
pub fn get_output(config: &config::Midi) -> Result<Arc<dyn Output>, Error> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Output::get(device)));
    };

    Ok(Arc::new(midir::Output::get(device, config.api())?))
}

/// The number of bytes in a channel message with the given status.
pub fn message_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_lengths() {
        assert_eq!(message_len(NOTE_ON | 3), 3);
        assert_eq!(message_len(NOTE_OFF), 3);
        assert_eq!(message_len(PROGRAM_CHANGE | 15), 2);
        assert_eq!(message_len(0xD0), 2);
        assert_eq!(message_len(0xB0), 3);
    }
}
