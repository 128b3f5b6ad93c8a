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
use serde::Deserialize;

use super::error::ConfigError;

/// A YAML representation of the MIDI output configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Midi {
    /// The MIDI output device.
    device: String,

    /// The MIDI API the device belongs to. Any API if unset.
    api: Option<String>,

    /// Channel to send on, 0-15 (default: 0)
    channel: Option<u8>,

    /// Velocity sent with note off (default: 0)
    release_velocity: Option<u8>,
}

impl Midi {
    #[cfg(test)]
    pub fn new(device: &str) -> Midi {
        Midi {
            device: device.to_string(),
            api: None,
            channel: None,
            release_velocity: None,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn api(&self) -> Option<&str> {
        self.api.as_deref()
    }

    pub fn channel(&self) -> u8 {
        self.channel.unwrap_or(0)
    }

    pub fn release_velocity(&self) -> u8 {
        self.release_velocity.unwrap_or(0)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::Invalid("MIDI device must be set".into()));
        }
        if self.channel() > 15 {
            return Err(ConfigError::Invalid(format!(
                "MIDI channel {} is out of range (0-15)",
                self.channel()
            )));
        }
        if self.release_velocity() > 127 {
            return Err(ConfigError::Invalid(format!(
                "release velocity {} is out of range (0-127)",
                self.release_velocity()
            )));
        }
        Ok(())
    }
}
