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
use std::str::FromStr;

use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::format::{SampleEncoding, SampleFormat};
use crate::error::Error;

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BITS_PER_SAMPLE: u16 = 24;
const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_BLOCK_SIZE: u32 = 1024;

/// A YAML representation of the audio input configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio input device.
    device: String,

    /// The audio API (cpal host) the device belongs to. Any host if unset.
    host: Option<String>,

    /// Sample rate in Hz (default: 48000)
    sample_rate: Option<u32>,

    /// Bits per sample (default: 24)
    bits_per_sample: Option<u16>,

    /// "int" or "float". When unset, 32-bit capture is float.
    sample_format: Option<String>,

    /// Number of input channels to record (default: 1)
    channels: Option<u16>,

    /// Frames per block delivered by the device (default: 1024)
    block_size: Option<u32>,
}

impl Audio {
    #[cfg(test)]
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            host: None,
            sample_rate: None,
            bits_per_sample: None,
            sample_format: None,
            channels: None,
            block_size: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    pub fn sample_format(&self) -> Result<Option<SampleFormat>, ConfigError> {
        self.sample_format
            .as_deref()
            .map(SampleFormat::from_str)
            .transpose()
    }

    /// The sample encoding implied by the bit depth and format.
    pub fn encoding(&self) -> Result<SampleEncoding, Error> {
        SampleEncoding::from_bits(self.bits_per_sample(), self.sample_format()?)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn block_size(&self) -> u32 {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::Invalid("audio device must be set".into()));
        }
        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid("sample rate must be above 0".into()));
        }
        if self.channels() == 0 {
            return Err(ConfigError::Invalid("channels must be above 0".into()));
        }
        if self.block_size() == 0 {
            return Err(ConfigError::Invalid("block size must be above 0".into()));
        }
        self.sample_format()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn with_format(mut self, sample_rate: u32, bits: u16, channels: u16, block: u32) -> Audio {
        self.sample_rate = Some(sample_rate);
        self.bits_per_sample = Some(bits);
        self.channels = Some(channels);
        self.block_size = Some(block);
        self
    }
}
