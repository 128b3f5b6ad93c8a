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
use std::{fmt, str::FromStr};

use crate::config::error::ConfigError;
use crate::error::Error;

/// Whether samples are stored as integers or floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int,
    Float,
}

impl FromStr for SampleFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "Float" => Ok(SampleFormat::Float),
            "int" | "Int" => Ok(SampleFormat::Int),
            _ => Err(ConfigError::Invalid(format!(
                "unsupported sample format: {}",
                s
            ))),
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The physical layout of a single sample as delivered by the capture device.
/// All multi-byte encodings are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// 8-bit unsigned, centered on 128.
    U8,
    I16,
    /// 24-bit signed, packed into 3 bytes.
    I24,
    I32,
    F32,
}

impl SampleEncoding {
    /// Resolves an encoding from a bit depth. When no format is given, 32 bits
    /// means float and everything else means integer.
    pub fn from_bits(bits: u16, format: Option<SampleFormat>) -> Result<SampleEncoding, Error> {
        match (bits, format) {
            (8, None | Some(SampleFormat::Int)) => Ok(SampleEncoding::U8),
            (16, None | Some(SampleFormat::Int)) => Ok(SampleEncoding::I16),
            (24, None | Some(SampleFormat::Int)) => Ok(SampleEncoding::I24),
            (32, Some(SampleFormat::Int)) => Ok(SampleEncoding::I32),
            (32, None | Some(SampleFormat::Float)) => Ok(SampleEncoding::F32),
            (bits, Some(format)) => Err(Error::UnsupportedBitDepth(format!("{bits} ({format})"))),
            (bits, None) => Err(Error::UnsupportedBitDepth(bits.to_string())),
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
            SampleEncoding::I16 => 2,
            SampleEncoding::I24 => 3,
            SampleEncoding::I32 | SampleEncoding::F32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    pub fn is_float(self) -> bool {
        self == SampleEncoding::F32
    }

    /// Reads a normalized amplitude for the given frame and channel out of a
    /// buffer of interleaved frames. Out of range channels and frames read
    /// as silence.
    pub fn float_value(self, data: &[u8], channels: u16, frame: usize, channel: u16) -> f32 {
        if channel >= channels {
            return 0.0;
        }

        let bytes_per_sample = self.bytes_per_sample();
        let bytes_per_frame = bytes_per_sample * channels as usize;
        let frame_start = frame * bytes_per_frame;
        if frame_start + bytes_per_frame > data.len() {
            return 0.0;
        }

        let start = frame_start + channel as usize * bytes_per_sample;
        self.decode(&data[start..start + bytes_per_sample])
    }

    /// Decodes a single sample. The slice must be exactly one sample wide.
    fn decode(self, sample: &[u8]) -> f32 {
        match self {
            SampleEncoding::U8 => (sample[0] as f32 - 128.0) / 128.0,
            SampleEncoding::I16 => {
                i16::from_le_bytes([sample[0], sample[1]]) as f32 / -(i16::MIN as f32)
            }
            SampleEncoding::I24 => {
                // Place the three bytes in the upper part of an i32 and shift
                // back down to sign extend.
                let value = i32::from_le_bytes([0, sample[0], sample[1], sample[2]]) >> 8;
                value as f32 / 8_388_608.0
            }
            SampleEncoding::I32 => {
                i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) as f32
                    / -(i32::MIN as f32)
            }
            SampleEncoding::F32 => f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]),
        }
    }

    /// Appends the encoded form of a normalized amplitude to the output.
    pub fn encode(self, value: f32, out: &mut Vec<u8>) {
        let value = value.clamp(-1.0, 1.0);
        match self {
            SampleEncoding::U8 => out.push((value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8),
            SampleEncoding::I16 => out.extend_from_slice(
                &((value * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
                    .to_le_bytes(),
            ),
            SampleEncoding::I24 => {
                let scaled = (value * 8_388_608.0)
                    .round()
                    .clamp(-8_388_608.0, 8_388_607.0) as i32;
                out.extend_from_slice(&scaled.to_le_bytes()[0..3]);
            }
            SampleEncoding::I32 => {
                // f64 keeps full precision near the integer limits.
                let scaled = (value as f64 * 2_147_483_648.0)
                    .round()
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                out.extend_from_slice(&scaled.to_le_bytes());
            }
            SampleEncoding::F32 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = if self.is_float() {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        };
        write!(f, "{}-bit {}", self.bits_per_sample(), format)
    }
}

/// The negotiated shape of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }
}
