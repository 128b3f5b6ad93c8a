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
//! RIFF/WAVE serialization of captured buffers, with optional labeled cue
//! points.
use std::{fs, path::Path};

use crate::audio::buffer::AudioBuffer;
use crate::error::Error;

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// A labeled position in a recording, in frames from the start of the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    pub sample_offset: u32,
}

impl Marker {
    pub fn new(name: &str, sample_offset: u32) -> Marker {
        Marker {
            name: name.to_string(),
            sample_offset,
        }
    }
}

struct ChunkWriter {
    out: Vec<u8>,
}

impl ChunkWriter {
    fn u16(&mut self, value: u16) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn id(&mut self, id: &[u8; 4]) {
        self.out.extend_from_slice(id);
    }

    /// Writes a chunk header followed by its body, padding odd bodies to an
    /// even length. The pad byte is not part of the chunk size.
    fn chunk(&mut self, id: &[u8; 4], body: impl FnOnce(&mut ChunkWriter)) {
        self.id(id);
        let size_at = self.out.len();
        self.u32(0);
        let body_start = self.out.len();
        body(self);
        let size = (self.out.len() - body_start) as u32;
        self.out[size_at..size_at + 4].copy_from_slice(&size.to_le_bytes());
        if size % 2 == 1 {
            self.out.push(0);
        }
    }
}

/// Renders the buffer as a complete WAV file.
pub fn serialize(buffer: &AudioBuffer, sample_rate: u32, markers: &[Marker]) -> Vec<u8> {
    let encoding = buffer.encoding();
    let block_align = buffer.bytes_per_frame() as u16;
    let format_tag = if encoding.is_float() {
        WAVE_FORMAT_IEEE_FLOAT
    } else {
        WAVE_FORMAT_PCM
    };

    let mut writer = ChunkWriter {
        out: Vec::with_capacity(buffer.data().len() + 128),
    };
    writer.chunk(b"RIFF", |w| {
        w.id(b"WAVE");
        w.chunk(b"fmt ", |w| {
            w.u16(format_tag);
            w.u16(buffer.channels());
            w.u32(sample_rate);
            w.u32(sample_rate * block_align as u32);
            w.u16(block_align);
            w.u16(encoding.bits_per_sample());
        });
        w.chunk(b"data", |w| w.out.extend_from_slice(buffer.data()));

        if markers.is_empty() {
            return;
        }

        w.chunk(b"cue ", |w| {
            w.u32(markers.len() as u32);
            for (id, marker) in (1u32..).zip(markers) {
                w.u32(id);
                w.u32(marker.sample_offset);
                w.id(b"data");
                w.u32(0);
                w.u32(0);
                w.u32(marker.sample_offset);
            }
        });
        w.chunk(b"LIST", |w| {
            w.id(b"adtl");
            for (id, marker) in (1u32..).zip(markers) {
                w.chunk(b"labl", |w| {
                    w.u32(id);
                    w.out.extend_from_slice(marker.name.as_bytes());
                    w.out.push(0);
                });
            }
        });
    });
    writer.out
}

/// Writes the buffer to the given path, creating parent directories as needed.
pub fn write(
    path: &Path,
    buffer: &AudioBuffer,
    sample_rate: u32,
    markers: &[Marker],
) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
        }
    }
    fs::write(path, serialize(buffer, sample_rate, markers)).map_err(|e| Error::file_io(path, e))
}
