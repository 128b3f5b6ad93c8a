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
use std::{io, path::PathBuf};

use crate::config::error::ConfigError;

/// Errors that can abort a sampling run. Each kind maps to a distinct
/// process exit code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No audio input device found matching {0}")]
    InputDeviceNotFound(String),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(String),

    #[error("Audio input error: {0}")]
    AudioInput(String),

    #[error("No MIDI output device found matching {0}")]
    MidiOutputNotFound(String),

    #[error("MIDI output error: {0}")]
    MidiOutput(String),

    #[error("Unable to write {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InputDeviceNotFound(_) => 1,
            Error::UnsupportedBitDepth(_) => 2,
            Error::AudioInput(_) => 3,
            Error::MidiOutputNotFound(_) => 4,
            Error::MidiOutput(_) => 5,
            Error::FileIo { .. } => 6,
            Error::Config(_) => 100,
        }
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }
}
