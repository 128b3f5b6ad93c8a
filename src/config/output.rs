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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A YAML representation of where and how recordings are written.
#[derive(Deserialize, Clone, Debug)]
pub struct Output {
    /// Filename template. Supports {program}, {note}, {key} and {velocity}.
    filename: String,

    /// Skip voices whose file already exists (default: true)
    skip_existing: Option<bool>,

    /// Mark the note off position in each file with a "release" cue (default: false)
    release_marker: Option<bool>,

    /// Number of threads writing files in the background (default: number of CPUs)
    write_threads: Option<usize>,

    /// How often the driver checks for finished writes (default: 250ms)
    poll_interval: Option<String>,
}

impl Output {
    #[cfg(test)]
    pub fn new(filename: &str) -> Output {
        Output {
            filename: filename.to_string(),
            skip_existing: None,
            release_marker: None,
            write_threads: None,
            poll_interval: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn skip_existing(&self) -> bool {
        self.skip_existing.unwrap_or(true)
    }

    pub fn release_marker(&self) -> bool {
        self.release_marker.unwrap_or(false)
    }

    pub fn write_threads(&self) -> usize {
        self.write_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(value) => Ok(DurationString::from_string(value.clone())
                .map_err(|message| ConfigError::Duration {
                    field: "poll_interval",
                    value: value.clone(),
                    message: message.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.trim().is_empty() {
            return Err(ConfigError::Invalid("output filename must be set".into()));
        }
        self.poll_interval()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn with_options(mut self, skip_existing: bool, release_marker: bool) -> Output {
        self.skip_existing = Some(skip_existing);
        self.release_marker = Some(release_marker);
        self.write_threads = Some(2);
        self.poll_interval = Some("10ms".to_string());
        self
    }
}
