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

const DEFAULT_NOISE_FLOOR: Duration = Duration::from_secs(2);
const DEFAULT_PRE_ROLL: Duration = Duration::from_millis(500);
const DEFAULT_SUSTAIN: Duration = Duration::from_secs(3);
const DEFAULT_RELEASE: Duration = Duration::from_secs(1);
const DEFAULT_POST_ROLL: Duration = Duration::from_millis(500);

/// How long each phase of a recording lasts, as duration strings ("500ms", "3s").
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Timing {
    /// Time spent listening to the idle instrument before the first voice.
    noise_floor: Option<String>,
    /// Silence between the program change and note on.
    pre_roll: Option<String>,
    /// How long the note is held.
    sustain: Option<String>,
    /// How long to keep recording after note off.
    release: Option<String>,
    /// Silence after the recording before the next voice.
    post_roll: Option<String>,
}

fn parse(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|message| ConfigError::Duration {
                field,
                value: value.clone(),
                message: message.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

impl Timing {
    pub fn noise_floor(&self) -> Result<Duration, ConfigError> {
        parse("noise_floor", &self.noise_floor, DEFAULT_NOISE_FLOOR)
    }

    pub fn pre_roll(&self) -> Result<Duration, ConfigError> {
        parse("pre_roll", &self.pre_roll, DEFAULT_PRE_ROLL)
    }

    pub fn sustain(&self) -> Result<Duration, ConfigError> {
        parse("sustain", &self.sustain, DEFAULT_SUSTAIN)
    }

    pub fn release(&self) -> Result<Duration, ConfigError> {
        parse("release", &self.release, DEFAULT_RELEASE)
    }

    pub fn post_roll(&self) -> Result<Duration, ConfigError> {
        parse("post_roll", &self.post_roll, DEFAULT_POST_ROLL)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.noise_floor()?;
        self.pre_roll()?;
        self.sustain()?;
        self.release()?;
        self.post_roll()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn new(noise_floor: &str, pre_roll: &str, sustain: &str, release: &str, post_roll: &str) -> Timing {
        Timing {
            noise_floor: Some(noise_floor.to_string()),
            pre_roll: Some(pre_roll.to_string()),
            sustain: Some(sustain.to_string()),
            release: Some(release.to_string()),
            post_roll: Some(post_roll.to_string()),
        }
    }
}
