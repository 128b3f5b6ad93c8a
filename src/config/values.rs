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

/// The largest value a note, velocity or program may take.
pub const MAX_VALUE: u32 = 127;

/// A list of 7-bit MIDI values. May be written as a single number, a YAML
/// sequence, or a string such as "36-48;60,72".
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ValueList {
    Single(u32),
    Values(Vec<u32>),
    Text(String),
}

impl ValueList {
    /// Expands the list into concrete values, in the order written.
    pub fn values(&self) -> Result<Vec<u8>, ConfigError> {
        let values = match self {
            ValueList::Single(value) => vec![*value],
            ValueList::Values(values) => values.clone(),
            ValueList::Text(text) => parse_text(text)?,
        };

        values
            .into_iter()
            .map(|value| {
                if value > MAX_VALUE {
                    Err(out_of_range(value))
                } else {
                    Ok(value as u8)
                }
            })
            .collect()
    }
}

fn out_of_range(value: u32) -> ConfigError {
    ConfigError::Invalid(format!(
        "value {} is out of range (0-{})",
        value, MAX_VALUE
    ))
}

fn parse_text(text: &str) -> Result<Vec<u32>, ConfigError> {
    let mut values = Vec::new();
    for item in text.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()) {
        let bounds = item
            .split('-')
            .map(|bound| bound.trim().parse::<u32>())
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|_| ConfigError::ValueList(text.to_string()))?;

        if let Some(bound) = bounds.iter().find(|bound| **bound > MAX_VALUE) {
            return Err(out_of_range(*bound));
        }

        match bounds[..] {
            [value] => values.push(value),
            [start, end] => {
                let (low, high) = (start.min(end), start.max(end));
                values.extend(low..=high);
            }
            _ => return Err(ConfigError::ValueList(text.to_string())),
        }
    }
    Ok(values)
}
