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
use std::fmt;

use tracing::debug;

/// A device as reported by an audio or MIDI backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    /// The backend API (host) the device belongs to, e.g. ALSA or CoreAudio.
    pub api: String,
    /// Position of the device in the backend's own listing.
    pub id: usize,
    /// Input channels. Zero for MIDI ports.
    pub max_channels: u16,
    pub default_sample_rate: Option<u32>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, id={}", self.name, self.api, self.id)?;
        if self.max_channels > 0 {
            write!(f, ", Channels={}", self.max_channels)?;
        }
        if let Some(rate) = self.default_sample_rate {
            write!(f, ", Rate={}", rate)?;
        }
        write!(f, ")")
    }
}

/// Picks the device matching the given name and, if set, API. Names are
/// compared case-insensitively and in full, whitespace included. If several
/// devices match, the last one listed wins.
pub fn select<'a>(
    devices: &'a [DeviceInfo],
    name: &str,
    api: Option<&str>,
) -> Option<&'a DeviceInfo> {
    devices
        .iter()
        .filter(|device| {
            device.name.eq_ignore_ascii_case(name)
                && api.is_none_or(|api| device.api.eq_ignore_ascii_case(api))
        })
        .inspect(|device| debug!(device = device.name, api = device.api, "Device matched."))
        .last()
}
