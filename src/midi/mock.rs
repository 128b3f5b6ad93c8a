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

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::mock::Level;
use crate::error::Error;

/// Loudest level a mock instrument plays at.
const MAX_LEVEL: f32 = 0.5;

/// A mock output. Records every message, and optionally plays a mock
/// instrument by driving a shared signal level.
pub struct Output {
    name: String,
    sent: Mutex<Vec<Vec<u8>>>,
    level: Option<Arc<Level>>,
    fail_after: Option<usize>,
}

impl Output {
    /// Gets the given mock output.
    pub fn get(name: &str) -> Output {
        Output {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            level: None,
            fail_after: None,
        }
    }

    #[cfg(test)]
    /// Note on raises the level in proportion to velocity, note off drops it.
    pub fn play_into(mut self, level: Arc<Level>) -> Output {
        self.level = Some(level);
        self
    }

    #[cfg(test)]
    /// Fails every message after the first count.
    pub fn fail_after(mut self, count: usize) -> Output {
        self.fail_after = Some(count);
        self
    }

    #[cfg(test)]
    /// Messages sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

impl super::Output for Output {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send_message(&self, status: u8, data1: u8, data2: u8) -> Result<(), Error> {
        let mut sent = self.sent.lock();
        if self.fail_after.is_some_and(|count| sent.len() >= count) {
            return Err(Error::MidiOutput("mock output failure".into()));
        }

        let message = [status, data1, data2][..super::message_len(status)].to_vec();
        debug!(device = self.name, message = format!("{:02X?}", message), "Mock MIDI message.");
        sent.push(message);

        if let Some(level) = &self.level {
            match status & 0xF0 {
                super::NOTE_ON if data2 > 0 => level.set(data2 as f32 / 127.0 * MAX_LEVEL),
                super::NOTE_ON | super::NOTE_OFF => level.set(0.0),
                _ => {}
            }
        }
        Ok(())
    }
}
