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

use midir::{MidiOutput, MidiOutputConnection};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::devices::{self, DeviceInfo};
use crate::error::Error;

#[cfg(target_os = "linux")]
const API: &str = "ALSA";
#[cfg(target_os = "macos")]
const API: &str = "CoreMIDI";
#[cfg(target_os = "windows")]
const API: &str = "WinMM";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const API: &str = "midir";

/// An open midir output connection.
pub struct Output {
    name: String,
    connection: Mutex<MidiOutputConnection>,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, API)
    }
}

fn midi_output(client: &str) -> Result<MidiOutput, Error> {
    MidiOutput::new(client).map_err(|e| Error::MidiOutput(e.to_string()))
}

/// Lists midir output ports.
pub fn list() -> Result<Vec<DeviceInfo>, Error> {
    let output = midi_output("autosampler list")?;
    Ok(output
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(id, port)| {
            output.port_name(port).ok().map(|name| DeviceInfo {
                name,
                api: API.to_string(),
                id,
                max_channels: 0,
                default_sample_rate: None,
            })
        })
        .collect())
}

impl Output {
    /// Opens the output port matching the given name and API.
    pub fn get(name: &str, api: Option<&str>) -> Result<Output, Error> {
        let span = span!(Level::INFO, "get output (midir)");
        let _enter = span.enter();

        let infos = list()?;
        let info = devices::select(&infos, name, api)
            .ok_or_else(|| Error::MidiOutputNotFound(name.to_string()))?;

        let output = midi_output("autosampler")?;
        let ports = output.ports();
        let port = ports
            .get(info.id)
            .ok_or_else(|| Error::MidiOutputNotFound(name.to_string()))?;
        let connection = output
            .connect(port, "autosampler output")
            .map_err(|e| Error::MidiOutput(e.to_string()))?;

        info!(device = info.name, api = info.api, "Using MIDI output device.");
        Ok(Output {
            name: info.name.clone(),
            connection: Mutex::new(connection),
        })
    }
}

impl super::Output for Output {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send_message(&self, status: u8, data1: u8, data2: u8) -> Result<(), Error> {
        let message = [status, data1, data2];
        let message = &message[..super::message_len(status)];

        match LiveEvent::parse(message) {
            Ok(event) => debug!(event = format!("{:?}", event), "Sending MIDI event."),
            Err(e) => return Err(Error::MidiOutput(format!("invalid message {message:02X?}: {e}"))),
        }

        self.connection
            .lock()
            .send(message)
            .map_err(|e| Error::MidiOutput(e.to_string()))
    }
}
