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
mod audio;
mod capture;
mod config;
mod devices;
mod error;
mod midi;
mod persist;
mod sampler;
#[cfg(test)]
mod testutil;
mod voices;
mod wav;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{crate_version, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::devices::DeviceInfo;
use crate::error::Error;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Records multisamples of a hardware instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio input devices.
    Devices {},
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Prints every voice a recording session would capture, and where it goes.
    Voices {
        /// The path to the sampler config.
        config_path: PathBuf,
    },
    /// Records every voice described by the config.
    Record {
        /// The path to the sampler config.
        config_path: PathBuf,
    },
}

fn print_devices(devices: Vec<DeviceInfo>) {
    if devices.is_empty() {
        println!("No devices found.");
        return;
    }

    println!("Devices:");
    for device in devices {
        println!("- {}", device);
    }
}

fn execute(command: Commands) -> Result<(), Error> {
    match command {
        Commands::Devices {} => print_devices(audio::list_devices()?),
        Commands::MidiDevices {} => print_devices(midi::list_devices()?),
        Commands::Voices { config_path } => {
            let config = Config::load(&config_path)?;
            let voices = sampler::plan(&config)?;
            println!("Voices (count: {}):", voices.len());
            for planned in voices {
                println!("- {} -> {}", planned.voice, planned.path.display());
            }
        }
        Commands::Record { config_path } => {
            let config = Config::load(&config_path)?;
            let input = audio::get_device(config.audio())?;
            let output = midi::get_output(config.midi())?;
            let summary = sampler::run(&config, input.as_ref(), output)?;
            println!("{}", summary);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(err = %e, "Sampling failed.");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
