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
use std::{fmt, sync::Arc, thread};

use tracing::{info, span, warn, Level};

use crate::audio;
use crate::capture::{Capture, Durations, MidiTarget};
use crate::config::Config;
use crate::error::Error;
use crate::midi;
use crate::persist::{PersistenceScheduler, Totals};
use crate::voices::{self, FilenameTemplate, PlannedVoice};

/// What a finished run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub voices: usize,
    pub totals: Totals,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} voices: {} written, {} silent, {} failed",
            self.voices, self.totals.written, self.totals.silent, self.totals.failed
        )
    }
}

/// Builds the voice list the configuration describes.
pub fn plan(config: &Config) -> Result<Vec<PlannedVoice>, Error> {
    let template = FilenameTemplate::new(config.output().filename());
    Ok(voices::sequence(
        &config.programs()?,
        &config.velocities()?,
        &config.notes()?,
        &template,
        config.output().skip_existing(),
    ))
}

/// Runs a sampling session with already opened devices. Returns once every
/// voice has been recorded and written, or on the first fatal error. In the
/// error case outstanding writes are still waited for.
pub fn run(
    config: &Config,
    input: &dyn audio::Device,
    output: Arc<dyn midi::Output>,
) -> Result<Summary, Error> {
    let span = span!(Level::INFO, "sample");
    let _enter = span.enter();

    let format = input.format();
    if format.sample_rate != config.audio().sample_rate() {
        return Err(Error::AudioInput(format!(
            "sample rate mismatch: requested {}, device runs at {}",
            config.audio().sample_rate(),
            format.sample_rate
        )));
    }

    let voices = plan(config)?;
    let total = voices.len();
    info!(voices = total, device = input.name(), midi = output.name(), "Starting.");
    if voices.is_empty() {
        warn!("Nothing to record.");
        return Ok(Summary {
            voices: 0,
            totals: Totals::default(),
        });
    }

    let durations = Durations::from_timing(&config.timing(), format.sample_rate)?;
    let poll_interval = config.output().poll_interval()?;
    let scheduler = Arc::new(PersistenceScheduler::new(
        config.output().write_threads(),
    )?);

    let capture = Capture::new(
        voices,
        format,
        durations,
        MidiTarget {
            output,
            channel: config.midi().channel(),
            release_velocity: config.midi().release_velocity(),
        },
        scheduler.clone(),
        config.output().release_marker(),
    );
    let status = capture.status();

    let mut stream = {
        let status = status.clone();
        input.start(Box::new(capture), Box::new(move |err| status.fail(err)))?
    };

    let mut reported = 0;
    loop {
        thread::sleep(poll_interval);
        scheduler.poll_completed();

        if let Some(err) = status.take_error() {
            stream.stop();
            scheduler.shutdown();
            return Err(err);
        }

        let done = status.voices_done();
        if done != reported {
            info!(done, total, pending = scheduler.pending(), "Progress.");
            reported = done;
        }

        if status.is_finished() && scheduler.is_drained() {
            break;
        }
    }
    stream.stop();

    let summary = Summary {
        voices: total,
        totals: scheduler.totals(),
    };
    info!(summary = %summary, "Done.");
    Ok(summary)
}
