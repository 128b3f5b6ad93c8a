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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::audio::{buffer::AudioBuffer, FrameSink, StreamFormat};
use crate::config::{error::ConfigError, Timing};
use crate::error::Error;
use crate::midi::{self, NOTE_OFF, NOTE_ON, PROGRAM_CHANGE};
use crate::persist::{PersistenceScheduler, WriteRequest};
use crate::voices::PlannedVoice;

/// Recordings are trimmed at this multiple of the measured noise floor.
pub const NOISE_FLOOR_MARGIN: f32 = 1.25;

/// The phases of sampling. The noise floor is measured once, then every voice
/// runs through PauseBefore to PauseAfter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    DetectNoiseFloor,
    PauseBefore,
    Sustain,
    Release,
    PauseAfter,
    Finished,
}

impl State {
    /// Whether incoming frames are kept in this state.
    fn records(self) -> bool {
        matches!(
            self,
            State::DetectNoiseFloor | State::Sustain | State::Release
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How many frames each state lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durations {
    pub noise_floor: usize,
    pub pre_roll: usize,
    pub sustain: usize,
    pub release: usize,
    pub post_roll: usize,
}

fn frames(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_nanos() * sample_rate as u128 / 1_000_000_000) as usize
}

impl Durations {
    pub fn from_timing(timing: &Timing, sample_rate: u32) -> Result<Durations, ConfigError> {
        Ok(Durations {
            noise_floor: frames(timing.noise_floor()?, sample_rate),
            pre_roll: frames(timing.pre_roll()?, sample_rate),
            sustain: frames(timing.sustain()?, sample_rate),
            release: frames(timing.release()?, sample_rate),
            post_roll: frames(timing.post_roll()?, sample_rate),
        })
    }

    fn of(&self, state: State) -> usize {
        match state {
            State::DetectNoiseFloor => self.noise_floor,
            State::PauseBefore => self.pre_roll,
            State::Sustain => self.sustain,
            State::Release => self.release,
            State::PauseAfter => self.post_roll,
            State::Finished => usize::MAX,
        }
    }
}

/// Progress of a capture as seen from outside the audio thread.
#[derive(Default)]
pub struct CaptureStatus {
    finished: AtomicBool,
    voices_done: AtomicUsize,
    error: Mutex<Option<Error>>,
}

impl CaptureStatus {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Voices whose recording has been handed off for writing.
    pub fn voices_done(&self) -> usize {
        self.voices_done.load(Ordering::Relaxed)
    }

    /// Takes the error that stopped capture, if any.
    pub fn take_error(&self) -> Option<Error> {
        self.error.lock().take()
    }

    /// Stops capture with the given error. The first error reported wins.
    pub fn fail(&self, err: Error) {
        self.error.lock().get_or_insert(err);
        self.finished.store(true, Ordering::Release);
    }
}

/// MIDI settings used while capturing.
#[derive(Clone)]
pub struct MidiTarget {
    pub output: Arc<dyn midi::Output>,
    pub channel: u8,
    pub release_velocity: u8,
}

/// Drives the instrument through every voice, one block of frames at a time.
pub struct Capture {
    voices: Vec<PlannedVoice>,
    cursor: usize,
    state: State,
    elapsed: usize,
    durations: Durations,
    buffer: AudioBuffer,
    sample_rate: u32,
    noise_floor: f32,
    last_program: Option<u8>,
    release_frame: Option<usize>,
    release_marker: bool,
    midi: MidiTarget,
    scheduler: Arc<PersistenceScheduler>,
    status: Arc<CaptureStatus>,
}

impl Capture {
    pub fn new(
        voices: Vec<PlannedVoice>,
        format: StreamFormat,
        durations: Durations,
        midi: MidiTarget,
        scheduler: Arc<PersistenceScheduler>,
        release_marker: bool,
    ) -> Capture {
        let mut buffer = AudioBuffer::new(format.encoding, format.channels);
        // Leave headroom for the block that crosses the limit so the audio
        // thread doesn't reallocate.
        let longest = durations
            .noise_floor
            .max(durations.sustain.saturating_add(durations.release));
        buffer.reserve_frames(longest.saturating_add(format.sample_rate as usize / 10));

        let mut capture = Capture {
            voices,
            cursor: 0,
            state: State::Finished,
            elapsed: 0,
            durations,
            buffer,
            sample_rate: format.sample_rate,
            noise_floor: 0.0,
            last_program: None,
            release_frame: None,
            release_marker,
            midi,
            scheduler,
            status: Arc::new(CaptureStatus::default()),
        };

        let initial = if capture.voices.is_empty() {
            State::Finished
        } else {
            State::DetectNoiseFloor
        };
        // Neither initial state sends MIDI, so entering can't fail.
        if let Err(e) = capture.enter(initial) {
            capture.status.fail(e);
        }
        capture
    }

    pub fn status(&self) -> Arc<CaptureStatus> {
        self.status.clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    #[cfg(test)]
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    fn send(&self, status: u8, data1: u8, data2: u8) -> Result<(), Error> {
        self.midi
            .output
            .send_message(status | (self.midi.channel & 0x0F), data1, data2)
    }

    fn advance(&mut self) -> Result<(), Error> {
        let next = match self.state {
            State::DetectNoiseFloor => {
                self.noise_floor = self.buffer.peak();
                info!(
                    noise_floor = self.noise_floor,
                    threshold = self.noise_floor * NOISE_FLOOR_MARGIN,
                    "Measured noise floor."
                );
                State::PauseBefore
            }
            State::PauseBefore => State::Sustain,
            State::Sustain => State::Release,
            State::Release => State::PauseAfter,
            State::PauseAfter => {
                self.cursor += 1;
                if self.cursor < self.voices.len() {
                    State::PauseBefore
                } else {
                    State::Finished
                }
            }
            State::Finished => State::Finished,
        };
        self.enter(next)
    }

    fn enter(&mut self, state: State) -> Result<(), Error> {
        debug!(state = %state, voice = self.cursor, "Entering state.");
        self.state = state;
        self.elapsed = 0;

        match state {
            State::DetectNoiseFloor => self.buffer.clear(),
            State::PauseBefore => {
                self.buffer.clear();
                let program = self.voices[self.cursor].voice.program;
                if let Some(program) = program.filter(|p| Some(*p) != self.last_program) {
                    info!(program, "Program change.");
                    self.send(PROGRAM_CHANGE, program, 0)?;
                    self.last_program = Some(program);
                }
            }
            State::Sustain => {
                self.buffer.clear();
                self.release_frame = None;
                let voice = self.voices[self.cursor].voice;
                info!(note = voice.note, velocity = voice.velocity, "Note on.");
                self.send(NOTE_ON, voice.note, voice.velocity)?;
            }
            State::Release => {
                self.release_frame = Some(self.buffer.len_frames());
                let voice = self.voices[self.cursor].voice;
                self.send(NOTE_OFF, voice.note, self.midi.release_velocity)?;
            }
            State::PauseAfter => {
                let planned = &self.voices[self.cursor];
                self.scheduler.submit(WriteRequest {
                    voice: planned.voice,
                    path: planned.path.clone(),
                    buffer: self.buffer.clone(),
                    sample_rate: self.sample_rate,
                    threshold: self.noise_floor * NOISE_FLOOR_MARGIN,
                    release_frame: self.release_frame.filter(|_| self.release_marker),
                });
                self.buffer.clear();
                self.status.voices_done.fetch_add(1, Ordering::Relaxed);
            }
            State::Finished => {
                info!(voices = self.status.voices_done(), "Capture finished.");
                self.status.finished.store(true, Ordering::Release);
            }
        }
        Ok(())
    }
}

impl FrameSink for Capture {
    fn on_frames(&mut self, data: &[u8], frames: usize) -> bool {
        if self.state == State::Finished {
            return false;
        }

        if self.state.records() {
            self.buffer.append(data, frames);
        }
        self.elapsed += frames;

        if self.elapsed >= self.durations.of(self.state) {
            if let Err(e) = self.advance() {
                error!(err = %e, "Stopping capture.");
                self.state = State::Finished;
                self.status.fail(e);
            }
        }

        self.state != State::Finished
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::format::SampleEncoding;
    use crate::midi::mock;
    use crate::voices::{sequence, FilenameTemplate};

    const DURATIONS: Durations = Durations {
        noise_floor: 10,
        pre_roll: 5,
        sustain: 20,
        release: 8,
        post_roll: 5,
    };

    const FORMAT: StreamFormat = StreamFormat {
        encoding: SampleEncoding::F32,
        channels: 1,
        sample_rate: 1000,
    };

    fn capture(
        programs: &[u8],
        notes: &[u8],
        output: Arc<mock::Output>,
        dir: &std::path::Path,
    ) -> (Capture, Arc<PersistenceScheduler>) {
        let template = FilenameTemplate::new(dir.join("{program}_{note}.wav").to_str().unwrap());
        let voices = sequence(programs, &[127], notes, &template, false);
        let scheduler = Arc::new(PersistenceScheduler::new(1).unwrap());
        let capture = Capture::new(
            voices,
            FORMAT,
            DURATIONS,
            MidiTarget {
                output,
                channel: 2,
                release_velocity: 0,
            },
            scheduler.clone(),
            false,
        );
        (capture, scheduler)
    }

    /// Feeds single frames until capture finishes, collecting how many frames
    /// each state lasted.
    fn run(capture: &mut Capture) -> Vec<(State, usize)> {
        let mut frame = Vec::new();
        SampleEncoding::F32.encode(0.25, &mut frame);

        let mut runs: Vec<(State, usize)> = Vec::new();
        for _ in 0..10_000 {
            let state = capture.state();
            let keep_going = capture.on_frames(&frame, 1);
            match runs.last_mut() {
                Some((last, count)) if *last == state => *count += 1,
                _ => runs.push((state, 1)),
            }
            if !keep_going {
                break;
            }
        }
        runs
    }

    #[test]
    fn state_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(mock::Output::get("mock-synth"));
        let (mut capture, scheduler) = capture(&[], &[60, 61], output.clone(), dir.path());

        let runs = run(&mut capture);
        assert_eq!(
            runs,
            vec![
                (State::DetectNoiseFloor, 10),
                (State::PauseBefore, 5),
                (State::Sustain, 20),
                (State::Release, 8),
                (State::PauseAfter, 5),
                (State::PauseBefore, 5),
                (State::Sustain, 20),
                (State::Release, 8),
                (State::PauseAfter, 5),
            ]
        );
        assert_eq!(capture.state(), State::Finished);
        assert!(!capture.on_frames(&[0; 4], 1));

        assert_eq!(
            output.sent(),
            vec![
                vec![0x92, 60, 127],
                vec![0x82, 60, 0],
                vec![0x92, 61, 127],
                vec![0x82, 61, 0],
            ]
        );

        let status = capture.status();
        assert!(status.is_finished());
        assert_eq!(status.voices_done(), 2);
        assert!(status.take_error().is_none());
        assert_eq!(scheduler.shutdown().len(), 2);
    }

    #[test]
    fn program_change_only_when_it_differs() {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(mock::Output::get("mock-synth"));
        let (mut capture, scheduler) = capture(&[1, 2], &[60, 61], output.clone(), dir.path());
        run(&mut capture);

        let sent = output.sent();
        let program_changes: Vec<&Vec<u8>> =
            sent.iter().filter(|m| m[0] & 0xF0 == PROGRAM_CHANGE).collect();
        assert_eq!(program_changes, vec![&vec![0xC2, 1], &vec![0xC2, 2]]);
        assert_eq!(sent[0], vec![0xC2, 1]);
        assert_eq!(sent[5], vec![0xC2, 2]);
        assert_eq!(sent.len(), 2 + 4 * 2);
        assert_eq!(scheduler.shutdown().len(), 4);
    }

    #[test]
    fn midi_failure_stops_capture() {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(mock::Output::get("mock-synth").fail_after(1));
        let (mut capture, scheduler) = capture(&[], &[60, 61], output, dir.path());

        let runs = run(&mut capture);
        // The note off fails when sustain ends.
        assert_eq!(runs.last(), Some(&(State::Sustain, 20)));
        assert_eq!(capture.state(), State::Finished);

        let status = capture.status();
        assert!(status.is_finished());
        assert_eq!(status.voices_done(), 0);
        assert!(matches!(status.take_error(), Some(Error::MidiOutput(_))));
        assert!(scheduler.is_drained());
    }

    #[test]
    fn no_voices_is_finished() {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(mock::Output::get("mock-synth"));
        let (mut capture, _) = capture(&[], &[], output.clone(), dir.path());
        assert_eq!(capture.state(), State::Finished);
        assert!(capture.status().is_finished());
        assert!(!capture.on_frames(&[0; 4], 1));
        assert!(output.sent().is_empty());
    }

    #[test]
    fn noise_floor_is_peak() {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(mock::Output::get("mock-synth"));
        let (mut capture, _) = capture(&[], &[60], output, dir.path());

        let mut block = Vec::new();
        for value in [0.01, -0.03, 0.02, 0.0, 0.01] {
            SampleEncoding::F32.encode(value, &mut block);
        }
        capture.on_frames(&block, 5);
        assert_eq!(capture.state(), State::DetectNoiseFloor);
        capture.on_frames(&block, 5);
        assert_eq!(capture.state(), State::PauseBefore);
        assert_eq!(capture.noise_floor(), 0.03);
    }

    #[test]
    fn durations_from_timing() {
        let timing = Timing::new("2s", "500ms", "3s", "1s", "1ms");
        let durations = Durations::from_timing(&timing, 48000).unwrap();
        assert_eq!(
            durations,
            Durations {
                noise_floor: 96000,
                pre_roll: 24000,
                sustain: 144000,
                release: 48000,
                post_roll: 48,
            }
        );
    }
}
