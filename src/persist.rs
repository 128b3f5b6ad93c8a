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
// Background persistence of finished recordings. Capture hands over a copy of
// each voice's buffer and moves on; trimming and file writes run on a small
// Rayon pool and the driver reclaims the results by polling.
//
use std::{
    collections::HashMap,
    fmt::Display,
    path::PathBuf,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info};

use crate::audio::buffer::AudioBuffer;
use crate::config::error::ConfigError;
use crate::error::Error;
use crate::voices::Voice;
use crate::wav::{self, Marker};

/// Identifies a submitted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

/// What happened to a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written, with this many frames after trimming.
    Written(usize),
    /// Nothing rose above the threshold, so no file was written.
    Silent,
}

/// A recording handed over for persistence.
pub struct WriteRequest {
    pub voice: Voice,
    pub path: PathBuf,
    pub buffer: AudioBuffer,
    pub sample_rate: u32,
    /// Amplitude below which edge frames are trimmed. Zero disables trimming.
    pub threshold: f32,
    /// Frame where note off was sent, marked in the file when set.
    pub release_frame: Option<usize>,
}

struct PendingWrite {
    voice: Voice,
    path: PathBuf,
    outcome: Receiver<Result<WriteOutcome, Error>>,
}

/// A write that has been reclaimed by polling.
#[derive(Debug)]
pub struct CompletedWrite {
    pub id: JobId,
    pub voice: Voice,
    pub path: PathBuf,
    pub result: Result<WriteOutcome, Error>,
}

/// Counts of reclaimed writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub written: usize,
    pub silent: usize,
    pub failed: usize,
}

/// Tracks in-flight writes and runs them on a bounded pool.
pub struct PersistenceScheduler {
    pool: rayon::ThreadPool,
    pending: Mutex<HashMap<JobId, PendingWrite>>,
    next_id: AtomicU64,
    written: AtomicUsize,
    silent: AtomicUsize,
    failed: AtomicUsize,
}

impl PersistenceScheduler {
    /// Creates a new scheduler with the given number of writer threads.
    pub fn new(num_threads: usize) -> Result<Self, Error> {
        let num_threads = num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("autosampler-write-{i}"))
            .build()
            .map_err(|e| pool_error(num_threads, e))?;
        Ok(Self {
            pool,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            written: AtomicUsize::new(0),
            silent: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    /// Registers the write and queues it on the pool. Never blocks on I/O.
    pub fn submit(&self, request: WriteRequest) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = crossbeam_channel::bounded(1);

        // Register before spawning so the job is visible to polling even if
        // it completes immediately.
        self.pending.lock().insert(
            id,
            PendingWrite {
                voice: request.voice,
                path: request.path.clone(),
                outcome: receiver,
            },
        );

        self.pool.spawn(move || {
            let result = persist(request);
            // The receiver only goes away if the scheduler was dropped.
            let _ = sender.send(result);
        });
        id
    }

    /// Reclaims every finished write. Writes still in progress are untouched.
    pub fn poll_completed(&self) -> Vec<CompletedWrite> {
        let mut pending = self.pending.lock();
        let mut finished = Vec::new();
        for (id, write) in pending.iter() {
            let result = match write.outcome.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => Err(Error::file_io(
                    write.path.clone(),
                    std::io::Error::other("writer exited without a result"),
                )),
            };
            finished.push((*id, result));
        }

        let mut completed: Vec<CompletedWrite> = finished
            .into_iter()
            .filter_map(|(id, result)| {
                pending.remove(&id).map(|write| CompletedWrite {
                    id,
                    voice: write.voice,
                    path: write.path,
                    result,
                })
            })
            .collect();
        drop(pending);

        completed.sort_by_key(|write| write.id);
        for write in completed.iter() {
            self.record(write);
        }
        completed
    }

    /// Blocks until every registered write has finished, then reclaims them.
    /// Used when a run is aborted so that no recording is silently dropped.
    pub fn shutdown(&self) -> Vec<CompletedWrite> {
        let drained: Vec<(JobId, PendingWrite)> = self.pending.lock().drain().collect();
        let mut completed: Vec<CompletedWrite> = drained
            .into_iter()
            .map(|(id, write)| {
                let result = write.outcome.recv().unwrap_or_else(|_| {
                    Err(Error::file_io(
                        write.path.clone(),
                        std::io::Error::other("writer exited without a result"),
                    ))
                });
                CompletedWrite {
                    id,
                    voice: write.voice,
                    path: write.path,
                    result,
                }
            })
            .collect();

        completed.sort_by_key(|write| write.id);
        for write in completed.iter() {
            self.record(write);
        }
        completed
    }

    /// True when no writes are registered.
    pub fn is_drained(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            written: self.written.load(Ordering::Relaxed),
            silent: self.silent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, write: &CompletedWrite) {
        match &write.result {
            Ok(WriteOutcome::Written(frames)) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                info!(
                    voice = %write.voice,
                    path = %write.path.display(),
                    frames,
                    "Wrote sample."
                );
            }
            Ok(WriteOutcome::Silent) => {
                self.silent.fetch_add(1, Ordering::Relaxed);
                info!(voice = %write.voice, "Recording is silent, skipped.");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    voice = %write.voice,
                    path = %write.path.display(),
                    err = %e,
                    "Unable to write sample."
                );
            }
        }
    }
}

/// The writer thread count comes from config, so a pool that can't start is
/// reported as a config problem.
fn pool_error(num_threads: usize, err: impl Display) -> Error {
    Error::Config(ConfigError::Invalid(format!(
        "unable to start {num_threads} writer threads: {err}"
    )))
}

/// Trims, serializes and writes one recording.
fn persist(request: WriteRequest) -> Result<WriteOutcome, Error> {
    let WriteRequest {
        path,
        mut buffer,
        sample_rate,
        threshold,
        release_frame,
        ..
    } = request;

    let removed = if threshold > 0.0 {
        buffer.trim(threshold)
    } else {
        0
    };
    if buffer.is_empty() {
        return Ok(WriteOutcome::Silent);
    }

    let markers: Vec<Marker> = release_frame
        .and_then(|frame| frame.checked_sub(removed))
        .filter(|frame| *frame < buffer.len_frames())
        .map(|frame| Marker::new("release", frame as u32))
        .into_iter()
        .collect();

    debug!(path = %path.display(), removed, "Trimmed recording.");
    wav::write(&path, &buffer, sample_rate, &markers)?;
    Ok(WriteOutcome::Written(buffer.len_frames()))
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, fs, sync::atomic::AtomicBool, thread};

    use super::*;
    use crate::audio::format::SampleEncoding;
    use crate::testutil::eventually;

    fn request(dir: &std::path::Path, note: u8, values: &[f32]) -> WriteRequest {
        let mut raw = Vec::new();
        for value in values {
            SampleEncoding::I16.encode(*value, &mut raw);
        }
        let mut buffer = AudioBuffer::new(SampleEncoding::I16, 1);
        buffer.append(&raw, values.len());
        WriteRequest {
            voice: Voice {
                program: None,
                note,
                velocity: 127,
            },
            path: dir.join(format!("{note}.wav")),
            buffer,
            sample_rate: 48000,
            threshold: 0.1,
            release_frame: None,
        }
    }

    #[test]
    fn drains_every_submission_once() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = PersistenceScheduler::new(3).unwrap();

        let ids: HashSet<JobId> = (0..20)
            .map(|note| scheduler.submit(request(dir.path(), note, &[0.0, 0.5, 0.5, 0.0])))
            .collect();
        assert_eq!(ids.len(), 20);

        let reclaimed = Mutex::new(Vec::new());
        eventually(
            || {
                reclaimed.lock().extend(scheduler.poll_completed());
                scheduler.is_drained()
            },
            "Writes never drained",
        );

        let reclaimed = reclaimed.into_inner();
        let reclaimed_ids: HashSet<JobId> = reclaimed.iter().map(|write| write.id).collect();
        assert_eq!(reclaimed.len(), 20);
        assert_eq!(reclaimed_ids, ids);
        assert!(reclaimed
            .iter()
            .all(|write| matches!(write.result, Ok(WriteOutcome::Written(4)))));
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.poll_completed().is_empty());
        assert_eq!(
            scheduler.totals(),
            Totals {
                written: 20,
                silent: 0,
                failed: 0
            }
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 20);
    }

    #[test]
    fn polling_while_submitting_reclaims_each_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = PersistenceScheduler::new(4).unwrap();
        let submitting = AtomicBool::new(true);

        let (submitted, reclaimed) = thread::scope(|s| {
            let poller = s.spawn(|| {
                let mut reclaimed = Vec::new();
                loop {
                    // Read the flag before polling so the last pass sees every
                    // submission.
                    let done = !submitting.load(Ordering::Acquire);
                    reclaimed.extend(scheduler.poll_completed());
                    if done && scheduler.is_drained() {
                        return reclaimed;
                    }
                    thread::yield_now();
                }
            });

            let submitted: Vec<JobId> = (0..50)
                .map(|note| scheduler.submit(request(dir.path(), note, &[0.0, 0.5, 0.5, 0.0])))
                .collect();
            submitting.store(false, Ordering::Release);
            (submitted, poller.join().unwrap())
        });

        let submitted: HashSet<JobId> = submitted.into_iter().collect();
        let reclaimed_ids: HashSet<JobId> = reclaimed.iter().map(|write| write.id).collect();
        assert_eq!(submitted.len(), 50);
        assert_eq!(reclaimed.len(), 50);
        assert_eq!(reclaimed_ids, submitted);
        assert!(reclaimed
            .iter()
            .all(|write| matches!(write.result, Ok(WriteOutcome::Written(4)))));
        assert!(scheduler.is_drained());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.totals().written, 50);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 50);
    }

    #[test]
    fn silent_recordings_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = PersistenceScheduler::new(1).unwrap();
        scheduler.submit(request(dir.path(), 60, &[0.0, 0.01, 0.0]));

        let completed = scheduler.shutdown();
        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].result, Ok(WriteOutcome::Silent)));
        assert!(!dir.path().join("60.wav").exists());
        assert_eq!(scheduler.totals().silent, 1);
    }

    #[test]
    fn failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is needed.
        fs::write(dir.path().join("blocker"), b"").unwrap();
        let scheduler = PersistenceScheduler::new(1).unwrap();
        let mut write = request(dir.path(), 60, &[0.5, 0.5]);
        write.path = dir.path().join("blocker/60.wav");
        scheduler.submit(write);

        let completed = scheduler.shutdown();
        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].result, Err(Error::FileIo { .. })));
        assert_eq!(scheduler.totals().failed, 1);
        assert!(scheduler.is_drained());
    }

    #[test]
    fn pool_startup_failure_is_a_config_error() {
        let err = pool_error(4, "resource temporarily unavailable");
        assert_eq!(err.exit_code(), 100);
        assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
        let message = err.to_string();
        assert!(message.contains("4 writer threads"), "{message}");
        assert!(message.contains("resource temporarily unavailable"), "{message}");
        assert!(!message.contains("Unable to write"), "{message}");
    }

    #[test]
    fn release_marker_follows_trim() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = PersistenceScheduler::new(1).unwrap();
        let mut write = request(dir.path(), 60, &[0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.0, 0.0]);
        write.release_frame = Some(5);
        let path = write.path.clone();
        scheduler.submit(write);
        scheduler.shutdown();

        // Two leading frames are trimmed, so the marker moves to frame 3.
        let bytes = fs::read(path).unwrap();
        let cue = bytes
            .windows(4)
            .position(|window| window == b"cue ")
            .unwrap();
        let offset = u32::from_le_bytes(bytes[cue + 32..cue + 36].try_into().unwrap());
        assert_eq!(offset, 3);
    }
}
