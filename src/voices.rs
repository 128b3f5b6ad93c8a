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
use std::{fmt, path::PathBuf};

use tracing::info;

const KEYS: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One program/note/velocity combination to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    /// None when no program change is sent.
    pub program: Option<u8>,
    pub note: u8,
    pub velocity: u8,
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(program) = self.program {
            write!(f, "program {} ", program)?;
        }
        write!(
            f,
            "note {} ({}) velocity {}",
            self.note,
            note_name(self.note),
            self.velocity
        )
    }
}

/// The name of a MIDI note, with octaves numbered so that note 0 is C-2.
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 2;
    format!("{}{}", KEYS[(note % 12) as usize], octave)
}

/// Renders output paths for voices.
#[derive(Debug, Clone)]
pub struct FilenameTemplate {
    template: String,
}

impl FilenameTemplate {
    pub fn new(template: &str) -> FilenameTemplate {
        FilenameTemplate {
            template: template.to_string(),
        }
    }

    pub fn render(&self, voice: &Voice) -> PathBuf {
        let rendered = self
            .template
            .replace("{program}", &format!("{:03}", voice.program.unwrap_or(0)))
            .replace("{note}", &format!("{:03}", voice.note))
            .replace("{velocity}", &format!("{:03}", voice.velocity))
            .replace("{key}", &note_name(voice.note));
        PathBuf::from(rendered)
    }
}

/// A voice along with where it will be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVoice {
    pub voice: Voice,
    pub path: PathBuf,
}

/// Builds the ordered list of voices to record. Programs vary slowest and notes
/// fastest, so that each program change is followed by every voice that uses
/// it. Voices whose file already exists are dropped when skip_existing is set.
pub fn sequence(
    programs: &[u8],
    velocities: &[u8],
    notes: &[u8],
    template: &FilenameTemplate,
    skip_existing: bool,
) -> Vec<PlannedVoice> {
    let programs: Vec<Option<u8>> = if programs.is_empty() {
        vec![None]
    } else {
        programs.iter().copied().map(Some).collect()
    };

    let mut planned = Vec::with_capacity(programs.len() * velocities.len() * notes.len());
    for program in programs.iter().copied() {
        for velocity in velocities.iter().copied() {
            for note in notes.iter().copied() {
                let voice = Voice {
                    program,
                    note,
                    velocity,
                };
                let path = template.render(&voice);
                if skip_existing && path.exists() {
                    info!(path = %path.display(), "File exists, skipping voice.");
                    continue;
                }
                planned.push(PlannedVoice { voice, path });
            }
        }
    }
    planned
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn note_names() {
        assert_eq!(note_name(0), "C-2");
        assert_eq!(note_name(24), "C0");
        assert_eq!(note_name(61), "C#3");
        assert_eq!(note_name(127), "G8");
    }

    #[test]
    fn render() {
        let template = FilenameTemplate::new("{program}/{note}_{key}_{velocity}.wav");
        let voice = Voice {
            program: Some(5),
            note: 24,
            velocity: 127,
        };
        assert_eq!(template.render(&voice), PathBuf::from("005/024_C0_127.wav"));

        let voice = Voice {
            program: None,
            note: 1,
            velocity: 9,
        };
        assert_eq!(template.render(&voice), PathBuf::from("000/001_C#-2_009.wav"));
    }

    #[test]
    fn order_and_count() {
        let template = FilenameTemplate::new("{program}_{note}_{velocity}.wav");
        let planned = sequence(&[1, 2], &[100, 50], &[60, 61, 62], &template, false);
        assert_eq!(planned.len(), 12);

        let voices: Vec<(Option<u8>, u8, u8)> = planned
            .iter()
            .map(|p| (p.voice.program, p.voice.velocity, p.voice.note))
            .collect();
        assert_eq!(&voices[..4], &[
            (Some(1), 100, 60),
            (Some(1), 100, 61),
            (Some(1), 100, 62),
            (Some(1), 50, 60),
        ]);
        assert_eq!(voices[6], (Some(2), 100, 60));
        assert_eq!(voices[11], (Some(2), 50, 62));
    }

    #[test]
    fn no_programs() {
        let template = FilenameTemplate::new("{note}.wav");
        let planned = sequence(&[], &[127], &[1, 2], &template, false);
        assert_eq!(planned.len(), 2);
        assert!(planned.iter().all(|p| p.voice.program.is_none()));
    }

    #[test]
    fn skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        let template = FilenameTemplate::new(
            dir.path()
                .join("{note}.wav")
                .to_str()
                .unwrap(),
        );
        fs::write(dir.path().join("061.wav"), b"").unwrap();

        let planned = sequence(&[], &[127], &[60, 61, 62], &template, true);
        let notes: Vec<u8> = planned.iter().map(|p| p.voice.note).collect();
        assert_eq!(notes, vec![60, 62]);

        let planned = sequence(&[], &[127], &[60, 61, 62], &template, false);
        assert_eq!(planned.len(), 3);
    }
}
