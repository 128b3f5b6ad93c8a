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
use std::path::Path;

use ::config::File;
use serde::Deserialize;

use self::error::ConfigError;

pub use self::audio::Audio;
pub use self::midi::Midi;
pub use self::output::Output;
pub use self::timing::Timing;
pub use self::values::ValueList;

pub mod audio;
pub mod error;
pub mod midi;
pub mod output;
pub mod timing;
pub mod values;

/// The full recording configuration. Loaded once and read-only afterwards.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    audio: Audio,
    midi: Midi,

    /// Notes to record (default: 0-127)
    notes: Option<ValueList>,

    /// Velocities to record (default: 127)
    velocities: Option<ValueList>,

    /// Program changes to record. When empty no program change is sent.
    programs: Option<ValueList>,

    timing: Option<Timing>,

    output: Output,
}

impl Config {
    /// Loads and validates the configuration file at the given path.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config: Config = ::config::Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn new(audio: Audio, midi: Midi, output: Output) -> Config {
        Config {
            audio,
            midi,
            notes: None,
            velocities: None,
            programs: None,
            timing: None,
            output,
        }
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi(&self) -> &Midi {
        &self.midi
    }

    pub fn notes(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.notes {
            Some(notes) => notes.values(),
            None => Ok((0..=127).collect()),
        }
    }

    pub fn velocities(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.velocities {
            Some(velocities) => velocities.values(),
            None => Ok(vec![127]),
        }
    }

    pub fn programs(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.programs {
            Some(programs) => programs.values(),
            None => Ok(Vec::new()),
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing.clone().unwrap_or_default()
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Checks every range constraint so that the sampler can assume a sane
    /// configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.midi.validate()?;
        self.output.validate()?;
        self.timing().validate()?;
        self.notes()?;
        self.programs()?;
        if self.velocities()?.is_empty() {
            return Err(ConfigError::Invalid("at least one velocity is required".into()));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn with_values(
        mut self,
        notes: ValueList,
        velocities: ValueList,
        programs: Option<ValueList>,
        timing: Timing,
    ) -> Config {
        self.notes = Some(notes);
        self.velocities = Some(velocities);
        self.programs = programs;
        self.timing = Some(timing);
        self
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use ::config::{File, FileFormat};

    use super::*;
    use crate::audio::format::SampleEncoding;

    fn parse(yaml: &str) -> Result<Config, ConfigError> {
        let config: Config = ::config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn defaults() {
        let config = parse(
            r#"
            audio:
              device: UltraLite-mk5
            midi:
              device: Synth
            output:
              filename: "samples/{note}_{velocity}.wav"
            "#,
        )
        .unwrap();

        assert_eq!(config.audio().device(), "UltraLite-mk5");
        assert_eq!(config.audio().host(), None);
        assert_eq!(config.audio().sample_rate(), 48000);
        assert_eq!(config.audio().encoding().unwrap(), SampleEncoding::I24);
        assert_eq!(config.audio().channels(), 1);
        assert_eq!(config.audio().block_size(), 1024);
        assert_eq!(config.midi().channel(), 0);
        assert_eq!(config.midi().release_velocity(), 0);
        assert_eq!(config.notes().unwrap().len(), 128);
        assert_eq!(config.velocities().unwrap(), vec![127]);
        assert!(config.programs().unwrap().is_empty());
        assert!(config.output().skip_existing());
        assert!(!config.output().release_marker());

        let timing = config.timing();
        assert_eq!(timing.noise_floor().unwrap(), Duration::from_secs(2));
        assert_eq!(timing.pre_roll().unwrap(), Duration::from_millis(500));
        assert_eq!(timing.sustain().unwrap(), Duration::from_secs(3));
        assert_eq!(timing.release().unwrap(), Duration::from_secs(1));
        assert_eq!(timing.post_roll().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn full() {
        let config = parse(
            r#"
            audio:
              device: UltraLite-mk5
              host: ALSA
              sample_rate: 96000
              bits_per_sample: 32
              sample_format: int
              channels: 2
              block_size: 256
            midi:
              device: Synth
              api: ALSA
              channel: 9
              release_velocity: 64
            notes: "36-38;60"
            velocities: [127, 64]
            programs: 5
            timing:
              noise_floor: 1s
              pre_roll: 250ms
              sustain: 2s
              release: 500ms
              post_roll: 100ms
            output:
              filename: "{program}/{note}_{key}_{velocity}.wav"
              skip_existing: false
              release_marker: true
              write_threads: 3
            "#,
        )
        .unwrap();

        assert_eq!(config.audio().host(), Some("ALSA"));
        assert_eq!(config.audio().encoding().unwrap(), SampleEncoding::I32);
        assert_eq!(config.audio().channels(), 2);
        assert_eq!(config.midi().api(), Some("ALSA"));
        assert_eq!(config.midi().channel(), 9);
        assert_eq!(config.midi().release_velocity(), 64);
        assert_eq!(config.notes().unwrap(), vec![36, 37, 38, 60]);
        assert_eq!(config.velocities().unwrap(), vec![127, 64]);
        assert_eq!(config.programs().unwrap(), vec![5]);
        assert_eq!(
            config.timing().pre_roll().unwrap(),
            Duration::from_millis(250)
        );
        assert!(!config.output().skip_existing());
        assert!(config.output().release_marker());
        assert_eq!(config.output().write_threads(), 3);
    }

    #[test]
    fn invalid() {
        let base = |extra: &str, channel: u8, filename: &str| {
            parse(&format!(
                r#"
audio:
  device: dev
midi:
  device: synth
  channel: {channel}
output:
  filename: "{filename}"
{extra}
"#
            ))
        };

        assert!(base("", 0, "x.wav").is_ok());
        assert!(matches!(base("", 16, "x.wav"), Err(ConfigError::Invalid(_))));
        assert!(matches!(base("", 0, ""), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            base("notes: 128", 0, "x.wav"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            base("timing:\n  sustain: forever", 0, "x.wav"),
            Err(ConfigError::Duration { .. })
        ));
    }
}
