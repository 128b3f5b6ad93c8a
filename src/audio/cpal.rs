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

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, warn, Level};

use super::format::SampleEncoding;
use super::{ErrorHandler, FrameSink, StreamFormat};
use crate::config;
use crate::devices::{self, DeviceInfo};
use crate::error::Error;

/// A small wrapper around a cpal::Device opened for input.
pub struct Device {
    info: DeviceInfo,
    /// The underlying cpal device.
    device: cpal::Device,
    format: StreamFormat,
    block_size: u32,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.info.name, self.info.max_channels, self.info.api
        )
    }
}

/// The cpal sample format a stream is opened with. 24-bit capture runs on a
/// 32-bit stream and is repacked.
fn stream_sample_format(encoding: SampleEncoding) -> cpal::SampleFormat {
    match encoding {
        SampleEncoding::U8 => cpal::SampleFormat::U8,
        SampleEncoding::I16 => cpal::SampleFormat::I16,
        SampleEncoding::I24 | SampleEncoding::I32 => cpal::SampleFormat::I32,
        SampleEncoding::F32 => cpal::SampleFormat::F32,
    }
}

impl Device {
    /// Lists cpal input devices.
    pub fn list() -> Result<Vec<DeviceInfo>, Error> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|(info, _)| info)
            .collect())
    }

    fn list_cpal_devices() -> Result<Vec<(DeviceInfo, cpal::Device)>, Error> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| Error::AudioInput(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| Error::AudioInput(e.to_string()))?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to open host"
                    );
                    continue;
                }
            };
            let host_devices = match host.input_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for (id, device) in host_devices.enumerate() {
                let Ok(input_configs) = device.supported_input_configs() else {
                    continue;
                };
                let max_channels = input_configs
                    .map(|input_config| input_config.channels())
                    .max()
                    .unwrap_or(0);
                if max_channels == 0 {
                    continue;
                }

                let Ok(name) = device.name() else {
                    continue;
                };
                let default_sample_rate = device
                    .default_input_config()
                    .ok()
                    .map(|config| config.sample_rate().0);

                devices.push((
                    DeviceInfo {
                        name,
                        api: host_id.name().to_string(),
                        id,
                        max_channels,
                        default_sample_rate,
                    },
                    device,
                ));
            }
        }

        Ok(devices)
    }

    /// Gets the cpal device described by the configuration. Devices with fewer
    /// input channels than requested are not considered.
    pub fn get(config: &config::Audio, requested: StreamFormat) -> Result<Device, Error> {
        let span = span!(Level::INFO, "get device (cpal)");
        let _enter = span.enter();

        let (infos, cpal_devices): (Vec<DeviceInfo>, Vec<cpal::Device>) =
            Device::list_cpal_devices()?
                .into_iter()
                .filter(|(info, _)| info.max_channels >= requested.channels)
                .unzip();

        let info = devices::select(&infos, config.device(), config.host())
            .ok_or_else(|| Error::InputDeviceNotFound(config.device().to_string()))?;
        let device = cpal_devices
            .into_iter()
            .zip(infos.iter())
            .find(|(_, candidate)| *candidate == info)
            .map(|(device, _)| device)
            .ok_or_else(|| Error::InputDeviceNotFound(config.device().to_string()))?;

        let sample_format = stream_sample_format(requested.encoding);
        let matching: Vec<cpal::SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| Error::AudioInput(e.to_string()))?
            .filter(|range| {
                range.sample_format() == sample_format && range.channels() >= requested.channels
            })
            .collect();
        if matching.is_empty() {
            return Err(Error::UnsupportedBitDepth(format!(
                "{} is not supported by {}",
                requested.encoding, info.name
            )));
        }

        // If the device can't run at the requested rate, report the rate it
        // would actually use so the caller can refuse to record.
        let supports_rate = matching.iter().any(|range| {
            range.min_sample_rate().0 <= requested.sample_rate
                && requested.sample_rate <= range.max_sample_rate().0
        });
        let sample_rate = if supports_rate {
            requested.sample_rate
        } else {
            let actual = info.default_sample_rate.unwrap_or(matching[0].max_sample_rate().0);
            warn!(
                device = info.name,
                requested = requested.sample_rate,
                actual,
                "Device does not support the requested sample rate."
            );
            actual
        };

        info!(device = info.name, api = info.api, "Using audio input device.");
        Ok(Device {
            info: info.clone(),
            device,
            format: StreamFormat {
                sample_rate,
                ..requested
            },
            block_size: config.block_size(),
        })
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.info.name.clone()
    }

    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(
        &self,
        mut sink: Box<dyn FrameSink>,
        mut on_error: ErrorHandler,
    ) -> Result<Box<dyn super::Stream>, Error> {
        let span = span!(Level::INFO, "start capture (cpal)");
        let _enter = span.enter();

        let format = self.format;
        let stream_config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.block_size),
        };
        let channels = format.channels as usize;
        let repack = format.encoding == SampleEncoding::I24;

        // Preallocated so the callback never allocates while repacking.
        let mut scratch: Vec<u8> = Vec::with_capacity(
            self.block_size as usize * channels * SampleEncoding::I24.bytes_per_sample(),
        );
        let mut delivering = true;

        let stream = self
            .device
            .build_input_stream_raw(
                &stream_config,
                stream_sample_format(format.encoding),
                move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                    if !delivering {
                        return;
                    }
                    let frames = data.len() / channels;
                    let bytes = data.bytes();
                    delivering = if repack {
                        scratch.clear();
                        // Keep the upper three bytes of each little endian i32.
                        for sample in bytes.chunks_exact(4) {
                            scratch.extend_from_slice(&sample[1..4]);
                        }
                        sink.on_frames(&scratch, frames)
                    } else {
                        sink.on_frames(bytes, frames)
                    };
                },
                move |err| {
                    error!("CPAL input stream error: {}", err);
                    on_error(Error::AudioInput(err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::AudioInput(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::AudioInput(e.to_string()))?;

        info!(
            device = self.info.name,
            format = format.encoding.to_string(),
            channels = format.channels,
            sample_rate = format.sample_rate,
            "Capture started."
        );
        Ok(Box::new(Stream {
            stream: Some(stream),
        }))
    }
}

/// Holds the cpal stream open until stopped.
pub struct Stream {
    stream: Option<cpal::Stream>,
}

impl super::Stream for Stream {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!(err = e.to_string(), "Unable to pause input stream.");
            }
        }
    }
}
