//! Hardware microphone input via CPAL.

use super::{CaptureConstraints, CaptureFanout, Microphone, MicrophoneStream};
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::Arc;

/// Input device information
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    /// Device index
    pub index: usize,
    /// Device name
    pub name: String,
    /// Number of input channels
    pub channels: u16,
    /// Default sample rate
    pub sample_rate: u32,
}

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: The stream is owned by a MicrophoneStream that is only reached
// through the engine's mutex and is never used concurrently.
unsafe impl Send for StreamHandle {}

/// Microphone on a CPAL input device.
///
/// CPAL exposes no voice processing, so every constraint is reported as not
/// honored.
#[derive(Debug, Clone, Default)]
pub struct CpalMicrophone {
    device_index: Option<usize>,
}

impl CpalMicrophone {
    /// Use the default input device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the input device at `index` in [`CpalMicrophone::list_input_devices`].
    pub fn with_device(index: usize) -> Self {
        Self {
            device_index: Some(index),
        }
    }

    pub fn list_input_devices() -> Vec<InputDeviceInfo> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        if let Ok(input_devices) = host.input_devices() {
            for (idx, device) in input_devices.enumerate() {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

                let (channels, sample_rate) = match device.default_input_config() {
                    Ok(config) => (config.channels(), config.sample_rate().0),
                    Err(_) => (2, 44100),
                };

                devices.push(InputDeviceInfo {
                    index: idx,
                    name,
                    channels,
                    sample_rate,
                });
            }
        }

        devices
    }

    fn device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match self.device_index {
            Some(idx) => {
                let devices: Vec<_> = host.input_devices()?.collect();
                let count = devices.len();
                devices.into_iter().nth(idx).ok_or_else(|| {
                    Error::DeviceNotFound(format!(
                        "Device index {} out of range (0-{})",
                        idx,
                        count.saturating_sub(1)
                    ))
                })
            }
            None => host
                .default_input_device()
                .ok_or_else(|| Error::DeviceNotFound("No input device available".into())),
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        fanout: Arc<CaptureFanout>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::with_capacity(4096);

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
                    fanout.push_interleaved(&scratch, channels);
                },
                |err| {
                    tracing::error!("Audio input stream error: {}", err);
                },
                None,
            )
            .map_err(map_build_error)
    }
}

/// Platforms report a refused microphone as a backend error; surface it as
/// a permission problem so hosts can prompt the user.
fn map_build_error(err: cpal::BuildStreamError) -> Error {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            Error::DeviceNotFound("input device not available".into())
        }
        cpal::BuildStreamError::BackendSpecific { err } => {
            let description = err.description.to_lowercase();
            if description.contains("permission")
                || description.contains("denied")
                || description.contains("not authorized")
            {
                Error::PermissionDenied(err.description)
            } else {
                Error::AudioInput(err.description)
            }
        }
        other => Error::AudioInput(other.to_string()),
    }
}

impl Microphone for CpalMicrophone {
    fn open(&self, constraints: &CaptureConstraints) -> Result<MicrophoneStream> {
        let device = self.device()?;
        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0 as f64;
        let config: cpal::StreamConfig = supported.config();
        let fanout = Arc::new(CaptureFanout::new());

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, fanout.clone())?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, fanout.clone())?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, fanout.clone())?,
            format => {
                return Err(Error::AudioInput(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };
        stream.play()?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels = config.channels,
            requested = ?constraints,
            "Microphone opened"
        );

        Ok(MicrophoneStream::new(
            sample_rate,
            fanout,
            CaptureConstraints::NONE,
            Box::new(StreamHandle(stream)),
        ))
    }
}
