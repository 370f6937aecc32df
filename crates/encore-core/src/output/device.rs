//! CPAL audio output.

use super::{AudioBackend, AudioHost};
use crate::callback::GraphProcessor;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The backend owning it
/// lives behind the engine's mutex and drops the stream on `stop()`.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: The stream is only touched by the backend that created it, which is
// itself only accessed behind a Mutex, so it is never used concurrently.
unsafe impl Send for StreamHandle {}

/// Host backed by the system's audio devices.
#[derive(Debug, Clone, Default)]
pub struct CpalHost {
    output_device_index: Option<usize>,
}

impl CpalHost {
    /// Use the default output device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device at `index` in [`CpalHost::list_output_devices`].
    pub fn with_output_device(index: usize) -> Self {
        Self {
            output_device_index: Some(index),
        }
    }

    /// List available output devices as `"index: name"`.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Result<Vec<String>> = host
            .output_devices()?
            .enumerate()
            .map(|(idx, device)| Ok(format!("{}: {}", idx, device.name()?)))
            .collect();
        devices
    }

    /// Name of the device this host would open.
    pub fn current_output_device_name(&self) -> Result<String> {
        let device = get_device(self.output_device_index)?;
        Ok(device.name()?)
    }
}

impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self) -> Result<Box<dyn AudioBackend>> {
        let device = get_device(self.output_device_index)?;
        let output_config = device.default_output_config()?;

        Ok(Box::new(CpalBackend {
            sample_rate: output_config.sample_rate().0 as f64,
            channels: output_config.channels() as usize,
            output_device_index: self.output_device_index,
            stream: None,
        }))
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(idx) = index {
        let devices: Vec<_> = host.output_devices()?.collect();

        let device_count = devices.len();
        devices.into_iter().nth(idx).ok_or_else(|| {
            Error::InvalidDevice(format!(
                "Output device index {} out of range (available: {})",
                idx, device_count
            ))
        })
    } else {
        host.default_output_device()
            .ok_or_else(|| Error::NoOutput("No output device available".to_string()))
    }
}

/// An output stream on a CPAL device.
pub struct CpalBackend {
    sample_rate: f64,
    channels: usize,
    output_device_index: Option<usize>,
    stream: Option<StreamHandle>,
}

impl CpalBackend {
    pub fn channels(&self) -> usize {
        self.channels
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut processor: GraphProcessor,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::with_capacity(4096 * 2);

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let frames = data.len() / channels;
                    scratch.resize(frames * 2, 0.0);

                    processor.render(&mut scratch);

                    for (i, sample) in data.iter_mut().enumerate() {
                        let channel = i % channels;
                        let frame = i / channels;
                        let value = if channels == 1 {
                            (scratch[frame * 2] + scratch[frame * 2 + 1]) * 0.5
                        } else if channel < 2 {
                            scratch[frame * 2 + channel]
                        } else {
                            0.0
                        };
                        *sample = T::from_sample(value);
                    }
                }));

                if result.is_err() {
                    // Panic in callback - output silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |err| {
                tracing::error!("Audio output stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn start(&mut self, processor: GraphProcessor) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = get_device(self.output_device_index)?;
        let config = device.default_output_config()?;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), processor)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), processor)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), processor)?
            }
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream.play()?;
        self.stream = Some(StreamHandle(stream));
        Ok(())
    }

    fn stop(&mut self) {
        self.stream = None;
    }

    fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Holds with or without audio hardware: no host has this many outputs.
    #[test]
    fn test_out_of_range_device_is_rejected() {
        let host = CpalHost::with_output_device(usize::MAX);
        assert!(host.current_output_device_name().is_err());
        assert!(host.open().is_err());
    }
}
