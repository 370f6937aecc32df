//! Builder for configuring and constructing an `EncoreEngine`.

use crate::fetch::{DefaultFetcher, TrackFetcher};
use crate::{EncoreEngine, Result};
use encore_core::{AudioHost, EffectState, EngineConfig};
use encore_sampler::Microphone;
use std::sync::Arc;

/// With the `device` feature, output and microphone default to the CPAL
/// devices. Without it, [`host`](Self::host) is required and recording needs
/// a [`microphone`](Self::microphone).
///
/// The sample rate is determined by the output host. Use
/// `engine.sample_rate()` after `initialize()` to query it.
///
/// # Example
///
/// ```
/// use encore::{EncoreEngine, ManualHost, VirtualMicrophone};
///
/// let engine = EncoreEngine::builder()
///     .host(ManualHost::new(48000.0))
///     .microphone(VirtualMicrophone::new(48000.0))
///     .frame_rate(30.0)
///     .build()?;
/// engine.initialize()?;
/// assert_eq!(engine.sample_rate(), Some(48000.0));
/// # Ok::<(), encore::Error>(())
/// ```
pub struct EncoreEngineBuilder {
    config: EngineConfig,
    host: Option<Arc<dyn AudioHost>>,
    microphone: Option<Arc<dyn Microphone>>,
    fetcher: Option<Arc<dyn TrackFetcher>>,

    #[cfg(feature = "device")]
    output_device: Option<usize>,
    #[cfg(feature = "device")]
    input_device: Option<usize>,
}

impl Default for EncoreEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            host: None,
            microphone: None,
            fetcher: None,

            #[cfg(feature = "device")]
            output_device: None,
            #[cfg(feature = "device")]
            input_device: None,
        }
    }
}

impl EncoreEngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Where the graph renders to.
    pub fn host(mut self, host: impl AudioHost + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    pub fn microphone(mut self, microphone: impl Microphone + 'static) -> Self {
        self.microphone = Some(Arc::new(microphone));
        self
    }

    /// Resolver for [`TrackSource::Url`](crate::TrackSource::Url). Default: [`DefaultFetcher`].
    pub fn fetcher(mut self, fetcher: impl TrackFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Effect parameters in place before the first command.
    pub fn effects(mut self, effects: EffectState) -> Self {
        self.config.effects = effects;
        self
    }

    /// Default: 60
    pub fn frame_rate(mut self, frame_rate: f32) -> Self {
        self.config.frame_rate = frame_rate;
        self
    }

    /// Default: 100
    pub fn record_slice_ms(mut self, slice_ms: u32) -> Self {
        self.config.record_slice_ms = slice_ms;
        self
    }

    /// Analyser transform size. Default: 256
    pub fn fft_size(mut self, fft_size: usize) -> Self {
        self.config.fft_size = fft_size;
        self
    }

    /// Analyser smoothing. Default: 0.8
    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.config.smoothing = smoothing;
        self
    }

    /// CPAL output device index. Ignored when a [`host`](Self::host) is given.
    #[cfg(feature = "device")]
    pub fn output_device(mut self, index: usize) -> Self {
        self.output_device = Some(index);
        self
    }

    /// CPAL input device index. Ignored when a [`microphone`](Self::microphone) is given.
    #[cfg(feature = "device")]
    pub fn input_device(mut self, index: usize) -> Self {
        self.input_device = Some(index);
        self
    }

    pub fn build(self) -> Result<EncoreEngine> {
        self.config.validate()?;

        #[cfg(feature = "device")]
        let host = self.host.unwrap_or_else(|| match self.output_device {
            Some(index) => Arc::new(encore_core::CpalHost::with_output_device(index)),
            None => Arc::new(encore_core::CpalHost::new()),
        });
        #[cfg(not(feature = "device"))]
        let host = self.host.ok_or_else(|| {
            crate::Error::AudioInit(encore_core::Error::NoOutput(
                "no audio host configured (enable feature \"device\" or call .host())".into(),
            ))
        })?;

        #[cfg(feature = "device")]
        let microphone = self.microphone.or_else(|| {
            let mic = match self.input_device {
                Some(index) => encore_sampler::CpalMicrophone::with_device(index),
                None => encore_sampler::CpalMicrophone::new(),
            };
            Some(Arc::new(mic) as Arc<dyn Microphone>)
        });
        #[cfg(not(feature = "device"))]
        let microphone = self.microphone;

        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(DefaultFetcher::new()));

        tracing::debug!(host = host.name(), "Building engine");

        Ok(EncoreEngine::from_parts(self.config, host, microphone, fetcher))
    }
}
