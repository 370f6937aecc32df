//! EncoreEngine that coordinates the audio subsystems

use crate::fetch::{TrackFetcher, TrackSource};
use crate::{Error, Result};
use encore_analysis::{Analyser, SharedSurface, Visualizer};
use encore_core::{
    AtomicCounter, AudioGraph, AudioHost, BufferSource, EffectCommand, EffectState, EngineConfig,
    GraphState, PcmBuffer, SourceKind, ToneControl, ToneSource,
};
use encore_sampler::{
    decode_track, CaptureConstraints, Microphone, MicrophoneStream, Recording, RecordingSession,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Seconds of microphone audio the monitoring queue holds.
const MONITOR_QUEUE_SECONDS: f64 = 0.1;

/// Engine lifecycle as seen by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No graph yet. The first `play()` or `initialize()` builds one.
    Uninitialized,
    /// Graph ready, nothing playing or recording.
    Idle,
    Playing,
    Recording,
    PlayingAndRecording,
    /// Torn down by `cleanup()`. The next operation re-initializes.
    Closed,
}

/// One source routed through the graph.
#[derive(Debug)]
struct PlaybackSession {
    kind: SourceKind,
    generation: u64,
    /// Graph time at which the source was connected.
    start: f64,
    /// `None` for the endless demo tone.
    duration: Option<f64>,
    tone: Option<ToneControl>,
}

impl PlaybackSession {
    fn elapsed(&self, now: f64) -> f64 {
        let elapsed = (now - self.start).max(0.0);
        match self.duration {
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }
}

/// Graph, playback and effect state. Locked before `Capture`.
struct Playback {
    graph: AudioGraph,
    session: Option<PlaybackSession>,
    effects: EffectState,
    /// Reported by `current_time()` while no session is active.
    frozen_time: f64,
}

impl Playback {
    /// End the active session, freezing its elapsed time.
    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.frozen_time = session.elapsed(self.graph.now());
            if self.graph.is_ready() {
                if let Err(e) = self.graph.stop_source() {
                    tracing::warn!("Failed to stop source: {}", e);
                }
            }
            tracing::debug!(
                generation = session.generation,
                elapsed = self.frozen_time,
                "Playback session ended"
            );
        }
    }

    fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !self.graph.status().has_ended(s.generation))
    }
}

/// Microphone and recorder. Locked after `Playback`.
#[derive(Default)]
struct Capture {
    stream: Option<MicrophoneStream>,
    recording: Option<RecordingSession>,
}

/// The karaoke audio engine.
///
/// Owns one audio graph, at most one playback session, at most one
/// recording session and at most one visualization loop. Every operation
/// takes `&self`; locks are never held across an `.await`.
///
/// # Example
///
/// ```
/// use encore::{EncoreEngine, EngineState, ManualHost, VirtualMicrophone};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let host = ManualHost::new(8000.0);
/// let mic = VirtualMicrophone::new(8000.0);
/// let engine = EncoreEngine::builder()
///     .host(host.clone())
///     .microphone(mic.clone())
///     .build()?;
///
/// engine.play(None).await?;
/// host.render(800);
/// assert_eq!(engine.state(), EngineState::Playing);
///
/// engine.start_recording().await?;
/// mic.push(&[(0.1, 0.1); 400]);
/// let take = engine.stop_recording().await?;
/// assert!(take.url.starts_with("data:audio/wav;base64,"));
///
/// engine.cleanup();
/// # Ok::<(), encore::Error>(())
/// # }).unwrap();
/// ```
pub struct EncoreEngine {
    config: EngineConfig,
    host: Arc<dyn AudioHost>,
    microphone: Option<Arc<dyn Microphone>>,
    fetcher: Arc<dyn TrackFetcher>,
    playback: Mutex<Playback>,
    capture: Mutex<Capture>,
    visualizer: Mutex<Visualizer>,
    /// Bumped by every `play()` and by `cleanup()`.
    generation: AtomicCounter,
}

impl EncoreEngine {
    pub fn builder() -> crate::EncoreEngineBuilder {
        crate::EncoreEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        host: Arc<dyn AudioHost>,
        microphone: Option<Arc<dyn Microphone>>,
        fetcher: Arc<dyn TrackFetcher>,
    ) -> Self {
        let effects = config.effects.sanitized();
        Self {
            playback: Mutex::new(Playback {
                graph: AudioGraph::new(config.clone()),
                session: None,
                effects,
                frozen_time: 0.0,
            }),
            capture: Mutex::new(Capture::default()),
            visualizer: Mutex::new(Visualizer::new(config.frame_rate)),
            generation: AtomicCounter::new(0),
            config,
            host,
            microphone,
            fetcher,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Audio graph
    // =========================================================================

    /// Build the graph if it is not ready. Idempotent.
    ///
    /// Fails with [`Error::AudioInit`] when the host has no usable output.
    pub fn initialize(&self) -> Result<()> {
        let mut playback = self.playback.lock();
        self.ensure_graph(&mut playback)
    }

    fn ensure_graph(&self, playback: &mut Playback) -> Result<()> {
        if playback.graph.is_ready() {
            return Ok(());
        }
        playback
            .graph
            .initialize(&*self.host)
            .map_err(Error::AudioInit)?;

        let analyser = match playback.graph.take_tap() {
            Some(tap) => Some(Analyser::from_config(tap, &self.config)?),
            None => None,
        };
        if let Some(analyser) = analyser {
            self.visualizer.lock().set_analyser(analyser);
        }
        Ok(())
    }

    /// Tear everything down. Safe to repeat; never fails.
    ///
    /// Stops playback, discards an unfinished recording, releases the
    /// microphone, cancels the visualization loop and closes the graph. A
    /// later operation re-initializes.
    pub fn cleanup(&self) {
        self.generation.add(1);

        let mut playback = self.playback.lock();
        playback.stop_session();

        {
            let mut capture = self.capture.lock();
            if capture.recording.take().is_some() {
                tracing::warn!("Recording discarded by cleanup");
            }
            if capture.stream.take().is_some() {
                tracing::debug!("Microphone released");
            }
        }
        if playback.graph.is_ready() {
            if let Err(e) = playback.graph.set_monitor(None) {
                tracing::warn!("Failed to detach monitor: {}", e);
            }
        }

        {
            let mut visualizer = self.visualizer.lock();
            visualizer.stop();
            visualizer.clear_analyser();
        }

        playback.graph.close();
    }

    pub fn state(&self) -> EngineState {
        let playback = self.playback.lock();
        match playback.graph.state() {
            GraphState::Uninitialized => EngineState::Uninitialized,
            GraphState::Closed => EngineState::Closed,
            GraphState::Ready => {
                let playing = playback.is_playing();
                let recording = self.capture.lock().recording.is_some();
                match (playing, recording) {
                    (true, true) => EngineState::PlayingAndRecording,
                    (true, false) => EngineState::Playing,
                    (false, true) => EngineState::Recording,
                    (false, false) => EngineState::Idle,
                }
            }
        }
    }

    /// Output sample rate, once the graph is ready.
    pub fn sample_rate(&self) -> Option<f64> {
        self.playback.lock().graph.sample_rate()
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Play a track, or the demo tone when `source` is `None`.
    ///
    /// Initializes the graph if needed and ends the active session first.
    /// Fetching and decoding run on a worker thread; if either fails the
    /// demo tone plays instead and the failure is only logged. If another
    /// `play()`, a `pause()` or a `cleanup()` happens while this one is
    /// decoding, this one connects nothing.
    ///
    /// `http(s)://` URLs go through the default fetcher only when the `http`
    /// feature is enabled (it is by default). Without it they fall back to
    /// the demo tone like any other fetch failure.
    ///
    /// Never blocks on the output: if the graph cannot take the source
    /// (for example the stream has stalled and its command queue is full),
    /// the failure is logged and nothing plays.
    pub async fn play(&self, source: Option<TrackSource>) -> Result<()> {
        let generation = self.generation.add(1) + 1;

        let sample_rate = {
            let mut playback = self.playback.lock();
            self.ensure_graph(&mut playback)?;
            playback.stop_session();
            playback.frozen_time = 0.0;
            playback
                .graph
                .sample_rate()
                .ok_or(Error::Core(encore_core::Error::NotInitialized))?
        };

        let decoded = match source {
            Some(source) => {
                let fetcher = Arc::clone(&self.fetcher);
                let result = offload("encore-decode", move || {
                    load_track(&*fetcher, source, sample_rate)
                })
                .await;
                match result {
                    Ok(buffer) => Some(buffer),
                    Err(e) => {
                        tracing::warn!("Track unavailable, playing demo tone: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        {
            let mut playback = self.playback.lock();
            if self.generation.get() != generation {
                tracing::debug!(generation, "Superseded before connecting");
                return Ok(());
            }
            if !playback.graph.is_ready() {
                tracing::debug!(generation, "Graph closed while loading");
                return Ok(());
            }

            let now = playback.graph.now();
            let (kind, duration, tone, connected) = match decoded {
                Some(buffer) => {
                    let duration = buffer.duration();
                    let source = Box::new(BufferSource::new(buffer));
                    let connected = playback.graph.set_source(source, generation);
                    (SourceKind::DecodedBuffer, Some(duration), None, connected)
                }
                None => {
                    let carrier = self.tone_frequency(&playback.effects);
                    let (tone, control) = ToneSource::new(&self.config.tone, carrier, sample_rate);
                    let connected = playback.graph.set_source(Box::new(tone), generation);
                    (SourceKind::SynthesizedTone, None, Some(control), connected)
                }
            };
            if let Err(e) = connected {
                tracing::warn!(generation, "Failed to connect source: {}", e);
                return Ok(());
            }

            let session = PlaybackSession {
                kind,
                generation,
                start: now,
                duration,
                tone,
            };
            tracing::info!(
                kind = ?session.kind,
                generation,
                duration = ?session.duration,
                "Playback started"
            );
            playback.session = Some(session);
        }

        self.visualizer.lock().reset_analyser();
        self.start_visualization_if_attached();
        Ok(())
    }

    /// Stop the active source and the visualization loop. Idempotent.
    ///
    /// A `play()` still loading when this runs connects nothing. Effect
    /// parameters are kept.
    pub fn pause(&self) {
        self.generation.add(1);
        self.playback.lock().stop_session();
        self.visualizer.lock().stop();
    }

    /// Seconds since the active session started.
    ///
    /// Never negative and never decreasing within a session. Frozen after
    /// `pause()`, clamped to the track length once a track has finished.
    pub fn current_time(&self) -> f64 {
        let playback = self.playback.lock();
        match &playback.session {
            Some(session) => session.elapsed(playback.graph.now()),
            None => playback.frozen_time,
        }
    }

    /// Length of the active track. `None` for the demo tone or when idle.
    pub fn duration(&self) -> Option<f64> {
        self.playback
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.duration)
    }

    /// Kind of the active source.
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.playback.lock().session.as_ref().map(|s| s.kind)
    }

    /// Whether a source is connected and has not run out.
    pub fn is_playing(&self) -> bool {
        self.playback.lock().is_playing()
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Apply one effect change to the live graph. Returns the command as
    /// applied, after clamping.
    pub fn apply_effect(&self, command: EffectCommand) -> EffectCommand {
        let mut playback = self.playback.lock();
        let applied = playback.effects.apply(command);
        match applied {
            EffectCommand::SetVolume(volume) => {
                playback.graph.params().set_gain(volume as f32);
            }
            EffectCommand::SetPitch(_) => {
                // Only the demo tone follows pitch; decoded tracks are untouched.
                let frequency = self.tone_frequency(&playback.effects);
                if let Some(tone) = playback.session.as_ref().and_then(|s| s.tone.as_ref()) {
                    tone.set_frequency(frequency);
                }
            }
            EffectCommand::SetReverb(mix) => {
                playback.graph.params().set_reverb_mix(mix as f32);
            }
            EffectCommand::SetAutoTune(enabled) => {
                tracing::info!(enabled, "Auto-tune flag stored");
            }
        }
        tracing::debug!(?applied, "Effect applied");
        applied
    }

    pub fn set_volume(&self, volume: f64) {
        self.apply_effect(EffectCommand::SetVolume(volume));
    }

    pub fn set_pitch(&self, semitones: i8) {
        self.apply_effect(EffectCommand::SetPitch(semitones));
    }

    pub fn set_reverb(&self, amount: f64) {
        self.apply_effect(EffectCommand::SetReverb(amount));
    }

    pub fn set_auto_tune(&self, enabled: bool) {
        self.apply_effect(EffectCommand::SetAutoTune(enabled));
    }

    pub fn effects(&self) -> EffectState {
        self.playback.lock().effects
    }

    fn tone_frequency(&self, effects: &EffectState) -> f32 {
        self.config.tone.carrier_hz * effects.pitch_ratio() as f32
    }

    // =========================================================================
    // Capture / recording
    // =========================================================================

    /// Open the microphone (reusing a held stream), start encoding it and
    /// route it into the gain stage for monitoring.
    ///
    /// Fails with [`Error::AlreadyRecording`], [`Error::PermissionDenied`]
    /// or [`Error::DeviceNotFound`].
    pub async fn start_recording(&self) -> Result<()> {
        let needs_device = {
            let mut playback = self.playback.lock();
            self.ensure_graph(&mut playback)?;
            let capture = self.capture.lock();
            if capture.recording.is_some() {
                return Err(Error::AlreadyRecording);
            }
            capture.stream.is_none()
        };

        let acquired = if needs_device {
            let microphone = self
                .microphone
                .clone()
                .ok_or_else(|| Error::DeviceNotFound("no microphone configured".into()))?;
            let stream = offload("encore-microphone", move || {
                Ok(microphone.open(&CaptureConstraints::default())?)
            })
            .await?;
            tracing::info!(
                sample_rate = stream.sample_rate(),
                honored = ?stream.honored_constraints(),
                "Microphone acquired"
            );
            Some(stream)
        } else {
            None
        };

        let mut playback = self.playback.lock();
        // A cleanup() while the device was opening closed the graph.
        self.ensure_graph(&mut playback)?;
        let mut capture = self.capture.lock();
        if capture.recording.is_some() {
            return Err(Error::AlreadyRecording);
        }
        if let Some(stream) = acquired {
            capture.stream.get_or_insert(stream);
        }
        let Some(stream) = capture.stream.as_ref() else {
            return Err(Error::DeviceNotFound("microphone released".into()));
        };

        let session = RecordingSession::start(stream, self.config.record_slice_ms)?;
        let monitor_capacity = (stream.sample_rate() * MONITOR_QUEUE_SECONDS).ceil() as usize;
        let monitor = stream.subscribe(monitor_capacity);
        if let Err(e) = playback.graph.set_monitor(Some(monitor)) {
            tracing::warn!("Monitoring unavailable: {}", e);
        }
        capture.recording = Some(session);
        tracing::info!("Recording started");
        Ok(())
    }

    /// Finish the take and release the microphone.
    ///
    /// Fails with [`Error::NotRecording`] when no recording is active,
    /// including on a second call.
    pub async fn stop_recording(&self) -> Result<Recording> {
        let (session, stream) = {
            let playback = self.playback.lock();
            let mut capture = self.capture.lock();
            let session = capture.recording.take().ok_or(Error::NotRecording)?;
            if playback.graph.is_ready() {
                if let Err(e) = playback.graph.set_monitor(None) {
                    tracing::warn!("Failed to detach monitor: {}", e);
                }
            }
            (session, capture.stream.take())
        };

        let recording = session.finish().await;
        drop(stream);
        let recording = recording?;
        tracing::info!(
            duration = recording.duration,
            bytes = recording.data.len(),
            "Recording stopped"
        );
        Ok(recording)
    }

    pub fn is_recording(&self) -> bool {
        self.capture.lock().recording.is_some()
    }

    /// Peak level of the most recent microphone block, `0.0` without a stream.
    pub fn input_level(&self) -> f32 {
        self.capture
            .lock()
            .stream
            .as_ref()
            .map_or(0.0, |s| s.peak_level())
    }

    // =========================================================================
    // Visualization
    // =========================================================================

    /// Attach the surface the visualization draws on.
    pub fn setup_visualization(&self, surface: SharedSurface) {
        self.visualizer.lock().set_surface(surface);
    }

    /// Start the frame loop, replacing a running one.
    ///
    /// Fails when no surface was attached.
    pub fn start_visualization(&self) -> Result<()> {
        self.visualizer.lock().start()?;
        Ok(())
    }

    /// Stop the frame loop. No frame is drawn after this returns.
    pub fn stop_visualization(&self) {
        self.visualizer.lock().stop();
    }

    pub fn is_visualizing(&self) -> bool {
        self.visualizer.lock().is_running()
    }

    /// Frames drawn by the current or most recent loop.
    pub fn frames_drawn(&self) -> u64 {
        self.visualizer.lock().frames_drawn()
    }

    fn start_visualization_if_attached(&self) {
        let mut visualizer = self.visualizer.lock();
        if !visualizer.has_surface() {
            return;
        }
        if let Err(e) = visualizer.start() {
            tracing::warn!("Visualization not started: {}", e);
        }
    }

    // =========================================================================
    // Devices
    // =========================================================================

    #[cfg(feature = "device")]
    pub fn list_output_devices() -> Result<Vec<String>> {
        Ok(encore_core::CpalHost::list_output_devices()?)
    }

    #[cfg(feature = "device")]
    pub fn list_input_devices() -> Vec<encore_sampler::InputDeviceInfo> {
        encore_sampler::CpalMicrophone::list_input_devices()
    }
}

impl Drop for EncoreEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for EncoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoreEngine")
            .field("host", &self.host.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Fetch and decode on the calling (worker) thread.
fn load_track(
    fetcher: &dyn TrackFetcher,
    source: TrackSource,
    sample_rate: f64,
) -> Result<PcmBuffer> {
    let buffer = match source {
        TrackSource::Bytes(bytes) => decode_track(bytes, None, sample_rate)?,
        TrackSource::Url(url) => {
            let fetched = fetcher.fetch(&url)?;
            decode_track(fetched.bytes, fetched.extension.as_deref(), sample_rate)?
        }
    };
    Ok(buffer)
}

/// Run blocking work on a named thread and await its result.
async fn offload<T, F>(name: &str, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(work());
        })?;
    rx.await.map_err(|_| Error::TaskAborted)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::ManualHost;
    use encore_sampler::VirtualMicrophone;

    fn engine(host: &ManualHost) -> EncoreEngine {
        EncoreEngine::builder()
            .host(host.clone())
            .microphone(VirtualMicrophone::new(host.sample_rate()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let host = ManualHost::new(8000.0);
        let engine = engine(&host);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.initialize().unwrap();
        engine.initialize().unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.sample_rate(), Some(8000.0));
    }

    #[test]
    fn test_unavailable_host() {
        let engine = EncoreEngine::builder()
            .host(ManualHost::unavailable())
            .build()
            .unwrap();
        assert!(matches!(engine.initialize(), Err(Error::AudioInit(_))));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_session_elapsed_is_clamped() {
        let session = PlaybackSession {
            kind: SourceKind::DecodedBuffer,
            generation: 1,
            start: 2.0,
            duration: Some(1.5),
            tone: None,
        };
        assert_eq!(session.elapsed(1.0), 0.0);
        assert_eq!(session.elapsed(3.0), 1.0);
        assert_eq!(session.elapsed(10.0), 1.5);
    }

    #[test]
    fn test_pitch_retunes_active_tone() {
        let host = ManualHost::new(8000.0);
        let engine = engine(&host);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(engine.play(None)).unwrap();

        engine.set_pitch(12);
        let playback = engine.playback.lock();
        let tone = playback.session.as_ref().unwrap().tone.as_ref().unwrap();
        assert!((tone.frequency() - 880.0).abs() < 1e-3);
    }

    #[test]
    fn test_new_tone_starts_at_stored_pitch() {
        let host = ManualHost::new(8000.0);
        let engine = engine(&host);
        engine.set_pitch(-12);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(engine.play(None)).unwrap();

        let playback = engine.playback.lock();
        let tone = playback.session.as_ref().unwrap().tone.as_ref().unwrap();
        assert!((tone.frequency() - 220.0).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_effects_are_clamped() {
        let host = ManualHost::new(8000.0);
        let engine = engine(&host);
        assert_eq!(
            engine.apply_effect(EffectCommand::SetVolume(3.0)),
            EffectCommand::SetVolume(1.0)
        );
        assert_eq!(
            engine.apply_effect(EffectCommand::SetPitch(-40)),
            EffectCommand::SetPitch(-12)
        );
        engine.set_reverb(-1.0);
        assert_eq!(engine.effects().reverb_mix, 0.0);
    }
}
