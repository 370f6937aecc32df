//! Audio graph lifecycle and control side of the node chain.

pub mod reverb;
pub mod source;
pub mod tap;

use crate::callback::{GraphCommand, GraphProcessor};
use crate::clock::GraphClock;
use crate::config::{validate_sample_rate, EngineConfig};
use crate::lockfree::{AtomicCounter, AtomicFloat};
use crate::output::{AudioBackend, AudioHost};
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use reverb::{impulse_response, Reverb};
use source::Source;
use std::sync::Arc;
use tap::TapReader;

/// Capacity of the control -> render command queue.
const COMMAND_CAPACITY: usize = 64;

/// Capacity of the queue returning finished sources to the control thread.
const RETIRED_CAPACITY: usize = 16;

/// Lifecycle of an [`AudioGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Ready,
    Closed,
}

/// Parameters read by the render callback once per block.
#[derive(Debug)]
pub struct GraphParams {
    gain: AtomicFloat,
    reverb_mix: AtomicFloat,
}

impl GraphParams {
    pub fn new(gain: f32, reverb_mix: f32) -> Self {
        Self {
            gain: AtomicFloat::new(gain),
            reverb_mix: AtomicFloat::new(reverb_mix),
        }
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    #[inline]
    pub fn reverb_mix(&self) -> f32 {
        self.reverb_mix.get()
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.set(gain);
    }

    pub fn set_reverb_mix(&self, mix: f32) {
        self.reverb_mix.set(mix);
    }
}

/// Which source generation the callback is playing, and which ran out.
#[derive(Debug, Default)]
pub struct SourceStatus {
    requested: AtomicCounter,
    active: AtomicCounter,
    ended: AtomicCounter,
}

impl SourceStatus {
    /// Generation currently rendered, `0` when the source head is silent.
    pub fn active(&self) -> u64 {
        self.active.get()
    }

    /// Whether `generation` played to its natural end.
    pub fn has_ended(&self, generation: u64) -> bool {
        generation != 0 && self.ended.get() == generation
    }

    /// Generation the control side last asked for, `0` after a stop.
    /// Queued sources from any other generation are skipped.
    pub fn requested(&self) -> u64 {
        self.requested.get()
    }

    pub(crate) fn request(&self, generation: u64) {
        self.requested.set(generation);
    }

    pub(crate) fn mark_active(&self, generation: u64) {
        self.active.set(generation);
    }

    pub(crate) fn mark_ended(&self, generation: u64) {
        self.ended.set(generation);
        self.active.set(0);
    }
}

/// Control-side owner of the node chain and its output backend.
///
/// Parameter changes go through shared atomics and never re-wire the chain.
/// At most one backend is live per graph.
pub struct AudioGraph {
    state: GraphState,
    config: EngineConfig,
    params: Arc<GraphParams>,
    status: Arc<SourceStatus>,
    clock: Option<Arc<GraphClock>>,
    commands: Option<Sender<GraphCommand>>,
    retired: Option<Receiver<Box<dyn Source>>>,
    tap: Option<TapReader>,
    backend: Option<Box<dyn AudioBackend>>,
}

impl AudioGraph {
    pub fn new(config: EngineConfig) -> Self {
        let effects = config.effects.sanitized();
        Self {
            state: GraphState::Uninitialized,
            params: Arc::new(GraphParams::new(
                effects.volume as f32,
                effects.reverb_mix as f32,
            )),
            status: Arc::new(SourceStatus::default()),
            config,
            clock: None,
            commands: None,
            retired: None,
            tap: None,
            backend: None,
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == GraphState::Ready
    }

    /// Build the node chain and start it on an output from `host`.
    ///
    /// A no-op while the graph is ready. A closed graph is rebuilt.
    pub fn initialize(&mut self, host: &dyn AudioHost) -> Result<()> {
        if self.state == GraphState::Ready {
            return Ok(());
        }

        let mut backend = host.open()?;
        let sample_rate = backend.sample_rate();
        validate_sample_rate(sample_rate)?;

        let clock = Arc::new(GraphClock::new(sample_rate));
        let (command_tx, command_rx) = crossbeam_channel::bounded(COMMAND_CAPACITY);
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);
        let (tap_producer, tap_reader) = tap::tap(self.config.tap_capacity);

        let impulse = impulse_response(
            sample_rate,
            self.config.impulse_seconds,
            self.config.impulse_decay,
            &mut rand::thread_rng(),
        );
        let reverb = Reverb::new(&impulse, self.config.reverb_block_size);

        let processor = GraphProcessor::new(
            command_rx,
            retired_tx,
            clock.clone(),
            self.params.clone(),
            self.status.clone(),
            reverb,
            tap_producer,
            self.config.ramp_seconds,
        );
        backend.start(processor)?;

        tracing::info!(host = host.name(), sample_rate, "Audio graph ready");

        self.status.mark_active(0);
        self.clock = Some(clock);
        self.commands = Some(command_tx);
        self.retired = Some(retired_rx);
        self.tap = Some(tap_reader);
        self.backend = Some(backend);
        self.state = GraphState::Ready;
        Ok(())
    }

    /// Stop the backend and release the chain. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
        self.commands = None;
        self.retired = None;
        self.tap = None;
        self.clock = None;
        self.status.request(0);
        self.status.mark_active(0);
        if self.state != GraphState::Closed {
            tracing::debug!("Audio graph closed");
        }
        self.state = GraphState::Closed;
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.clock.as_ref().map(|c| c.sample_rate())
    }

    /// Current graph time in seconds, `0.0` when not running.
    pub fn now(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, |c| c.now())
    }

    pub fn clock(&self) -> Option<Arc<GraphClock>> {
        self.clock.clone()
    }

    pub fn params(&self) -> &Arc<GraphParams> {
        &self.params
    }

    pub fn status(&self) -> &Arc<SourceStatus> {
        &self.status
    }

    /// Hand out the analyser tap. Only one reader exists per initialization.
    pub fn take_tap(&mut self) -> Option<TapReader> {
        self.tap.take()
    }

    /// Connect `source` at the head of the chain, replacing any other.
    ///
    /// Even when the command cannot be queued, sources queued earlier
    /// under other generations will not start.
    pub fn set_source(&self, source: Box<dyn Source>, generation: u64) -> Result<()> {
        self.status.request(generation);
        self.send(GraphCommand::SetSource { source, generation })
    }

    pub fn stop_source(&self) -> Result<()> {
        self.status.request(0);
        self.send(GraphCommand::StopSource)
    }

    /// Route a live input into the gain stage (`None` disconnects).
    pub fn set_monitor(&self, monitor: Option<Receiver<(f32, f32)>>) -> Result<()> {
        self.send(GraphCommand::SetMonitor(monitor))
    }

    /// Queue a command for the render callback without blocking. The queue
    /// only drains while the output pulls audio, so a stalled stream
    /// surfaces as [`Error::CommandQueueFull`].
    fn send(&self, command: GraphCommand) -> Result<()> {
        self.collect_retired();
        let commands = self.commands.as_ref().ok_or(match self.state {
            GraphState::Closed => Error::GraphClosed,
            _ => Error::NotInitialized,
        })?;
        commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => Error::CommandQueueFull,
            TrySendError::Disconnected(_) => Error::Disconnected,
        })
    }

    /// Drop sources the callback has finished with.
    fn collect_retired(&self) {
        if let Some(retired) = &self.retired {
            while retired.try_recv().is_ok() {}
        }
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::source::{BufferSource, PcmBuffer, ToneSource};
    use crate::output::ManualHost;

    fn test_config() -> EngineConfig {
        EngineConfig {
            impulse_seconds: 0.1,
            reverb_block_size: 64,
            ramp_seconds: 0.0,
            ..Default::default()
        }
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32).sqrt()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let host = ManualHost::new(8000.0);
        let mut graph = AudioGraph::new(test_config());
        assert_eq!(graph.state(), GraphState::Uninitialized);
        graph.initialize(&host).unwrap();
        graph.initialize(&host).unwrap();
        assert!(graph.is_ready());
        assert_eq!(graph.sample_rate(), Some(8000.0));
    }

    #[test]
    fn test_unavailable_host_fails() {
        let host = ManualHost::unavailable();
        let mut graph = AudioGraph::new(test_config());
        assert!(matches!(graph.initialize(&host), Err(Error::NoOutput(_))));
        assert_eq!(graph.state(), GraphState::Uninitialized);
    }

    #[test]
    fn test_close_then_reinitialize() {
        let host = ManualHost::new(8000.0);
        let mut graph = AudioGraph::new(test_config());
        graph.initialize(&host).unwrap();
        graph.close();
        graph.close();
        assert_eq!(graph.state(), GraphState::Closed);
        assert!(matches!(graph.stop_source(), Err(Error::GraphClosed)));

        graph.initialize(&host).unwrap();
        assert!(graph.is_ready());
        assert!(graph.stop_source().is_ok());
    }

    #[test]
    fn test_commands_before_initialize_fail() {
        let graph = AudioGraph::new(test_config());
        assert!(matches!(graph.stop_source(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_full_queue_fails_without_blocking() {
        let host = ManualHost::new(8000.0);
        let mut graph = AudioGraph::new(test_config());
        graph.initialize(&host).unwrap();

        for _ in 0..COMMAND_CAPACITY {
            graph.stop_source().unwrap();
        }
        assert!(matches!(graph.stop_source(), Err(Error::CommandQueueFull)));

        // One render drains the backlog.
        host.render(1);
        assert!(graph.stop_source().is_ok());
    }

    #[test]
    fn test_stale_queued_source_never_starts() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        for generation in 1..=COMMAND_CAPACITY as u64 {
            let buffer = PcmBuffer::from_mono(8000.0, vec![0.5; 1000]);
            graph
                .set_source(Box::new(BufferSource::new(buffer)), generation)
                .unwrap();
        }
        // The stop cannot be queued, yet none of the queued sources may start.
        assert!(matches!(graph.stop_source(), Err(Error::CommandQueueFull)));

        let out = host.render(64);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(graph.status().active(), 0);
    }

    #[test]
    fn test_buffer_source_reaches_output_and_ends() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        let buffer = PcmBuffer::from_mono(8000.0, vec![0.5; 100]);
        graph.set_source(Box::new(BufferSource::new(buffer)), 1).unwrap();

        let out = host.render(50);
        assert_eq!(graph.status().active(), 1);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));

        host.render(100);
        assert!(graph.status().has_ended(1));
        assert_eq!(graph.status().active(), 0);
        assert_eq!(graph.clock().map(|c| c.frames()), Some(150));
    }

    #[test]
    fn test_gain_scales_output() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        let (tone, _control) = ToneSource::new(&Default::default(), 440.0, 8000.0);
        graph.set_source(Box::new(tone), 1).unwrap();
        let full = rms(&host.render(800));

        graph.params().set_gain(0.25);
        let quiet = rms(&host.render(800));
        assert!((quiet / full - 0.25).abs() < 0.02, "{quiet} vs {full}");

        graph.params().set_gain(0.0);
        let silent = host.render(800);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_source_silences_dry_path() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        let (tone, _control) = ToneSource::new(&Default::default(), 440.0, 8000.0);
        graph.set_source(Box::new(tone), 1).unwrap();
        host.render(256);
        graph.stop_source().unwrap();
        let out = host.render(256);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(graph.status().active(), 0);
        assert!(!graph.status().has_ended(1));
    }

    #[test]
    fn test_replacing_source_keeps_one_active() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        let first = PcmBuffer::from_mono(8000.0, vec![0.25; 1000]);
        let second = PcmBuffer::from_mono(8000.0, vec![0.5; 1000]);
        graph.set_source(Box::new(BufferSource::new(first)), 1).unwrap();
        graph.set_source(Box::new(BufferSource::new(second)), 2).unwrap();

        let out = host.render(64);
        assert_eq!(graph.status().active(), 2);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_monitor_enters_gain_stage() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();
        graph.params().set_gain(0.5);

        let (tx, rx) = crossbeam_channel::bounded(16);
        graph.set_monitor(Some(rx)).unwrap();
        for _ in 0..4 {
            tx.send((0.8, 0.4)).unwrap();
        }
        let out = host.render(8);
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert!((out[1] - 0.2).abs() < 1e-6);
        assert_eq!(out[8], 0.0);

        drop(tx);
        host.render(8);
        assert!(graph.set_monitor(None).is_ok());
    }

    #[test]
    fn test_reverb_mix_changes_output() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();

        let (tone, _control) = ToneSource::new(&Default::default(), 440.0, 8000.0);
        graph.set_source(Box::new(tone), 1).unwrap();
        let dry = host.render(1024);

        graph.params().set_reverb_mix(1.0);
        host.render(1024);
        let wet = host.render(1024);
        let diff: f32 = dry.iter().zip(&wet).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 1.0);
    }

    #[test]
    fn test_tap_receives_mono_output() {
        let host = ManualHost::new(8000.0);
        let mut config = test_config();
        config.effects.reverb_mix = 0.0;
        let mut graph = AudioGraph::new(config);
        graph.initialize(&host).unwrap();
        let mut tap = graph.take_tap().unwrap();
        assert!(graph.take_tap().is_none());

        let buffer = PcmBuffer::new(8000.0, vec![0.6; 32], vec![0.2; 32]);
        graph.set_source(Box::new(BufferSource::new(buffer)), 1).unwrap();
        host.render(32);

        let mut samples = [0.0f32; 32];
        assert_eq!(tap.read(&mut samples), 32);
        assert!(samples.iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }
}
