//! Real-time render callback for the fixed node chain.
//!
//! `source + monitor -> gain -> reverb (dry/wet) -> tap -> output`
//!
//! The processor owns everything it touches per sample. The control side
//! reaches it only through [`GraphCommand`]s, the shared parameter atomics
//! and the source status counters.

use crate::clock::GraphClock;
use crate::graph::reverb::Reverb;
use crate::graph::source::Source;
use crate::graph::tap::TapWriter;
use crate::graph::{GraphParams, SourceStatus};
use crate::smooth::SmoothedValue;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Arc;

/// Messages from the control thread to the render callback.
pub enum GraphCommand {
    /// Replace the playing source. The previous one is retired.
    SetSource {
        source: Box<dyn Source>,
        generation: u64,
    },
    /// Silence the source head without touching the monitor path.
    StopSource,
    /// Route a live input into the gain stage, or disconnect it.
    SetMonitor(Option<Receiver<(f32, f32)>>),
}

/// Render state moved onto the output backend's thread.
pub struct GraphProcessor {
    commands: Receiver<GraphCommand>,
    retired: Sender<Box<dyn Source>>,
    clock: Arc<GraphClock>,
    params: Arc<GraphParams>,
    status: Arc<SourceStatus>,
    source: Option<(Box<dyn Source>, u64)>,
    monitor: Option<Receiver<(f32, f32)>>,
    gain: SmoothedValue,
    wet: SmoothedValue,
    reverb: Reverb,
    tap: TapWriter,
}

impl GraphProcessor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        commands: Receiver<GraphCommand>,
        retired: Sender<Box<dyn Source>>,
        clock: Arc<GraphClock>,
        params: Arc<GraphParams>,
        status: Arc<SourceStatus>,
        reverb: Reverb,
        tap: TapWriter,
        ramp_seconds: f32,
    ) -> Self {
        let sample_rate = clock.sample_rate() as f32;
        let gain = SmoothedValue::new(params.gain(), ramp_seconds, sample_rate);
        let wet = SmoothedValue::new(params.reverb_mix(), ramp_seconds, sample_rate);
        Self {
            commands,
            retired,
            clock,
            params,
            status,
            source: None,
            monitor: None,
            gain,
            wet,
            reverb,
            tap,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.clock.sample_rate()
    }

    /// Render interleaved stereo into `output`.
    #[inline]
    pub fn render(&mut self, output: &mut [f32]) {
        self.drain_commands();

        self.gain.set_target(self.params.gain());
        self.wet.set_target(self.params.reverb_mix());

        let mut frames = 0u64;
        for frame in output.chunks_exact_mut(2) {
            let (mut left, mut right) = self.next_source_frame();

            if let Some(monitor) = &self.monitor {
                match monitor.try_recv() {
                    Ok((l, r)) => {
                        left += l;
                        right += r;
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => self.monitor = None,
                }
            }

            let gain = self.gain.next_sample();
            left *= gain;
            right *= gain;

            let wet = self.wet.next_sample();
            let (wet_l, wet_r) = self.reverb.process(left, right);
            let out_l = left * (1.0 - wet) + wet_l * wet;
            let out_r = right * (1.0 - wet) + wet_r * wet;

            frame[0] = out_l;
            frame[1] = out_r;
            self.tap.push((out_l + out_r) * 0.5);
            frames += 1;
        }

        self.clock.advance(frames);
    }

    #[inline]
    fn next_source_frame(&mut self) -> (f32, f32) {
        let Some((source, generation)) = self.source.as_mut() else {
            return (0.0, 0.0);
        };
        match source.next_frame() {
            Some(frame) => frame,
            None => {
                let generation = *generation;
                self.status.mark_ended(generation);
                self.retire_source();
                (0.0, 0.0)
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                GraphCommand::SetSource { source, generation } => {
                    if generation != self.status.requested() {
                        let _ = self.retired.try_send(source);
                        continue;
                    }
                    self.retire_source();
                    self.status.mark_active(generation);
                    self.source = Some((source, generation));
                }
                GraphCommand::StopSource => {
                    self.retire_source();
                    self.status.mark_active(0);
                }
                GraphCommand::SetMonitor(monitor) => self.monitor = monitor,
            }
        }
    }

    /// Hand the current source back to the control thread for dropping.
    fn retire_source(&mut self) {
        if let Some((source, _)) = self.source.take() {
            let _ = self.retired.try_send(source);
        }
    }
}
