//! Effect parameter model.
//!
//! Every user-facing effect change is an [`EffectCommand`]; [`EffectState::apply`]
//! is the single place where commands are validated and stored.

use serde::{Deserialize, Serialize};

pub const MIN_PITCH_SEMITONES: i8 = -12;
pub const MAX_PITCH_SEMITONES: i8 = 12;

/// A single effect change requested by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectCommand {
    /// Output gain, `0.0..=1.0`.
    SetVolume(f64),
    /// Demo tone shift in semitones, `-12..=12`.
    SetPitch(i8),
    /// Reverb wet amount, `0.0..=1.0`.
    SetReverb(f64),
    SetAutoTune(bool),
}

impl EffectCommand {
    /// Clamp the payload into its valid range. NaN becomes zero.
    pub fn clamped(self) -> Self {
        match self {
            EffectCommand::SetVolume(v) => EffectCommand::SetVolume(clamp_unit(v)),
            EffectCommand::SetPitch(s) => {
                EffectCommand::SetPitch(s.clamp(MIN_PITCH_SEMITONES, MAX_PITCH_SEMITONES))
            }
            EffectCommand::SetReverb(v) => EffectCommand::SetReverb(clamp_unit(v)),
            EffectCommand::SetAutoTune(on) => EffectCommand::SetAutoTune(on),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Current effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectState {
    pub volume: f64,
    pub pitch_semitones: i8,
    pub reverb_mix: f64,
    /// Stored only; no pitch correction is applied.
    pub auto_tune: bool,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch_semitones: 0,
            reverb_mix: 0.3,
            auto_tune: false,
        }
    }
}

impl EffectState {
    /// Store `command` after clamping. Returns the command as applied.
    pub fn apply(&mut self, command: EffectCommand) -> EffectCommand {
        let command = command.clamped();
        match command {
            EffectCommand::SetVolume(v) => self.volume = v,
            EffectCommand::SetPitch(s) => self.pitch_semitones = s,
            EffectCommand::SetReverb(v) => self.reverb_mix = v,
            EffectCommand::SetAutoTune(on) => self.auto_tune = on,
        }
        command
    }

    /// Bring a deserialized or hand-built state into range.
    pub fn sanitized(mut self) -> Self {
        self.volume = clamp_unit(self.volume);
        self.reverb_mix = clamp_unit(self.reverb_mix);
        self.pitch_semitones = self
            .pitch_semitones
            .clamp(MIN_PITCH_SEMITONES, MAX_PITCH_SEMITONES);
        self
    }

    /// Frequency multiplier for the current pitch shift.
    pub fn pitch_ratio(&self) -> f64 {
        pitch_ratio(self.pitch_semitones)
    }

    /// `(dry, wet)` gains of the reverb stage.
    pub fn reverb_gains(&self) -> (f64, f64) {
        (1.0 - self.reverb_mix, self.reverb_mix)
    }
}

/// Equal-tempered frequency ratio for a shift of `semitones`.
#[inline]
pub fn pitch_ratio(semitones: i8) -> f64 {
    2f64.powf(semitones as f64 / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let state = EffectState::default();
        assert_eq!(state.volume, 1.0);
        assert_eq!(state.pitch_semitones, 0);
        assert_eq!(state.reverb_mix, 0.3);
        assert!(!state.auto_tune);
    }

    #[test]
    fn test_apply_clamps_and_stores() {
        let mut state = EffectState::default();
        assert_eq!(
            state.apply(EffectCommand::SetVolume(1.5)),
            EffectCommand::SetVolume(1.0)
        );
        assert_eq!(state.volume, 1.0);
        state.apply(EffectCommand::SetVolume(-0.2));
        assert_eq!(state.volume, 0.0);
        state.apply(EffectCommand::SetPitch(20));
        assert_eq!(state.pitch_semitones, 12);
        state.apply(EffectCommand::SetPitch(i8::MIN));
        assert_eq!(state.pitch_semitones, -12);
        state.apply(EffectCommand::SetAutoTune(true));
        assert!(state.auto_tune);
    }

    #[test]
    fn test_nan_volume_is_zero() {
        let mut state = EffectState::default();
        state.apply(EffectCommand::SetVolume(f64::NAN));
        assert_eq!(state.volume, 0.0);
    }

    #[test]
    fn test_pitch_ratio_octaves() {
        assert_relative_eq!(pitch_ratio(12), 2.0, epsilon = 1e-12);
        assert_relative_eq!(pitch_ratio(-12), 0.5, epsilon = 1e-12);
        assert_relative_eq!(pitch_ratio(0), 1.0);
    }

    #[test]
    fn test_state_pitch_ratio_follows_clamped_shift() {
        let mut state = EffectState::default();
        assert_relative_eq!(state.pitch_ratio(), 1.0);
        state.apply(EffectCommand::SetPitch(7));
        assert_relative_eq!(state.pitch_ratio(), pitch_ratio(7), epsilon = 1e-12);
        state.apply(EffectCommand::SetPitch(-30));
        assert_relative_eq!(state.pitch_ratio(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_reverb_gains_crossfade() {
        let mut state = EffectState::default();
        state.apply(EffectCommand::SetReverb(0.25));
        assert_eq!(state.reverb_gains(), (0.75, 0.25));
    }

    #[test]
    fn test_sanitized() {
        let state = EffectState {
            volume: 3.0,
            pitch_semitones: -40,
            reverb_mix: f64::NAN,
            auto_tune: false,
        }
        .sanitized();
        assert_eq!(state.volume, 1.0);
        assert_eq!(state.pitch_semitones, -12);
        assert_eq!(state.reverb_mix, 0.0);
    }

    proptest! {
        #[test]
        fn volume_always_in_range(v in proptest::num::f64::ANY) {
            let mut state = EffectState::default();
            state.apply(EffectCommand::SetVolume(v));
            prop_assert!((0.0..=1.0).contains(&state.volume));
        }

        #[test]
        fn in_range_volume_reads_back_exactly(v in 0.0f64..=1.0) {
            let mut state = EffectState::default();
            state.apply(EffectCommand::SetVolume(v));
            prop_assert_eq!(state.volume, v);
        }

        #[test]
        fn pitch_always_in_range(s in any::<i8>()) {
            let mut state = EffectState::default();
            state.apply(EffectCommand::SetPitch(s));
            prop_assert!((-12..=12).contains(&state.pitch_semitones));
        }
    }
}
