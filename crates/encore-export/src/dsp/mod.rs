//! DSP helpers used before clips are stored or played.

pub mod resample;
