//! Look-ahead anti-distortion stage.
//!
//! A peak-limiting compressor, not an RMS leveler: each output sample's gain
//! comes from the peak absolute value over the next 5 ms, so transients are
//! caught before they overshoot. The compression ratio grows with the
//! overshoot (capped at 20:1), then makeup gain is applied and the result is
//! either hard-clamped to [-1, 1] or passed through a fixed-drive tanh soft
//! clipper. Channels are processed independently.

use serde::{Deserialize, Serialize};

use crate::codec::PcmCodec;
use crate::error::AudioError;
use crate::format::AudioFormat;

/// Look-ahead horizon in milliseconds.
const LOOK_AHEAD_MS: usize = 5;

/// Upper bound on the dynamic compression ratio.
const MAX_RATIO: f32 = 20.0;

/// Soft clipper drive. The clipper is `tanh(x * drive) / drive`.
const SOFT_CLIP_DRIVE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntiDistortionParams {
    /// Compression threshold in (0, 1].
    pub threshold: f32,
    /// Base compression ratio, >= 1.
    pub ratio: f32,
    /// Post-compression makeup gain, > 0.
    pub makeup_gain: f32,
    /// Tanh soft clipper instead of a hard clamp.
    pub use_soft_clip: bool,
}

impl Default for AntiDistortionParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            ratio: 4.0,
            makeup_gain: 1.0,
            use_soft_clip: true,
        }
    }
}

pub struct AntiDistortion {
    params: AntiDistortionParams,
}

impl AntiDistortion {
    pub fn new(params: AntiDistortionParams) -> Self {
        Self { params }
    }

    pub fn process(&self, data: &[u8], format: &AudioFormat) -> Result<Vec<u8>, AudioError> {
        let codec = PcmCodec::new(*format)?;
        let mut channels = codec.decode(data);
        let look_ahead = (format.sample_rate as usize * LOOK_AHEAD_MS) / 1000;
        for samples in &mut channels {
            self.process_channel(samples, look_ahead);
        }
        Ok(codec.encode(&channels))
    }

    /// One channel pass. The look-ahead buffer is rebuilt per call, so
    /// concurrent jobs with independent stage instances never share state.
    fn process_channel(&self, samples: &mut [f32], look_ahead: usize) {
        let mut padded = vec![0.0f32; samples.len() + look_ahead];
        padded[..samples.len()].copy_from_slice(samples);

        for i in 0..samples.len() {
            let mut peak = padded[i].abs();
            for j in 1..=look_ahead {
                peak = peak.max(padded[i + j].abs());
            }

            let mut gain = 1.0;
            if peak > self.params.threshold {
                let over = peak - self.params.threshold;
                gain = (self.params.threshold + over / self.dynamic_ratio(over)) / peak;
            }

            let shaped = padded[i] * gain * self.params.makeup_gain;
            samples[i] = if self.params.use_soft_clip {
                soft_clip(shaped)
            } else {
                shaped.clamp(-1.0, 1.0)
            };
        }
    }

    /// Ratio steepens with overshoot so the hardest peaks are limited hardest.
    fn dynamic_ratio(&self, over_threshold: f32) -> f32 {
        (self.params.ratio * (1.0 + over_threshold * 2.0)).min(MAX_RATIO)
    }
}

/// Fixed-drive tanh saturation.
fn soft_clip(sample: f32) -> f32 {
    (sample * SOFT_CLIP_DRIVE).tanh() / SOFT_CLIP_DRIVE
}
