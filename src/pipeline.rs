//! Pipeline orchestrator.
//!
//! Applies Gain → Noise Reduction → Anti-Distortion in fixed order over the
//! pristine source buffer. The stages are not commutative (gain ahead of
//! noise reduction changes the noise floor the spectral estimator sees), so
//! the order is part of the parameter semantics and must not be swapped.
//!
//! Every call recomputes the whole buffer from the bytes it is given; there
//! is no incremental path. Calls are synchronous and blocking: a host should
//! run them on a worker and keep at most one recomputation in flight per
//! pipeline (or give each concurrent job its own `Pipeline`). When a new
//! source buffer is loaded, call [`Pipeline::reset_noise_profile`] so the
//! stale profile does not leak across clips.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::anti_distortion::{AntiDistortion, AntiDistortionParams};
use crate::dsp::gain::GainStage;
use crate::dsp::noise_reduction::{NoiseReducer, NoiseReductionParams};
use crate::error::AudioError;
use crate::format::AudioFormat;

/// One full parameter set for [`Pipeline::process`]. The optional stages run
/// only when their parameters are present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessParams {
    /// Linear amplification factor; values within 0.001 of 1.0 pass the
    /// buffer through byte-identically.
    pub amplification: f32,
    pub noise_reduction: Option<NoiseReductionParams>,
    pub anti_distortion: Option<AntiDistortionParams>,
}

impl Default for ProcessParams {
    fn default() -> Self {
        Self {
            amplification: 1.0,
            noise_reduction: None,
            anti_distortion: None,
        }
    }
}

/// Owns the persistent noise profile; everything else is recomputed per call.
pub struct Pipeline {
    noise_reducer: NoiseReducer,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            noise_reducer: NoiseReducer::new(),
        }
    }

    /// Run the transform chain over the untouched source buffer and return
    /// the processed bytes.
    pub fn process(
        &mut self,
        data: &[u8],
        format: &AudioFormat,
        params: &ProcessParams,
    ) -> Result<Vec<u8>, AudioError> {
        let gain = GainStage::for_format(*format)?;
        let mut processed = gain.apply(data, params.amplification);
        debug!("gain stage applied (factor {})", params.amplification);

        if let Some(nr) = &params.noise_reduction {
            processed = self.noise_reducer.process(&processed, format, nr)?;
            debug!("noise reduction applied");
        }

        if let Some(ad) = &params.anti_distortion {
            processed = AntiDistortion::new(*ad).process(&processed, format)?;
            debug!("anti-distortion applied");
        }

        Ok(processed)
    }

    /// Learn the noise profile from a noise-only clip.
    pub fn learn_noise_profile(
        &mut self,
        noise_data: &[u8],
        format: &AudioFormat,
    ) -> Result<bool, AudioError> {
        self.noise_reducer.learn_profile(noise_data, format)
    }

    /// Learn the noise profile from a half-open per-channel sample range of
    /// the loaded buffer.
    pub fn learn_noise_profile_from_range(
        &mut self,
        data: &[u8],
        format: &AudioFormat,
        start_sample: usize,
        end_sample: usize,
    ) -> Result<bool, AudioError> {
        self.noise_reducer
            .learn_profile_from_range(data, format, start_sample, end_sample)
    }

    /// Return the noise profile to the unset state.
    pub fn reset_noise_profile(&mut self) {
        self.noise_reducer.reset_profile();
    }

    pub fn has_learned_noise_profile(&self) -> bool {
        self.noise_reducer.has_learned_profile()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
