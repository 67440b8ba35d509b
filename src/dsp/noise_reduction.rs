//! Spectral-subtraction noise reduction.
//!
//! Short-time Fourier analysis over Hann-windowed frames (FFT size 2048,
//! 75 % overlap), per-bin suppression against a noise magnitude profile,
//! inter-frame gain smoothing against the previous frame's result to tame
//! musical-noise artifacts, and Hann-windowed overlap-add resynthesis.
//!
//! The profile is a small state machine: it starts unset, is auto-estimated
//! from the leading frames of the first signal processed (a blind assumption
//! that the clip opens with representative noise), or explicitly learned from
//! a noise-only clip or a selected sample range. Once estimated or learned it
//! persists until [`NoiseReducer::reset_profile`].
//!
//! Samples past the last full analysis frame are not noise-reduced: the
//! overlap-add loop never reaches them, so they come out zeroed. See
//! `tail_past_last_frame_is_dropped` below.

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::codec::PcmCodec;
use crate::dsp::spectrum::SpectralEngine;
use crate::dsp::utils::{hann_window, MAG_FLOOR};
use crate::error::AudioError;
use crate::format::AudioFormat;

pub const FFT_SIZE: usize = 2048;
pub const HOP_SIZE: usize = FFT_SIZE / 4;

/// Bins of the single-sided spectrum.
const NUM_BINS: usize = FFT_SIZE / 2 + 1;

/// Auto-estimation reads at most this many leading frames.
const AUTO_ESTIMATE_FRAMES: usize = 10;

/// Fixed multiplier on the subtraction term.
const REDUCTION_STRENGTH: f32 = 5.0;

/// Shared analysis/synthesis window for the fixed frame size.
static ANALYSIS_WINDOW: Lazy<Vec<f32>> = Lazy::new(|| hann_window(FFT_SIZE));

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseReductionParams {
    /// Subtraction depth; 0 disables suppression entirely.
    pub reduction_factor: f32,
    /// Magnitude floor used in the suppression divisor.
    pub noise_floor: f32,
    /// Inter-frame gain blend in [0, 1]; 1 keeps only the current frame.
    pub smoothing_factor: f32,
}

impl Default for NoiseReductionParams {
    fn default() -> Self {
        Self {
            reduction_factor: 0.9,
            noise_floor: 0.05,
            smoothing_factor: 0.7,
        }
    }
}

/// Noise profile state. Only the unset state triggers auto-estimation; an
/// estimated or learned profile is reused until an explicit reset.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseProfile {
    Unset,
    AutoEstimated(Vec<f32>),
    Learned(Vec<f32>),
}

impl NoiseProfile {
    pub fn is_unset(&self) -> bool {
        matches!(self, NoiseProfile::Unset)
    }

    pub fn is_learned(&self) -> bool {
        matches!(self, NoiseProfile::Learned(_))
    }

    /// Average magnitude per bin, if a profile exists.
    pub fn magnitudes(&self) -> Option<&[f32]> {
        match self {
            NoiseProfile::Unset => None,
            NoiseProfile::AutoEstimated(m) | NoiseProfile::Learned(m) => Some(m),
        }
    }
}

/// The stage. Holds the persistent profile and the transform plan; all
/// per-buffer frame state is per-call scratch, so independent instances are
/// safe to run concurrently.
pub struct NoiseReducer {
    engine: SpectralEngine,
    profile: NoiseProfile,
}

impl NoiseReducer {
    pub fn new() -> Self {
        Self {
            engine: SpectralEngine::new(FFT_SIZE),
            profile: NoiseProfile::Unset,
        }
    }

    pub fn profile(&self) -> &NoiseProfile {
        &self.profile
    }

    pub fn has_learned_profile(&self) -> bool {
        self.profile.is_learned()
    }

    /// Return the profile to the unset state; the next [`process`] call will
    /// auto-estimate again.
    ///
    /// [`process`]: NoiseReducer::process
    pub fn reset_profile(&mut self) {
        if !self.profile.is_unset() {
            info!("noise profile reset");
        }
        self.profile = NoiseProfile::Unset;
    }

    /// Learn the profile from a noise-only clip: average magnitude spectrum
    /// over every hop-spaced full frame of every channel.
    ///
    /// Returns `false` (leaving the profile untouched) only for an empty
    /// clip. A clip shorter than one analysis frame still succeeds and
    /// yields the floor-epsilon profile.
    pub fn learn_profile(
        &mut self,
        noise_data: &[u8],
        format: &AudioFormat,
    ) -> Result<bool, AudioError> {
        let codec = PcmCodec::new(*format)?;
        let channels = codec.decode(noise_data);
        let len = channels.first().map_or(0, |ch| ch.len());
        if len == 0 {
            warn!("noise clip is empty, profile unchanged");
            return Ok(false);
        }

        let profile = average_magnitude_profile(&self.engine, &channels, HOP_SIZE, None);
        self.profile = NoiseProfile::Learned(profile);
        info!("noise profile learned from {len} sample noise clip");
        Ok(true)
    }

    /// Learn the profile from the half-open per-channel sample range
    /// `[start_sample, end_sample)` of an already-loaded buffer.
    ///
    /// An out-of-bounds or empty range is a no-op returning `false`; the
    /// caller is responsible for validating the selection.
    pub fn learn_profile_from_range(
        &mut self,
        data: &[u8],
        format: &AudioFormat,
        start_sample: usize,
        end_sample: usize,
    ) -> Result<bool, AudioError> {
        let codec = PcmCodec::new(*format)?;
        let channels = codec.decode(data);
        let len = channels.first().map_or(0, |ch| ch.len());
        if start_sample >= end_sample || end_sample > len {
            warn!("noise range {start_sample}..{end_sample} invalid for {len} samples, ignored");
            return Ok(false);
        }

        let section: Vec<Vec<f32>> = channels
            .iter()
            .map(|ch| ch[start_sample..end_sample].to_vec())
            .collect();
        let profile = average_magnitude_profile(&self.engine, &section, HOP_SIZE, None);
        self.profile = NoiseProfile::Learned(profile);
        info!("noise profile learned from samples {start_sample}..{end_sample}");
        Ok(true)
    }

    /// Run spectral subtraction over the whole buffer, per channel, with one
    /// shared profile.
    ///
    /// With the profile unset it is first auto-estimated from the first
    /// min(10, available) non-overlapping frames of this very signal.
    pub fn process(
        &mut self,
        data: &[u8],
        format: &AudioFormat,
        params: &NoiseReductionParams,
    ) -> Result<Vec<u8>, AudioError> {
        let codec = PcmCodec::new(*format)?;
        let channels = codec.decode(data);

        if self.profile.is_unset() {
            let estimated = average_magnitude_profile(
                &self.engine,
                &channels,
                FFT_SIZE,
                Some(AUTO_ESTIMATE_FRAMES),
            );
            info!("noise profile auto-estimated from leading frames");
            self.profile = NoiseProfile::AutoEstimated(estimated);
        }
        let profile = match &self.profile {
            NoiseProfile::AutoEstimated(m) | NoiseProfile::Learned(m) => m.as_slice(),
            NoiseProfile::Unset => unreachable!("profile estimated above"),
        };

        let mut out_channels = Vec::with_capacity(channels.len());
        for samples in &channels {
            out_channels.push(reduce_channel(&self.engine, samples, profile, params));
        }
        Ok(codec.encode(&out_channels))
    }
}

impl Default for NoiseReducer {
    fn default() -> Self {
        Self::new()
    }
}

/// Average magnitude spectrum over `stride`-spaced full frames of every
/// channel, floored at [`MAG_FLOOR`]. `max_frames` caps the frames taken
/// from each channel (auto-estimation); `None` uses every full frame
/// (explicit learning).
fn average_magnitude_profile(
    engine: &SpectralEngine,
    channels: &[Vec<f32>],
    stride: usize,
    max_frames: Option<usize>,
) -> Vec<f32> {
    let window = &*ANALYSIS_WINDOW;
    let mut sums = vec![0.0f32; NUM_BINS];
    let mut count = 0usize;
    let mut re = vec![0.0f32; FFT_SIZE];
    let mut im = vec![0.0f32; FFT_SIZE];

    for samples in channels {
        let mut frames = 0usize;
        let mut start = 0usize;
        while start + FFT_SIZE <= samples.len() {
            if max_frames.is_some_and(|cap| frames >= cap) {
                break;
            }
            for i in 0..FFT_SIZE {
                re[i] = samples[start + i] * window[i];
                im[i] = 0.0;
            }
            engine.forward(&mut re, &mut im);
            for (bin, sum) in sums.iter_mut().enumerate() {
                *sum += (re[bin] * re[bin] + im[bin] * im[bin]).sqrt();
            }
            count += 1;
            frames += 1;
            start += stride;
        }
    }

    if count > 0 {
        for sum in &mut sums {
            *sum /= count as f32;
        }
    }
    for sum in &mut sums {
        *sum = sum.max(MAG_FLOOR);
    }
    sums
}

/// Per-call scratch for one channel pass.
struct ChannelScratch {
    re: Vec<f32>,
    im: Vec<f32>,
    magnitude: Vec<f32>,
    phase: Vec<f32>,
    prev_magnitude: Vec<f32>,
}

impl ChannelScratch {
    fn new() -> Self {
        Self {
            re: vec![0.0; FFT_SIZE],
            im: vec![0.0; FFT_SIZE],
            magnitude: vec![0.0; NUM_BINS],
            phase: vec![0.0; NUM_BINS],
            prev_magnitude: vec![0.0; NUM_BINS],
        }
    }
}

fn reduce_channel(
    engine: &SpectralEngine,
    samples: &[f32],
    profile: &[f32],
    params: &NoiseReductionParams,
) -> Vec<f32> {
    let window = &*ANALYSIS_WINDOW;
    let mut output = vec![0.0f32; samples.len()];
    let mut scratch = ChannelScratch::new();

    // Corrects the 4x-overlap energy gain. Derived for HOP_SIZE = FFT_SIZE/4;
    // a different hop needs this re-derived, not reused.
    let overlap_norm = 1.0 / (FFT_SIZE / HOP_SIZE / 2) as f32;

    let mut frame_index = 0usize;
    loop {
        let start = frame_index * HOP_SIZE;
        if start + FFT_SIZE > samples.len() {
            break;
        }

        for i in 0..FFT_SIZE {
            scratch.re[i] = samples[start + i] * window[i];
            scratch.im[i] = 0.0;
        }
        engine.forward(&mut scratch.re, &mut scratch.im);
        engine.magnitude_phase(
            &scratch.re,
            &scratch.im,
            &mut scratch.magnitude,
            &mut scratch.phase,
        );

        for bin in 0..NUM_BINS {
            let subtraction = REDUCTION_STRENGTH * params.reduction_factor * profile[bin]
                / scratch.magnitude[bin].max(params.noise_floor);
            let mut gain = (1.0 - subtraction).max(0.0);
            if frame_index > 0 {
                gain = params.smoothing_factor * gain
                    + (1.0 - params.smoothing_factor)
                        * (scratch.prev_magnitude[bin] / scratch.magnitude[bin].max(MAG_FLOOR));
            }

            scratch.magnitude[bin] *= gain;
            scratch.prev_magnitude[bin] = scratch.magnitude[bin];
        }

        // Rebuild the spectrum from the scaled magnitude and original phase.
        for bin in 0..NUM_BINS {
            scratch.re[bin] = scratch.magnitude[bin] * scratch.phase[bin].cos();
            scratch.im[bin] = scratch.magnitude[bin] * scratch.phase[bin].sin();
        }
        // Conjugate symmetry keeps the inverse real-valued.
        for bin in 1..FFT_SIZE / 2 {
            scratch.re[FFT_SIZE - bin] = scratch.re[bin];
            scratch.im[FFT_SIZE - bin] = -scratch.im[bin];
        }
        engine.inverse(&mut scratch.re, &mut scratch.im);

        for i in 0..FFT_SIZE {
            output[start + i] += scratch.re[i] * window[i] * overlap_norm;
        }

        frame_index += 1;
    }

    output
}
