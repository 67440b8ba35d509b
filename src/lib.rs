//! Batch PCM restoration core.
//!
//! A bit-depth-aware codec (8/16/24-bit, either endianness) plus a fixed
//! transform chain of linear gain, spectral-subtraction noise reduction,
//! and a look-ahead anti-distortion limiter, applied over whole in-memory
//! buffers. Container I/O, playback and rendering are host concerns; this
//! crate only ever sees raw PCM bytes and a format descriptor.
//!
//! ```
//! use pcmclean::dsp::NoiseReductionParams;
//! use pcmclean::{AudioFormat, Endianness, Pipeline, ProcessParams};
//!
//! let format = AudioFormat::new(44100.0, 16, 1, Endianness::Little, true)?;
//! let source = vec![0u8; 8192];
//!
//! let mut pipeline = Pipeline::new();
//! let params = ProcessParams {
//!     amplification: 1.2,
//!     noise_reduction: Some(NoiseReductionParams::default()),
//!     anti_distortion: None,
//! };
//! let processed = pipeline.process(&source, &format, &params)?;
//! assert_eq!(processed.len(), source.len());
//! # Ok::<(), pcmclean::AudioError>(())
//! ```

pub mod codec;
pub mod dsp;
pub mod error;
pub mod format;
pub mod pipeline;

pub use codec::PcmCodec;
pub use error::AudioError;
pub use format::{AudioFormat, BitDepth, Endianness};
pub use pipeline::{Pipeline, ProcessParams};
