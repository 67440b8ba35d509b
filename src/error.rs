//! Error taxonomy of the codec boundary.
//!
//! Format validation happens once, when a codec or stage is bound to an
//! [`AudioFormat`](crate::format::AudioFormat); downstream numeric code
//! assumes an already-validated format and never uses errors for control
//! flow. Lenient conditions are deliberately not errors: trailing
//! partial-sample bytes are dropped, and an invalid noise-learning range is
//! a no-op.

use thiserror::Error;

/// Recoverable format errors. None of these ever panic the process.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// Bit depth outside {8, 16, 24}. The stage refuses to run.
    #[error("unsupported bit depth: {0} bits (supported: 8, 16, 24)")]
    UnsupportedBitDepth(u16),

    /// Signedness flag inconsistent with the fixed PCM layouts: 8-bit is
    /// unsigned with a +128 offset, 16- and 24-bit are signed.
    #[error("unsupported encoding: {bits}-bit with signed={signed}")]
    UnsupportedEncoding { bits: u16, signed: bool },

    /// A format describing zero channels.
    #[error("channel count must be at least 1")]
    InvalidChannelCount,
}
