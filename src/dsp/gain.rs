//! Integer-domain gain stage.
//!
//! Scales samples by an amplification factor directly on the packed integer
//! representation, never through the float codec, so a unity factor is a
//! bit-identical passthrough and non-unity factors quantize exactly once.

use crate::error::AudioError;
use crate::format::AudioFormat;

/// Factors within this distance of 1.0 take the identity fast path. The
/// passthrough is a contract, not an optimization: callers may rely on the
/// copy being byte-identical.
const UNITY_TOLERANCE: f32 = 0.001;

/// Samples per chunk of the inner loop.
const CHUNK_SAMPLES: usize = 1024;

/// Gain stage bound to one validated format.
pub struct GainStage {
    format: AudioFormat,
}

impl GainStage {
    pub fn for_format(format: AudioFormat) -> Result<Self, AudioError> {
        format.validate()?;
        Ok(Self { format })
    }

    /// Scale every sample by `factor`, rounding to nearest and clamping to
    /// the bit depth's representable range. Trailing partial-sample bytes
    /// are carried over unmodified.
    pub fn apply(&self, data: &[u8], factor: f32) -> Vec<u8> {
        if (factor - 1.0).abs() < UNITY_TOLERANCE {
            return data.to_vec();
        }

        let depth = self.format.bit_depth;
        let endianness = self.format.endianness;
        let bps = depth.bytes_per_sample();
        let num_samples = data.len() / bps;

        let mut out = data.to_vec();
        for chunk_start in (0..num_samples).step_by(CHUNK_SAMPLES) {
            let chunk_end = (chunk_start + CHUNK_SAMPLES).min(num_samples);
            for s in chunk_start..chunk_end {
                let offset = s * bps;
                let sample = depth.read_sample(data, offset, endianness);
                let amplified = depth.quantize(sample as f32 * factor);
                depth.write_sample(&mut out, offset, amplified, endianness);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Endianness;

    fn stage(bits: u16) -> GainStage {
        let format =
            AudioFormat::new(44100.0, bits, 1, Endianness::Little, bits != 8).unwrap();
        GainStage::for_format(format).unwrap()
    }

    fn pack_16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn unpack_16(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn unity_factor_is_byte_identical() {
        let bytes = pack_16(&[1000, -1000, 32767, -32768]);
        assert_eq!(stage(16).apply(&bytes, 1.0), bytes);
        // Anything within the tolerance takes the same path.
        assert_eq!(stage(16).apply(&bytes, 1.0005), bytes);
    }

    #[test]
    fn doubles_16_bit_samples() {
        let bytes = pack_16(&[1000, -1000]);
        let out = stage(16).apply(&bytes, 2.0);
        assert_eq!(unpack_16(&out), vec![2000, -2000]);
    }

    #[test]
    fn clamps_instead_of_wrapping() {
        let bytes = pack_16(&[30000, -30000]);
        let out = stage(16).apply(&bytes, 2.0);
        assert_eq!(unpack_16(&out), vec![32767, -32768]);
    }

    #[test]
    fn eight_bit_half_gain_rounds_ties_away() {
        // 0xFF centers to 127; 127 * 0.5 = 63.5 rounds to 64; +128 = 192.
        let out = stage(8).apply(&[0xFF], 0.5);
        assert_eq!(out, vec![192]);
    }

    #[test]
    fn twenty_four_bit_gain_keeps_sign() {
        let format =
            AudioFormat::new(44100.0, 24, 1, Endianness::Big, true).unwrap();
        let stage = GainStage::for_format(format).unwrap();
        let mut bytes = vec![0u8; 3];
        format
            .bit_depth
            .write_sample(&mut bytes, 0, -100_000, Endianness::Big);
        let out = stage.apply(&bytes, 3.0);
        assert_eq!(
            format.bit_depth.read_sample(&out, 0, Endianness::Big),
            -300_000
        );
    }

    #[test]
    fn trailing_bytes_pass_through() {
        let mut bytes = pack_16(&[1000]);
        bytes.push(0x7F); // torn sample
        let out = stage(16).apply(&bytes, 2.0);
        assert_eq!(out[2], 0x7F);
        assert_eq!(unpack_16(&out[..2]), vec![2000]);
    }
}
