//! PCM byte codec.
//!
//! Converts raw PCM bytes to channel-major normalized f32 samples and back,
//! exactly, per the fixed layouts: 8-bit unsigned offset-128 (range ±128),
//! 16-bit signed (±32768), 24-bit signed sign-extended (±8388608), byte
//! order per the format's endianness. `decode` never clamps (source bytes
//! are in range by construction). `encode` rounds ties away from zero and
//! clamps to the representable range before packing, so a decode/encode
//! round trip with no intermediate processing reproduces the input bytes.

use log::warn;

use crate::error::AudioError;
use crate::format::AudioFormat;

/// Upper bound on the points kept by [`PcmCodec::decode_for_display`].
const DISPLAY_POINTS: usize = 10_000;

/// Byte-to-sample converter bound to one validated format.
pub struct PcmCodec {
    format: AudioFormat,
}

impl PcmCodec {
    /// Validates the format once; everything downstream assumes validity.
    pub fn new(format: AudioFormat) -> Result<Self, AudioError> {
        format.validate()?;
        Ok(Self { format })
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Number of whole frames in `data`. Trailing partial-sample bytes are
    /// dropped silently (lenient parsing policy).
    fn whole_frames(&self, data: &[u8]) -> usize {
        let frame = self.format.frame_size();
        let rem = data.len() % frame;
        if rem != 0 {
            warn!("pcm buffer has {rem} trailing byte(s), ignored");
        }
        data.len() / frame
    }

    /// Decode to channel-major normalized samples in [-1, 1].
    pub fn decode(&self, data: &[u8]) -> Vec<Vec<f32>> {
        let channels = self.format.channels as usize;
        let bps = self.format.bytes_per_sample();
        let scale = self.format.bit_depth.scale();
        let frames = self.whole_frames(data);

        let mut samples = vec![vec![0.0f32; frames]; channels];
        for frame in 0..frames {
            for ch in 0..channels {
                let offset = (frame * channels + ch) * bps;
                let raw = self
                    .format
                    .bit_depth
                    .read_sample(data, offset, self.format.endianness);
                samples[ch][frame] = raw as f32 / scale;
            }
        }
        samples
    }

    /// Encode channel-major samples back to interleaved bytes.
    ///
    /// Every channel must carry the same number of frames.
    pub fn encode(&self, samples: &[Vec<f32>]) -> Vec<u8> {
        let channels = self.format.channels as usize;
        debug_assert_eq!(samples.len(), channels);
        let frames = samples.first().map_or(0, |ch| ch.len());
        let bps = self.format.bytes_per_sample();
        let scale = self.format.bit_depth.scale();

        let mut data = vec![0u8; frames * channels * bps];
        for frame in 0..frames {
            for ch in 0..channels {
                let offset = (frame * channels + ch) * bps;
                let quantized = self.format.bit_depth.quantize(samples[ch][frame] * scale);
                self.format
                    .bit_depth
                    .write_sample(&mut data, offset, quantized, self.format.endianness);
            }
        }
        data
    }

    /// Downsampled interleaved view for waveform rendering, bounded to about
    /// 10 000 points. Visualization aid only; not part of the processing
    /// chain.
    pub fn decode_for_display(&self, data: &[u8]) -> Vec<f32> {
        let bps = self.format.bytes_per_sample();
        let scale = self.format.bit_depth.scale();
        let num_samples = data.len() / bps;
        let step = (num_samples / DISPLAY_POINTS).max(1);

        let mut points = Vec::with_capacity(num_samples / step + 1);
        let mut i = 0;
        while i < num_samples {
            let raw = self
                .format
                .bit_depth
                .read_sample(data, i * bps, self.format.endianness);
            points.push(raw as f32 / scale);
            i += step;
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Endianness;

    fn format(bits: u16, channels: u16, endianness: Endianness) -> AudioFormat {
        AudioFormat::new(48000.0, bits, channels, endianness, bits != 8).unwrap()
    }

    fn pack_16(values: &[i16], endianness: Endianness) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| match endianness {
                Endianness::Little => v.to_le_bytes(),
                Endianness::Big => v.to_be_bytes(),
            })
            .collect()
    }

    #[test]
    fn round_trip_is_exact_for_all_depths_and_endiannesses() {
        for &bits in &[8u16, 16, 24] {
            for &endianness in &[Endianness::Little, Endianness::Big] {
                let codec = PcmCodec::new(format(bits, 2, endianness)).unwrap();
                // Two frames of stereo covering negative, zero and extremes.
                let raw: Vec<i32> = match bits {
                    8 => vec![-128, 0, 127, -1],
                    16 => vec![-32768, 0, 32767, -12345],
                    _ => vec![-8_388_608, 0, 8_388_607, -1_234_567],
                };
                let bps = codec.format().bytes_per_sample();
                let mut bytes = vec![0u8; raw.len() * bps];
                for (i, &v) in raw.iter().enumerate() {
                    codec
                        .format()
                        .bit_depth
                        .write_sample(&mut bytes, i * bps, v, endianness);
                }

                let decoded = codec.decode(&bytes);
                assert_eq!(codec.encode(&decoded), bytes);
            }
        }
    }

    #[test]
    fn decode_does_not_clamp_full_scale_negative() {
        let codec = PcmCodec::new(format(16, 1, Endianness::Little)).unwrap();
        let bytes = pack_16(&[-32768, 16384], Endianness::Little);
        let decoded = codec.decode(&bytes);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0][0], -1.0);
        assert_eq!(decoded[0][1], 0.5);
    }

    #[test]
    fn decode_splits_interleaved_channels() {
        let codec = PcmCodec::new(format(16, 2, Endianness::Little)).unwrap();
        let bytes = pack_16(&[100, -100, 200, -200], Endianness::Little);
        let decoded = codec.decode(&bytes);
        assert_eq!(decoded[0].len(), 2);
        assert_eq!(decoded[0][0], 100.0 / 32768.0);
        assert_eq!(decoded[1][0], -100.0 / 32768.0);
        assert_eq!(decoded[0][1], 200.0 / 32768.0);
        assert_eq!(decoded[1][1], -200.0 / 32768.0);
    }

    #[test]
    fn trailing_partial_frame_bytes_are_ignored() {
        let codec = PcmCodec::new(format(16, 2, Endianness::Little)).unwrap();
        let mut bytes = pack_16(&[1, 2, 3, 4], Endianness::Little);
        bytes.push(0xAB); // torn trailing byte
        let decoded = codec.decode(&bytes);
        assert_eq!(decoded[0].len(), 2);
        assert_eq!(decoded[1].len(), 2);
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let codec = PcmCodec::new(format(16, 1, Endianness::Little)).unwrap();
        let bytes = codec.encode(&[vec![2.0, -2.0]]);
        let decoded = codec.decode(&bytes);
        assert_eq!(decoded[0][0], 32767.0 / 32768.0);
        assert_eq!(decoded[0][1], -1.0);
    }

    #[test]
    fn display_view_is_bounded() {
        let codec = PcmCodec::new(format(16, 1, Endianness::Little)).unwrap();
        let samples: Vec<i16> = (0..40000).map(|i| (i % 100) as i16).collect();
        let bytes = pack_16(&samples, Endianness::Little);
        let points = codec.decode_for_display(&bytes);
        assert_eq!(points.len(), 10000);
        assert_eq!(points[0], 0.0);
        // Step of 4, so the second point is sample index 4.
        assert_eq!(points[1], 4.0 / 32768.0);
    }

    #[test]
    fn display_view_keeps_short_buffers_whole() {
        let codec = PcmCodec::new(format(16, 1, Endianness::Little)).unwrap();
        let bytes = pack_16(&[5, 6, 7], Endianness::Little);
        assert_eq!(codec.decode_for_display(&bytes).len(), 3);
    }
}
