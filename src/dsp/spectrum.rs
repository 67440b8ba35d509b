//! In-place radix-2 FFT engine.
//!
//! Iterative Cooley–Tukey over split real/imaginary slices: bit-reversal
//! permutation, then butterfly stages with twiddle factors
//! `exp(-2*pi*i*k / size)`. The inverse conjugates, reuses the forward pass,
//! conjugates again and divides every sample by N, so
//! `inverse(forward(x)) == x` within floating-point tolerance.

/// Transform of one fixed power-of-two length.
pub struct SpectralEngine {
    size: usize,
}

impl SpectralEngine {
    /// `size` must be a power of two, at least 2.
    pub fn new(size: usize) -> Self {
        assert!(size >= 2 && size.is_power_of_two(), "fft size must be a power of two");
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform, in place.
    pub fn forward(&self, real: &mut [f32], imag: &mut [f32]) {
        let n = self.size;
        debug_assert_eq!(real.len(), n);
        debug_assert_eq!(imag.len(), n);

        // Bit-reversal permutation.
        let shift = usize::BITS - n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> shift;
            if j > i {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }

        // Butterfly stages.
        let mut size = 2;
        while size <= n {
            let angle = -2.0 * std::f32::consts::PI / size as f32;
            let w_re = angle.cos();
            let w_im = angle.sin();

            for start in (0..n).step_by(size) {
                let mut t_re = 1.0f32;
                let mut t_im = 0.0f32;

                for j in 0..size / 2 {
                    let a = start + j;
                    let b = start + j + size / 2;

                    let a_re = real[a];
                    let a_im = imag[a];
                    let b_re = real[b] * t_re - imag[b] * t_im;
                    let b_im = real[b] * t_im + imag[b] * t_re;

                    real[a] = a_re + b_re;
                    imag[a] = a_im + b_im;
                    real[b] = a_re - b_re;
                    imag[b] = a_im - b_im;

                    let next_re = t_re * w_re - t_im * w_im;
                    let next_im = t_re * w_im + t_im * w_re;
                    t_re = next_re;
                    t_im = next_im;
                }
            }
            size *= 2;
        }
    }

    /// Inverse transform, in place.
    pub fn inverse(&self, real: &mut [f32], imag: &mut [f32]) {
        for v in imag.iter_mut() {
            *v = -*v;
        }
        self.forward(real, imag);
        let inv_n = 1.0 / self.size as f32;
        for v in real.iter_mut() {
            *v *= inv_n;
        }
        for v in imag.iter_mut() {
            *v = -*v * inv_n;
        }
    }

    /// Magnitude and phase of the single-sided bins `0..=size/2`.
    pub fn magnitude_phase(
        &self,
        real: &[f32],
        imag: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) {
        for i in 0..=self.size / 2 {
            magnitude[i] = (real[i] * real[i] + imag[i] * imag[i]).sqrt();
            phase[i] = imag[i].atan2(real[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::{num_complex::Complex, Fft, FftPlanner};

    /// Deterministic quasi-random test vector.
    fn chirp(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                (2.0 * std::f32::consts::PI * (3.0 * t + 17.0 * t * t)).sin() * 0.7
                    + (2.0 * std::f32::consts::PI * 41.0 * t).cos() * 0.2
            })
            .collect()
    }

    #[test]
    fn impulse_spectrum_is_flat_with_zero_phase() {
        let engine = SpectralEngine::new(8);
        let mut re = vec![0.0f32; 8];
        let mut im = vec![0.0f32; 8];
        re[0] = 1.0;
        engine.forward(&mut re, &mut im);
        let mut mag = vec![0.0f32; 5];
        let mut phase = vec![0.0f32; 5];
        engine.magnitude_phase(&re, &im, &mut mag, &mut phase);
        for bin in 0..=4 {
            assert!((mag[bin] - 1.0).abs() < 1e-6, "bin {bin} magnitude {}", mag[bin]);
            assert!(phase[bin].abs() < 1e-6, "bin {bin} phase {}", phase[bin]);
        }
    }

    #[test]
    fn inverse_of_forward_recovers_input() {
        let engine = SpectralEngine::new(2048);
        let input = chirp(2048);
        let mut re = input.clone();
        let mut im = vec![0.0f32; 2048];
        engine.forward(&mut re, &mut im);
        engine.inverse(&mut re, &mut im);
        for i in 0..2048 {
            assert!(
                (re[i] - input[i]).abs() < 1e-4,
                "sample {i}: {} vs {}",
                re[i],
                input[i]
            );
            assert!(im[i].abs() < 1e-4);
        }
    }

    #[test]
    fn forward_matches_reference_fft() {
        let n = 256;
        let engine = SpectralEngine::new(n);
        let input = chirp(n);

        let mut re = input.clone();
        let mut im = vec![0.0f32; n];
        engine.forward(&mut re, &mut im);

        let mut reference: Vec<Complex<f32>> =
            input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        FftPlanner::<f32>::new()
            .plan_fft_forward(n)
            .process(&mut reference);

        for i in 0..n {
            approx::assert_abs_diff_eq!(re[i], reference[i].re, epsilon = 1e-3);
            approx::assert_abs_diff_eq!(im[i], reference[i].im, epsilon = 1e-3);
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_size() {
        SpectralEngine::new(1000);
    }
}
