//! Band-limited (Fourier-domain) resampling.
//!
//! Transforms the signal to the frequency domain, truncates or zero-pads the
//! spectrum to the new length and transforms back. This preserves the
//! signal's duration: `len(output) / target_rate == len(input) / source_rate`
//! within one sample.

use ndarray::Array1;
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Resample `samples` from `source_rate` to `target_rate`.
///
/// The output length is `floor(n * target_rate / source_rate)`. Degenerate
/// inputs (empty signal, non-positive rates) yield an empty result.
pub fn resample(samples: &[f64], source_rate: f64, target_rate: f64) -> Array1<f64> {
    let n = samples.len();
    if n == 0 || source_rate <= 0.0 || target_rate <= 0.0 {
        return Array1::zeros(0);
    }

    let num = (n as f64 * target_rate / source_rate) as usize;
    if num == 0 {
        return Array1::zeros(0);
    }
    if num == n {
        return Array1::from(samples.to_vec());
    }

    let mut planner = FftPlanner::new();

    let mut spectrum: Vec<Complex64> = samples.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    // Copy the retained low-frequency bins into the new spectrum; the
    // shared Nyquist bin of an even-length transform needs special care.
    let keep = n.min(num);
    let nyq = keep / 2 + 1;
    let mut out_spectrum = vec![Complex64::new(0.0, 0.0); num];

    out_spectrum[..nyq].copy_from_slice(&spectrum[..nyq]);
    for j in 1..=(keep - nyq) {
        out_spectrum[num - j] = spectrum[n - j];
    }

    if keep % 2 == 0 {
        let half = keep / 2;
        if num < n {
            // Downsampling: fold the negative-frequency counterpart in.
            out_spectrum[half] += spectrum[n - half];
        } else if num > n {
            // Upsampling: split the real Nyquist bin across both slots.
            out_spectrum[half] *= 0.5;
            let v = out_spectrum[half];
            out_spectrum[num - half] = v;
        }
    }

    planner.plan_fft_inverse(num).process(&mut out_spectrum);

    // Unnormalized forward and inverse transforms combine to a factor of the
    // forward length; the amplitude rescale by num/n is folded in.
    Array1::from_iter(out_spectrum.iter().map(|c| c.re / n as f64))
}
