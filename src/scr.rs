//! SCR peak detection and per-channel feature extraction.
//!
//! Skin-conductance channels get the full treatment: peak count and mean
//! amplitude, half-amplitude recovery time, line length and a set of
//! dispersion/shape statistics. Other channel types only carry line length;
//! the amplitude-domain fields stay NaN for them.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelType;
use crate::config::ScrPeakConfig;

/// Near-zero denominator guard for the Fano factor.
const MEAN_EPSILON: f64 = 1e-7;

/// One detected SCR peak. Derived, ephemeral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrPeak {
    pub sample_index: usize,
    pub height: f64,
    pub prominence: f64,
}

/// Feature vector for one (recording, channel) pair. Non-SCR channels
/// populate only `line_length`; all other fields are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrFeatureSet {
    pub ns_scr: f64,
    pub amp_scr: f64,
    pub recovery_time: f64,
    pub line_length: f64,
    pub raw_sd: f64,
    pub norm_sd: f64,
    pub rmssd: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub fano_factor: f64,
}

impl ScrFeatureSet {
    pub const FEATURE_COUNT: usize = 10;
    pub const FEATURE_NAMES: [&'static str; Self::FEATURE_COUNT] = [
        "ns_scr",
        "amp_scr",
        "recovery_time",
        "line_length",
        "raw_sd",
        "norm_sd",
        "rmssd",
        "skewness",
        "kurtosis",
        "fano_factor",
    ];

    pub fn feature(&self, index: usize) -> f64 {
        match index {
            0 => self.ns_scr,
            1 => self.amp_scr,
            2 => self.recovery_time,
            3 => self.line_length,
            4 => self.raw_sd,
            5 => self.norm_sd,
            6 => self.rmssd,
            7 => self.skewness,
            8 => self.kurtosis,
            9 => self.fano_factor,
            _ => unreachable!("feature index out of range"),
        }
    }

    pub fn feature_mut(&mut self, index: usize) -> &mut f64 {
        match index {
            0 => &mut self.ns_scr,
            1 => &mut self.amp_scr,
            2 => &mut self.recovery_time,
            3 => &mut self.line_length,
            4 => &mut self.raw_sd,
            5 => &mut self.norm_sd,
            6 => &mut self.rmssd,
            7 => &mut self.skewness,
            8 => &mut self.kurtosis,
            9 => &mut self.fano_factor,
            _ => unreachable!("feature index out of range"),
        }
    }

    fn line_length_only(line_length: f64) -> Self {
        Self {
            ns_scr: f64::NAN,
            amp_scr: f64::NAN,
            recovery_time: f64::NAN,
            line_length,
            raw_sd: f64::NAN,
            norm_sd: f64::NAN,
            rmssd: f64::NAN,
            skewness: f64::NAN,
            kurtosis: f64::NAN,
            fano_factor: f64::NAN,
        }
    }
}

/// Detect peaks with minimum height, prominence and inter-peak distance.
///
/// Conditions apply in order: local maxima (plateaus collapse to their
/// midpoint), height filter, distance enforcement favoring higher peaks,
/// prominence filter. Peaks come back sorted by sample index.
pub fn find_peaks(
    signal: &[f64],
    min_height: f64,
    min_prominence: f64,
    min_distance: usize,
) -> Vec<ScrPeak> {
    let candidates = local_maxima(signal);

    let mut peaks: Vec<usize> = candidates
        .into_iter()
        .filter(|&p| signal[p] >= min_height)
        .collect();

    if min_distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(signal, &peaks, min_distance);
    }

    peaks
        .into_iter()
        .filter_map(|p| {
            let prominence = peak_prominence(signal, p);
            (prominence >= min_prominence).then_some(ScrPeak {
                sample_index: p,
                height: signal[p],
                prominence,
            })
        })
        .collect()
}

/// Strict local maxima; a flat-topped peak reports the middle of its
/// plateau.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut maxima = Vec::new();
    let mut i = 1;

    while n >= 3 && i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    maxima
}

/// Keep the highest peaks first, discarding neighbors closer than
/// `min_distance` samples.
fn select_by_distance(signal: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[b]].partial_cmp(&signal[peaks[a]]).unwrap());

    for &k in &order {
        if !keep[k] {
            continue;
        }
        let mut j = k;
        while j > 0 && peaks[k] - peaks[j - 1] < min_distance {
            j -= 1;
            keep[j] = false;
        }
        let mut j = k + 1;
        while j < peaks.len() && peaks[j] - peaks[k] < min_distance {
            keep[j] = false;
            j += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Topographic prominence: height above the higher of the two bases found
/// by walking outward until a taller sample or the signal bound.
fn peak_prominence(signal: &[f64], peak: usize) -> f64 {
    let height = signal[peak];

    let mut left_min = height;
    let mut i = peak;
    while i > 0 && signal[i - 1] <= height {
        i -= 1;
        left_min = left_min.min(signal[i]);
    }

    let mut right_min = height;
    let mut i = peak;
    while i + 1 < signal.len() && signal[i + 1] <= height {
        i += 1;
        right_min = right_min.min(signal[i]);
    }

    height - left_min.max(right_min)
}

/// Sum of absolute consecutive differences (total variation).
pub fn line_length(signal: &[f64]) -> f64 {
    signal.windows(2).map(|w| (w[1] - w[0]).abs()).sum()
}

/// Extract the feature vector for one channel. `normalized` is the z-scored
/// form of `raw`; peaks and shape statistics are measured on it, while SD
/// and Fano factor also look at the raw samples.
pub fn extract_features(
    raw: &Array1<f64>,
    normalized: &Array1<f64>,
    channel_type: ChannelType,
    fs: f64,
    peak_config: &ScrPeakConfig,
) -> ScrFeatureSet {
    let norm = normalized.as_slice().expect("contiguous signal");
    let ll = line_length(norm);

    if channel_type != ChannelType::SkinConductance {
        return ScrFeatureSet::line_length_only(ll);
    }

    let min_distance = ((fs * peak_config.min_distance_sec) as usize).max(1);
    let peaks = find_peaks(
        norm,
        peak_config.min_height,
        peak_config.min_prominence,
        min_distance,
    );

    let ns_scr = peaks.len() as f64;
    let amp_scr = if peaks.is_empty() {
        0.0
    } else {
        peaks.iter().map(|p| p.height).sum::<f64>() / peaks.len() as f64
    };

    // Half-amplitude recovery: first sample at or below 50% of each peak's
    // height, scanning forward from the peak.
    let recovery_times: Vec<f64> = peaks
        .iter()
        .filter_map(|p| {
            let half = 0.5 * p.height;
            norm[p.sample_index..]
                .iter()
                .position(|&v| v <= half)
                .map(|offset| offset as f64 / fs)
        })
        .collect();
    let recovery_time = if recovery_times.is_empty() {
        0.0
    } else {
        recovery_times.iter().sum::<f64>() / recovery_times.len() as f64
    };

    let raw_slice = raw.as_slice().expect("contiguous signal");
    let raw_mean = mean(raw_slice);
    let raw_var = sample_variance(raw_slice);
    let fano_factor = if raw_mean.abs() > MEAN_EPSILON {
        raw_var / raw_mean
    } else {
        f64::NAN
    };

    ScrFeatureSet {
        ns_scr,
        amp_scr,
        recovery_time,
        line_length: ll,
        raw_sd: raw_var.sqrt(),
        norm_sd: sample_variance(norm).sqrt(),
        rmssd: rmssd(norm),
        skewness: skewness(norm),
        kurtosis: kurtosis(norm),
        fano_factor,
    }
}

fn mean(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return f64::NAN;
    }
    signal.iter().sum::<f64>() / signal.len() as f64
}

/// Unbiased (ddof = 1) variance; NaN below two samples.
fn sample_variance(signal: &[f64]) -> f64 {
    let n = signal.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(signal);
    signal.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64
}

/// Root-mean-square of successive differences.
fn rmssd(signal: &[f64]) -> f64 {
    if signal.len() < 2 {
        return f64::NAN;
    }
    let sum: f64 = signal.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    (sum / (signal.len() - 1) as f64).sqrt()
}

/// Population (biased) central moment of the given order.
fn central_moment(signal: &[f64], order: i32) -> f64 {
    let m = mean(signal);
    signal.iter().map(|&v| (v - m).powi(order)).sum::<f64>() / signal.len() as f64
}

fn skewness(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return f64::NAN;
    }
    let m2 = central_moment(signal, 2);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    central_moment(signal, 3) / m2.powf(1.5)
}

/// Excess (Fisher) kurtosis.
fn kurtosis(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return f64::NAN;
    }
    let m2 = central_moment(signal, 2);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    central_moment(signal, 4) / (m2 * m2) - 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scr_config() -> ScrPeakConfig {
        ScrPeakConfig::default()
    }

    #[test]
    fn test_line_length_time_reversal_invariant() {
        let signal = vec![0.0, 1.0, -0.5, 2.0, 1.5, -1.0, 0.25];
        let mut reversed = signal.clone();
        reversed.reverse();
        assert_relative_eq!(line_length(&signal), line_length(&reversed));
    }

    #[test]
    fn test_all_zero_scr_yields_zero_counts() {
        let raw = Array1::zeros(1000);
        let normalized = Array1::zeros(1000);
        let f = extract_features(
            &raw,
            &normalized,
            ChannelType::SkinConductance,
            100.0,
            &scr_config(),
        );

        assert_eq!(f.ns_scr, 0.0);
        assert_eq!(f.amp_scr, 0.0);
        assert_eq!(f.recovery_time, 0.0);
        assert_eq!(f.line_length, 0.0);
        // Zero-mean raw signal: Fano factor is undefined.
        assert!(f.fano_factor.is_nan());
    }

    #[test]
    fn test_triangular_pulse_recovery_time() {
        // Rise over 1 s to height 2.0, decay linearly to 0 over T = 4 s.
        let fs = 100.0;
        let mut signal = vec![0.0; 1000];
        for i in 0..100 {
            signal[i] = 2.0 * i as f64 / 100.0;
        }
        for i in 0..400 {
            signal[100 + i] = 2.0 * (1.0 - i as f64 / 400.0);
        }
        let raw = Array1::from(signal.clone());
        let normalized = Array1::from(signal);

        let f = extract_features(
            &raw,
            &normalized,
            ChannelType::SkinConductance,
            fs,
            &scr_config(),
        );

        assert_eq!(f.ns_scr, 1.0);
        assert_relative_eq!(f.amp_scr, 2.0, epsilon = 0.05);
        // Half-amplitude crossing of a linear decay sits at T/2.
        assert_relative_eq!(f.recovery_time, 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_non_scr_channel_gets_line_length_only() {
        let signal: Array1<f64> = (0..100).map(|i| (i as f64 * 0.3).sin()).collect();
        let f = extract_features(
            &signal,
            &signal,
            ChannelType::HeartRate,
            100.0,
            &scr_config(),
        );

        assert!(f.line_length > 0.0);
        assert!(f.ns_scr.is_nan());
        assert!(f.amp_scr.is_nan());
        assert!(f.raw_sd.is_nan());
        assert!(f.fano_factor.is_nan());
    }

    #[test]
    fn test_find_peaks_height_filter() {
        let signal = vec![0.0, 1.0, 0.0, 0.2, 0.0, 3.0, 0.0];
        let peaks = find_peaks(&signal, 0.5, 0.0, 1);
        let indices: Vec<usize> = peaks.iter().map(|p| p.sample_index).collect();
        assert_eq!(indices, vec![1, 5]);
    }

    #[test]
    fn test_find_peaks_distance_keeps_highest() {
        let signal = vec![0.0, 1.0, 0.5, 2.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 0.0, 4);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].sample_index, 3);
    }

    #[test]
    fn test_find_peaks_prominence_filter() {
        // Second bump only rises 0.3 above its saddle.
        let signal = vec![0.0, 2.0, 1.0, 1.3, 0.0];
        let peaks = find_peaks(&signal, 0.0, 0.5, 1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].sample_index, 1);
        assert_relative_eq!(peaks[0].prominence, 2.0);
    }

    #[test]
    fn test_plateau_peak_reports_midpoint() {
        let signal = vec![0.0, 1.0, 1.0, 1.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 0.0, 1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].sample_index, 2);
    }

    #[test]
    fn test_rmssd_and_moments() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // Successive differences are all 1.
        assert_relative_eq!(rmssd(&signal), 1.0);
        // A symmetric ramp has zero skewness.
        assert_relative_eq!(skewness(&signal), 0.0, epsilon = 1e-12);
        assert_relative_eq!(sample_variance(&signal), 2.5);
    }

    #[test]
    fn test_short_signals_degrade_to_nan() {
        assert!(sample_variance(&[1.0]).is_nan());
        assert!(rmssd(&[1.0]).is_nan());
        assert!(skewness(&[]).is_nan());
        assert_eq!(line_length(&[]), 0.0);
    }
}
