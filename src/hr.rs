//! Adaptive heart-rate extraction from a filtered PPG channel.
//!
//! Batch form of a real-time cardiotachometer: one forward pass over the
//! samples drives an explicit state record through three exponential filter
//! stages, an adaptive rising-edge detector and a smoothed inter-beat rate
//! estimate. The trace decays while no beats are accepted.
//!
//! The inter-beat timer resets on *every* threshold crossing, accepted or
//! not; a burst of near-threshold noise can therefore reset timing without
//! ever updating the smoothed rate.

use ndarray::Array1;

/// Exponential prefilter cutoffs (Hz).
const LPF1_HZ: f64 = 2.0;
const HPF1_HZ: f64 = 0.5;
const HPF2_HZ: f64 = 2.0;

/// Beat acceptance window in seconds (about 30-180 bpm).
const MIN_INTERVAL_SEC: f64 = 0.33;
const MAX_INTERVAL_SEC: f64 = 2.0;

/// Rate smoothing: new beat weight vs. carried value.
const SMOOTH_NEW: f64 = 0.2;
const SMOOTH_OLD: f64 = 0.8;

/// Idle decay: after this long without an accepted beat the trace shrinks
/// by the decay factor every sample.
const IDLE_SEC: f64 = 2.0;
const IDLE_DECAY: f64 = 0.95;

const INITIAL_BPM: f64 = 60.0;

/// Adaptive threshold: scaled percentile of |prefiltered| over a centered
/// window, with a floor for empty windows.
const THRESHOLD_WINDOW_SEC: f64 = 5.0;
const THRESHOLD_PERCENTILE: f64 = 70.0;
const THRESHOLD_SCALE: f64 = 0.7;
const THRESHOLD_FLOOR: f64 = 0.01;

/// Scalar state carried across samples. Created once per PPG channel,
/// threaded sample-by-sample, discarded after the trace is produced.
#[derive(Debug, Clone, Copy)]
pub struct HeartRateState {
    pub lpf1: f64,
    pub hpf1: f64,
    pub hpf2: f64,
    pub css_time: f64,
    pub css_value: f64,
    pub css_value_prev: f64,
    pub prefiltered_prev: f64,
    pub last_peak_time: f64,
}

impl HeartRateState {
    /// Seed the state from the first PPG sample.
    pub fn new(first_sample: f64) -> Self {
        Self {
            lpf1: first_sample,
            hpf1: 0.0,
            hpf2: 0.0,
            css_time: 0.0,
            css_value: INITIAL_BPM,
            css_value_prev: INITIAL_BPM,
            prefiltered_prev: 0.0,
            last_peak_time: 0.0,
        }
    }

    /// One exponential band-pass step; returns the prefiltered sample.
    ///
    /// Low-pass at 2 Hz, then two cascaded high-pass stages (0.5 Hz and
    /// 2 Hz) remove the baseline and residual drift.
    pub fn prefilter_step(&mut self, x: f64, a_lpf1: f64, a_hpf1: f64, a_hpf2: f64) -> f64 {
        self.lpf1 += (x - self.lpf1) * a_lpf1;
        self.hpf1 += (self.lpf1 - self.hpf1) * a_hpf1;
        let pre = self.lpf1 - self.hpf1;
        self.hpf2 += (pre - self.hpf2) * a_hpf2;
        pre - self.hpf2
    }

    /// One beat-tracking step at time `t = i * dt`; returns the emitted
    /// heart-rate sample.
    pub fn beat_step(&mut self, pre: f64, threshold: f64, threshold_prev: f64, t: f64, dt: f64) -> f64 {
        self.css_time += dt;

        let crossing = pre > threshold && self.prefiltered_prev <= threshold_prev;
        if crossing {
            if self.css_time > MIN_INTERVAL_SEC && self.css_time < MAX_INTERVAL_SEC {
                let instant = 60.0 / self.css_time;
                self.css_value = SMOOTH_NEW * instant + SMOOTH_OLD * self.css_value_prev;
                self.css_value_prev = self.css_value;
                self.last_peak_time = t;
            }
            // Timer resets on every crossing, accepted or not.
            self.css_time = 0.0;
        }
        self.prefiltered_prev = pre;

        if t - self.last_peak_time > IDLE_SEC {
            self.css_value *= IDLE_DECAY;
        }

        self.css_value
    }
}

/// Single-pass PPG-to-HR extractor.
pub struct HeartRateExtractor {
    fs: f64,
}

impl HeartRateExtractor {
    pub fn new(fs: f64) -> Self {
        Self { fs: fs.max(1e-3) }
    }

    /// Produce an instantaneous heart-rate trace the same length as the
    /// input. Index 0 is the unfilled initial placeholder (0.0). This stage
    /// never errors; length-0/1 inputs yield trivially empty/zero output.
    pub fn extract(&self, ppg: &Array1<f64>) -> Array1<f64> {
        let n = ppg.len();
        let mut hr = vec![0.0; n];
        if n < 2 {
            return Array1::from(hr);
        }

        let dt = 1.0 / self.fs;
        let a_lpf1 = 1.0 - (-2.0 * std::f64::consts::PI * LPF1_HZ * dt).exp();
        let a_hpf1 = 1.0 - (-2.0 * std::f64::consts::PI * HPF1_HZ * dt).exp();
        let a_hpf2 = 1.0 - (-2.0 * std::f64::consts::PI * HPF2_HZ * dt).exp();

        let mut state = HeartRateState::new(ppg[0]);
        let prefiltered: Vec<f64> = ppg
            .iter()
            .map(|&x| state.prefilter_step(x, a_lpf1, a_hpf1, a_hpf2))
            .collect();

        let threshold = adaptive_threshold(&prefiltered, self.fs);

        state.prefiltered_prev = prefiltered[0];
        for i in 1..n {
            hr[i] = state.beat_step(
                prefiltered[i],
                threshold[i],
                threshold[i - 1],
                i as f64 * dt,
                dt,
            );
        }

        Array1::from(hr)
    }
}

/// Per-sample adaptive threshold: the 70th percentile of `|prefiltered|`
/// over a 5 s window centered on the sample (clipped at the signal bounds),
/// scaled by 0.7. Maintained incrementally with a sorted sliding window; the
/// result is identical to recomputing the windowed percentile per sample.
pub fn adaptive_threshold(prefiltered: &[f64], fs: f64) -> Vec<f64> {
    let n = prefiltered.len();
    let mut out = vec![0.0; n];

    let window = (THRESHOLD_WINDOW_SEC * fs) as usize;
    let half = window / 2;
    let magnitudes: Vec<f64> = prefiltered.iter().map(|v| v.abs()).collect();

    let mut sorted: Vec<f64> = Vec::with_capacity(window + 1);
    let mut cur_lo = 0usize;
    let mut cur_hi = 0usize;

    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n);

        while cur_hi < hi {
            let v = magnitudes[cur_hi];
            let pos = sorted.partition_point(|&s| s < v);
            sorted.insert(pos, v);
            cur_hi += 1;
        }
        while cur_lo < lo {
            let v = magnitudes[cur_lo];
            let pos = sorted.partition_point(|&s| s < v);
            sorted.remove(pos);
            cur_lo += 1;
        }

        out[i] = if sorted.is_empty() {
            THRESHOLD_FLOOR
        } else {
            percentile(&sorted, THRESHOLD_PERCENTILE) * THRESHOLD_SCALE
        };
    }

    out
}

/// Linear-interpolation percentile of an already-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q / 100.0;
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    if lo + 1 < n {
        sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
    } else {
        sorted[lo]
    }
}
