//! Pipeline configuration.
//!
//! Everything here is a plain input parameter supplied by the caller.
//! Validation happens by range-clamping with a warning, never by raising:
//! a bad window or negative peak height gets pulled back into range and the
//! batch keeps going.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::filters::FilterBank;

/// Peak-detection settings for skin-conductance channels, applied to the
/// z-normalized signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrPeakConfig {
    pub min_height: f64,
    pub min_prominence: f64,
    pub min_distance_sec: f64,
}

impl Default for ScrPeakConfig {
    fn default() -> Self {
        Self {
            min_height: 0.05,
            min_prominence: 0.03,
            min_distance_sec: 1.0,
        }
    }
}

/// Analysis time window in seconds from the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Fallback window length when a degenerate window is requested.
const FALLBACK_WINDOW_SEC: f64 = 30.0;

impl Default for AnalysisWindow {
    fn default() -> Self {
        Self {
            start_sec: 130.0,
            end_sec: 1250.0,
        }
    }
}

impl AnalysisWindow {
    /// Clamp the window to a signal of `len` samples at `fs` Hz, returning
    /// sample bounds. A window that ends up empty or inverted falls back to
    /// the first 30 seconds.
    pub fn clamp_to(&self, len: usize, fs: f64) -> (usize, usize) {
        let mut start = if self.start_sec < 0.0 {
            warn!(start_sec = self.start_sec, "negative window start clamped to 0");
            0
        } else {
            (self.start_sec * fs) as usize
        };
        let mut end = ((self.end_sec * fs) as usize).min(len);

        if start >= end {
            warn!(
                start_sec = self.start_sec,
                end_sec = self.end_sec,
                "invalid analysis window, falling back to the first {FALLBACK_WINDOW_SEC} s"
            );
            start = 0;
            end = ((FALLBACK_WINDOW_SEC * fs) as usize).min(len);
        }

        (start, end)
    }
}

/// Complete configuration surface of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Uniform sampling rate every retained channel is resampled to (Hz).
    pub target_rate: f64,
    /// Case-insensitive label substrings to drop before classification.
    pub exclude_labels: Vec<String>,
    /// Per-channel-type filter cascade settings.
    pub filters: FilterBank,
    /// SCR peak-detection settings.
    pub scr_peaks: ScrPeakConfig,
    /// Optional analysis window; `None` analyzes whole recordings.
    pub window: Option<AnalysisWindow>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_rate: 100.0,
            exclude_labels: vec![
                "pneumogram l".to_string(),
                "pneumogram h".to_string(),
                "scr l".to_string(),
                "ppg l".to_string(),
            ],
            filters: FilterBank::default(),
            scr_peaks: ScrPeakConfig::default(),
            window: Some(AnalysisWindow::default()),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading config {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PipelineError::config_with_source("parsing config JSON", e))?;
        Ok(config.sanitized())
    }

    /// Pull out-of-range values back into range, warning about each one.
    pub fn sanitized(mut self) -> Self {
        if self.target_rate < 1.0 {
            warn!(target_rate = self.target_rate, "target rate clamped to 1 Hz");
            self.target_rate = 1.0;
        }
        if self.scr_peaks.min_height < 0.0 {
            warn!(
                min_height = self.scr_peaks.min_height,
                "negative SCR peak height clamped to 0"
            );
            self.scr_peaks.min_height = 0.0;
        }
        if self.scr_peaks.min_prominence < 0.0 {
            warn!(
                min_prominence = self.scr_peaks.min_prominence,
                "negative SCR peak prominence clamped to 0"
            );
            self.scr_peaks.min_prominence = 0.0;
        }
        if self.scr_peaks.min_distance_sec < 0.0 {
            warn!(
                min_distance_sec = self.scr_peaks.min_distance_sec,
                "negative SCR peak distance clamped to 0"
            );
            self.scr_peaks.min_distance_sec = 0.0;
        }
        self
    }
}
