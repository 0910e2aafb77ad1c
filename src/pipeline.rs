//! End-to-end orchestration: preprocessing, heart-rate synthesis, feature
//! extraction and batch normalization.

use std::path::Path;

use tracing::{info, warn};

use crate::channel::{classify_and_resample, ChannelType, ProcessedChannel, RawChannel};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::{z_normalize, FeatureRow, FeatureTable};
use crate::filters::apply_cascade;
use crate::hr::HeartRateExtractor;
use crate::scr::extract_features;
use crate::snapshot::ProcessedRecording;

/// Label given to the heart-rate trace derived from the PPG channel.
pub const CALCULATED_HR_LABEL: &str = "HR (calculated)";

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify, resample and filter a raw recording, then derive a
    /// heart-rate channel from the first filtered PPG trace. The derived
    /// trace replaces any recorded heart-rate channel, or is appended when
    /// no such channel exists.
    pub fn preprocess_recording(&self, raw: &[RawChannel]) -> Vec<ProcessedChannel> {
        let fs = self.config.target_rate;
        let mut channels = classify_and_resample(raw, &self.config.exclude_labels, fs);

        let mut filtered_ppg = None;
        for ch in &mut channels {
            let config = self.config.filters.get(ch.channel_type);
            ch.samples = apply_cascade(&ch.samples, fs, config);
            if ch.channel_type == ChannelType::Photoplethysmogram && filtered_ppg.is_none() {
                filtered_ppg = Some(ch.samples.clone());
            }
        }

        if let Some(ppg) = filtered_ppg {
            let hr = HeartRateExtractor::new(fs).extract(&ppg);
            let derived = ProcessedChannel {
                label: CALCULATED_HR_LABEL.to_string(),
                channel_type: ChannelType::HeartRate,
                samples: hr,
            };
            match channels
                .iter_mut()
                .find(|c| c.channel_type == ChannelType::HeartRate)
            {
                Some(existing) => *existing = derived,
                None => channels.push(derived),
            }
        }

        channels
    }

    /// Preprocess a raw recording and capture the result as a snapshot.
    pub fn preprocess_to_snapshot(&self, raw: &[RawChannel]) -> ProcessedRecording {
        let channels = self.preprocess_recording(raw);
        ProcessedRecording::from_channels(&channels, self.config.target_rate)
    }

    /// Extract one feature row per channel of a preprocessed recording.
    /// When a window is configured, features are measured on the windowed
    /// slice only.
    pub fn analyze_recording(&self, file: &str, channels: &[ProcessedChannel]) -> FeatureTable {
        let fs = self.config.target_rate;
        let mut table = FeatureTable::default();

        for ch in channels {
            let (start, end) = match &self.config.window {
                Some(window) => window.clamp_to(ch.samples.len(), fs),
                None => (0, ch.samples.len()),
            };
            if start >= end {
                warn!(file, channel = %ch.label, "empty analysis window, skipping channel");
                continue;
            }

            let raw = ch.samples.slice(ndarray::s![start..end]).to_owned();
            let normalized = z_normalize(&raw);
            let features = extract_features(
                &raw,
                &normalized,
                ch.channel_type,
                fs,
                &self.config.scr_peaks,
            );

            table.push(FeatureRow {
                file: file.to_string(),
                channel: ch.label.clone(),
                channel_type: ch.channel_type,
                features,
            });
        }

        table
    }

    /// Run the whole pipeline over a batch of raw recordings and z-score
    /// the feature columns across the batch.
    pub fn run_batch<I, S>(&self, recordings: I) -> FeatureTable
    where
        I: IntoIterator<Item = (S, Vec<RawChannel>)>,
        S: AsRef<str>,
    {
        let mut table = FeatureTable::default();

        for (file, raw) in recordings {
            let file = file.as_ref();
            let channels = self.preprocess_recording(&raw);
            if channels.is_empty() {
                warn!(file, "no usable channels in recording");
                continue;
            }
            info!(file, channels = channels.len(), "processed recording");
            let rows = self.analyze_recording(file, &channels);
            table.rows.extend(rows.rows);
        }

        table.normalize_columns();
        table
    }

    /// Feature extraction over previously saved snapshots. Unreadable
    /// snapshots are logged and skipped rather than failing the batch.
    pub fn run_snapshot_batch<I, P>(&self, paths: I) -> Result<FeatureTable>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut table = FeatureTable::default();

        for path in paths {
            let path = path.as_ref();
            let snapshot = match ProcessedRecording::load_json(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable snapshot");
                    continue;
                }
            };
            let file = path.to_string_lossy().into_owned();
            let channels = snapshot.into_channels();
            let rows = self.analyze_recording(&file, &channels);
            table.rows.extend(rows.rows);
        }

        table.normalize_columns();
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisWindow;

    fn sine(freq: f64, fs: f64, seconds: f64) -> Vec<f64> {
        let n = (fs * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn raw(label: &str, fs: f64, samples: Vec<f64>) -> RawChannel {
        RawChannel {
            label: label.to_string(),
            sampling_rate: fs,
            samples,
        }
    }

    fn short_config() -> PipelineConfig {
        PipelineConfig {
            window: None,
            exclude_labels: vec!["scr l".to_string(), "ppg l".to_string()],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_hr_channel_appended_from_ppg() {
        let pipeline = Pipeline::new(short_config());
        let raw_channels = vec![raw("PPG H", 100.0, sine(1.25, 100.0, 20.0))];
        let channels = pipeline.preprocess_recording(&raw_channels);

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].label, CALCULATED_HR_LABEL);
        assert_eq!(channels[1].channel_type, ChannelType::HeartRate);
        assert_eq!(channels[1].samples.len(), channels[0].samples.len());
    }

    #[test]
    fn test_hr_channel_replaces_recorded_trace() {
        let pipeline = Pipeline::new(short_config());
        let raw_channels = vec![
            raw("HR", 100.0, vec![70.0; 2000]),
            raw("PPG H", 100.0, sine(1.25, 100.0, 20.0)),
        ];
        let channels = pipeline.preprocess_recording(&raw_channels);

        assert_eq!(channels.len(), 2);
        let hr: Vec<_> = channels
            .iter()
            .filter(|c| c.channel_type == ChannelType::HeartRate)
            .collect();
        assert_eq!(hr.len(), 1);
        assert_eq!(hr[0].label, CALCULATED_HR_LABEL);
    }

    #[test]
    fn test_excluded_and_unknown_channels_dropped() {
        let pipeline = Pipeline::new(short_config());
        let raw_channels = vec![
            raw("SCR L", 100.0, vec![0.5; 1000]),
            raw("marker", 100.0, vec![0.0; 1000]),
            raw("SCR R", 100.0, vec![0.5; 1000]),
        ];
        let channels = pipeline.preprocess_recording(&raw_channels);

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].label, "scr r");
    }

    #[test]
    fn test_resampled_to_target_rate() {
        let pipeline = Pipeline::new(short_config());
        let raw_channels = vec![raw("SCR R", 250.0, vec![0.5; 2500])];
        let channels = pipeline.preprocess_recording(&raw_channels);

        // 10 s at 250 Hz becomes 10 s at 100 Hz.
        assert_eq!(channels[0].samples.len(), 1000);
    }

    #[test]
    fn test_window_falls_back_on_short_channel() {
        let config = PipelineConfig {
            window: Some(AnalysisWindow {
                start_sec: 130.0,
                end_sec: 1250.0,
            }),
            ..short_config()
        };
        let pipeline = Pipeline::new(config);

        // 10 s of data, window starts at 130 s: the clamp falls back to the
        // head of the recording and the channel is still analyzed.
        let channels = vec![ProcessedChannel {
            label: "scr r".to_string(),
            channel_type: ChannelType::SkinConductance,
            samples: ndarray::Array1::from(sine(0.1, 100.0, 10.0)),
        }];
        let table = pipeline.analyze_recording("rec", &channels);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_batch_rows_and_normalization() {
        let pipeline = Pipeline::new(short_config());
        let recordings = vec![
            ("a".to_string(), vec![raw("SCR R", 100.0, sine(0.3, 100.0, 30.0))]),
            ("b".to_string(), vec![raw("SCR R", 100.0, sine(0.5, 100.0, 30.0))]),
        ];
        let table = pipeline.run_batch(recordings);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].file, "a");
        assert_eq!(table.rows[1].file, "b");
        // After batch normalization every defined cell is finite.
        for row in &table.rows {
            for index in 0..crate::scr::ScrFeatureSet::FEATURE_COUNT {
                assert!(row.features.feature(index).is_finite());
            }
        }
    }
}
