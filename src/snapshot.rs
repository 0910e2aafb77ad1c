//! JSON snapshots of preprocessed recordings.
//!
//! A snapshot captures the result of preprocessing so downstream feature
//! extraction can run without redoing the filtering work. Channels are
//! stored column-wise with one label, one type tag and one sample vector
//! per channel, all at the shared post-resampling rate.

use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelType, ProcessedChannel};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecording {
    pub labels: Vec<String>,
    pub types: Vec<ChannelType>,
    pub signals: Vec<Vec<f64>>,
    pub sampling_rate: f64,
}

impl ProcessedRecording {
    pub fn from_channels(channels: &[ProcessedChannel], sampling_rate: f64) -> Self {
        Self {
            labels: channels.iter().map(|c| c.label.clone()).collect(),
            types: channels.iter().map(|c| c.channel_type).collect(),
            signals: channels.iter().map(|c| c.samples.to_vec()).collect(),
            sampling_rate,
        }
    }

    pub fn into_channels(self) -> Vec<ProcessedChannel> {
        self.labels
            .into_iter()
            .zip(self.types)
            .zip(self.signals)
            .map(|((label, channel_type), samples)| ProcessedChannel {
                label,
                channel_type,
                samples: Array1::from(samples),
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.labels.len() != self.types.len() || self.labels.len() != self.signals.len() {
            return Err(PipelineError::config(format!(
                "snapshot arrays disagree: {} labels, {} types, {} signals",
                self.labels.len(),
                self.types.len(),
                self.signals.len()
            )));
        }
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self).map_err(|e| {
            PipelineError::serialization(format!("encoding snapshot for {}", path.display()), e)
        })?;
        fs::write(path, json)
            .map_err(|e| PipelineError::io(format!("writing snapshot {}", path.display()), e))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading snapshot {}", path.display()), e))?;
        let snapshot: Self = serde_json::from_str(&json).map_err(|e| {
            PipelineError::serialization(format!("decoding snapshot {}", path.display()), e)
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recording() -> ProcessedRecording {
        ProcessedRecording {
            labels: vec!["scr r".to_string(), "ppg h".to_string()],
            types: vec![
                ChannelType::SkinConductance,
                ChannelType::Photoplethysmogram,
            ],
            signals: vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]],
            sampling_rate: 100.0,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let recording = sample_recording();
        let json = serde_json::to_string(&recording).unwrap();
        let back: ProcessedRecording = serde_json::from_str(&json).unwrap();
        assert_eq!(recording, back);
    }

    #[test]
    fn test_channel_round_trip() {
        let recording = sample_recording();
        let channels = recording.clone().into_channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].label, "scr r");
        assert_eq!(channels[1].samples.to_vec(), vec![3.0, 4.0, 5.0]);

        let rebuilt = ProcessedRecording::from_channels(&channels, 100.0);
        assert_eq!(recording, rebuilt);
    }

    #[test]
    fn test_mismatched_arrays_rejected() {
        let mut recording = sample_recording();
        recording.signals.pop();
        assert!(recording.validate().is_err());
    }
}
