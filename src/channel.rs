//! Channel model, classification and resampling.
//!
//! Raw channels arrive with arbitrary labels and per-channel sampling rates.
//! This module drops excluded channels, tags the rest by semantic type from
//! their labels, and resamples every retained channel to one target rate so
//! that all downstream stages see a uniform time base.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resample;

/// One channel as delivered by the recording reader. Immutable once read.
#[derive(Debug, Clone)]
pub struct RawChannel {
    pub label: String,
    pub sampling_rate: f64,
    pub samples: Vec<f64>,
}

/// Semantic channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    UpperRespiration,
    LowerRespiration,
    SkinConductance,
    Photoplethysmogram,
    HeartRate,
}

/// A classified channel at the uniform target sampling rate.
#[derive(Debug, Clone)]
pub struct ProcessedChannel {
    pub label: String,
    pub channel_type: ChannelType,
    pub samples: Array1<f64>,
}

/// Ordered label rules, first match wins. Adding a channel type means adding
/// one row here (and one filter table entry).
const LABEL_RULES: &[(&[&str], ChannelType)] = &[
    (&["pneumogram h"], ChannelType::UpperRespiration),
    (&["pneumogram l"], ChannelType::LowerRespiration),
    (&["scr", "gsr"], ChannelType::SkinConductance),
    (&["ppg"], ChannelType::Photoplethysmogram),
    (&["hr", "heart"], ChannelType::HeartRate),
];

/// Classify a channel label, or `None` if no rule matches.
pub fn classify_label(label: &str) -> Option<ChannelType> {
    let label = label.to_lowercase();
    LABEL_RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| label.contains(p)))
        .map(|&(_, channel_type)| channel_type)
}

/// Case-insensitive substring match against the exclude list.
pub fn is_excluded(label: &str, exclude_labels: &[String]) -> bool {
    let label = label.to_lowercase();
    exclude_labels
        .iter()
        .any(|excl| label.contains(&excl.to_lowercase()))
}

/// Drop excluded channels, classify the rest and resample every retained
/// channel to `target_rate`. Unclassified channels are dropped. Zero retained
/// channels is a valid empty result.
pub fn classify_and_resample(
    raw: &[RawChannel],
    exclude_labels: &[String],
    target_rate: f64,
) -> Vec<ProcessedChannel> {
    let mut channels = Vec::with_capacity(raw.len());

    for ch in raw {
        if is_excluded(&ch.label, exclude_labels) {
            debug!(label = %ch.label, "skipping excluded channel");
            continue;
        }
        let Some(channel_type) = classify_label(&ch.label) else {
            debug!(label = %ch.label, "skipping unclassified channel");
            continue;
        };

        let samples = resample::resample(&ch.samples, ch.sampling_rate, target_rate);
        channels.push(ProcessedChannel {
            label: ch.label.to_lowercase(),
            channel_type,
            samples,
        });
    }

    channels
}
