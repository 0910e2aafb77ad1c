//! # physiopipe
//!
//! Preprocessing and feature extraction for polygraph-style biosensor
//! recordings.
//!
//! This crate provides:
//! - **Preprocessing**: channel classification, Fourier resampling to a
//!   uniform rate, Butterworth high/low-pass cascades per channel type
//! - **Heart rate**: beat detection on filtered PPG with an adaptive
//!   percentile threshold
//! - **Features**: SCR peak statistics, line length, dispersion and shape
//!   measures, with batch-level column normalization
//!
//! ## Example
//!
//! ```ignore
//! use physiopipe::{Pipeline, PipelineConfig, RawChannel};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//!
//! let recordings = vec![("subject_01".to_string(), load_channels()?)];
//! let table = pipeline.run_batch(recordings);
//!
//! for row in &table.rows {
//!     println!("{} / {}: {} SCRs", row.file, row.channel, row.features.ns_scr);
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod features;
pub mod filters;
pub mod hr;
pub mod pipeline;
pub mod resample;
pub mod scr;
pub mod snapshot;

pub use channel::{ChannelType, ProcessedChannel, RawChannel};
pub use config::{AnalysisWindow, PipelineConfig, ScrPeakConfig};
pub use error::{PipelineError, Result};
pub use features::{FeatureRow, FeatureTable};
pub use filters::{FilterBank, FilterConfig};
pub use hr::{HeartRateExtractor, HeartRateState};
pub use pipeline::{Pipeline, CALCULATED_HR_LABEL};
pub use resample::resample;
pub use scr::{extract_features, find_peaks, ScrFeatureSet, ScrPeak};
pub use snapshot::ProcessedRecording;
