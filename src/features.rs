//! Feature table assembly and z-score normalization.

use ndarray::Array1;
use serde::Serialize;

use crate::channel::ChannelType;
use crate::scr::ScrFeatureSet;

/// Z-score a signal to zero mean and unit variance (population SD). A
/// constant signal maps to all zeros.
pub fn z_normalize(signal: &Array1<f64>) -> Array1<f64> {
    let n = signal.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let mean = signal.mean().unwrap_or(0.0);
    let sd = signal.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0).sqrt();
    if sd == 0.0 {
        return Array1::zeros(n);
    }
    signal.mapv(|v| (v - mean) / sd)
}

/// One feature row per (recording, channel) pair.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRow {
    pub file: String,
    pub channel: String,
    pub channel_type: ChannelType,
    pub features: ScrFeatureSet,
}

/// Feature rows for a whole batch, with column-wise normalization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Z-score every feature column in place using the sample SD over the
    /// column's defined (non-NaN) entries. A constant or degenerate column
    /// becomes all zeros; otherwise NaN cells stay NaN.
    pub fn normalize_columns(&mut self) {
        for index in 0..ScrFeatureSet::FEATURE_COUNT {
            let values: Vec<f64> = self
                .rows
                .iter()
                .map(|r| r.features.feature(index))
                .filter(|v| !v.is_nan())
                .collect();

            let n = values.len();
            let mean = if n > 0 {
                values.iter().sum::<f64>() / n as f64
            } else {
                0.0
            };
            let sd = if n > 1 {
                (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64)
                    .sqrt()
            } else {
                0.0
            };

            if sd > 0.0 {
                for row in &mut self.rows {
                    let cell = row.features.feature_mut(index);
                    if !cell.is_nan() {
                        *cell = (*cell - mean) / sd;
                    }
                }
            } else {
                for row in &mut self.rows {
                    *row.features.feature_mut(index) = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scr_row(file: &str, line_length: f64, raw_sd: f64) -> FeatureRow {
        FeatureRow {
            file: file.to_string(),
            channel: "scr r".to_string(),
            channel_type: ChannelType::SkinConductance,
            features: ScrFeatureSet {
                ns_scr: 1.0,
                amp_scr: 0.5,
                recovery_time: 1.0,
                line_length,
                raw_sd,
                norm_sd: 1.0,
                rmssd: 0.1,
                skewness: 0.0,
                kurtosis: 0.0,
                fano_factor: f64::NAN,
            },
        }
    }

    #[test]
    fn test_z_normalize_mean_and_sd() {
        let signal = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = z_normalize(&signal);

        assert_relative_eq!(out.mean().unwrap(), 0.0, epsilon = 1e-12);
        let sd = out.mapv(|v| v * v).mean().unwrap().sqrt();
        assert_relative_eq!(sd, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_z_normalize_constant_is_zeros() {
        let signal = Array1::from_elem(16, 7.0);
        let out = z_normalize(&signal);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_columns_normalized_to_unit_scale() {
        let mut table = FeatureTable::default();
        table.push(scr_row("a", 10.0, 1.0));
        table.push(scr_row("b", 20.0, 2.0));
        table.push(scr_row("c", 30.0, 4.0));
        table.normalize_columns();

        let col: Vec<f64> = table.rows.iter().map(|r| r.features.line_length).collect();
        let mean = col.iter().sum::<f64>() / col.len() as f64;
        let sd = (col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
            / (col.len() - 1) as f64)
            .sqrt();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(sd, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_becomes_zero() {
        let mut table = FeatureTable::default();
        table.push(scr_row("a", 10.0, 1.0));
        table.push(scr_row("b", 20.0, 1.0));
        table.normalize_columns();

        // raw_sd was constant across rows.
        assert!(table.rows.iter().all(|r| r.features.raw_sd == 0.0));
        // fano_factor was all-NaN, so the whole column collapses to zero.
        assert!(table.rows.iter().all(|r| r.features.fano_factor == 0.0));
    }

    #[test]
    fn test_nan_cells_survive_in_varying_columns() {
        let mut table = FeatureTable::default();
        table.push(scr_row("a", 10.0, 1.0));
        table.push(scr_row("b", 20.0, 2.0));
        let mut nan_row = scr_row("c", f64::NAN, 3.0);
        nan_row.features.line_length = f64::NAN;
        table.push(nan_row);
        table.normalize_columns();

        assert!(table.rows[2].features.line_length.is_nan());
        assert!(!table.rows[0].features.line_length.is_nan());
    }
}
