//! Per-channel-type Butterworth filter cascades.
//!
//! Each channel type gets a causal high-pass-then-low-pass Butterworth pair,
//! realized as cascaded second-order sections for numerical stability, plus
//! an optional polarity inversion. Order 0 or cutoff 0 bypasses that stage
//! entirely. This is a pure batch transform: no state survives across
//! channels or recordings.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::channel::ChannelType;

/// Filter settings for one channel type. Order 0 or cutoff 0 means "bypass
/// this stage".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub hp_order: usize,
    pub hp_cutoff_hz: f64,
    pub lp_order: usize,
    pub lp_cutoff_hz: f64,
    pub invert: bool,
}

impl FilterConfig {
    /// Identity configuration: both stages bypassed, no inversion.
    pub const fn bypass() -> Self {
        Self {
            hp_order: 0,
            hp_cutoff_hz: 0.0,
            lp_order: 0,
            lp_cutoff_hz: 0.0,
            invert: false,
        }
    }
}

/// Flat `ChannelType -> FilterConfig` lookup table. Adding a channel type
/// means adding one field here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBank {
    pub upper_respiration: FilterConfig,
    pub lower_respiration: FilterConfig,
    pub skin_conductance: FilterConfig,
    pub photoplethysmogram: FilterConfig,
    pub heart_rate: FilterConfig,
}

impl FilterBank {
    pub fn get(&self, channel_type: ChannelType) -> &FilterConfig {
        match channel_type {
            ChannelType::UpperRespiration => &self.upper_respiration,
            ChannelType::LowerRespiration => &self.lower_respiration,
            ChannelType::SkinConductance => &self.skin_conductance,
            ChannelType::Photoplethysmogram => &self.photoplethysmogram,
            ChannelType::HeartRate => &self.heart_rate,
        }
    }
}

impl Default for FilterBank {
    /// Reference settings: gentle order-1 band for the slow channels, a
    /// wider order-2 band for the PPG, identity for an already-derived HR
    /// channel. Everything except HR is polarity-inverted by the sensor
    /// convention.
    fn default() -> Self {
        Self {
            upper_respiration: FilterConfig {
                hp_order: 1,
                hp_cutoff_hz: 0.1,
                lp_order: 1,
                lp_cutoff_hz: 0.2,
                invert: true,
            },
            lower_respiration: FilterConfig {
                hp_order: 1,
                hp_cutoff_hz: 0.1,
                lp_order: 1,
                lp_cutoff_hz: 0.2,
                invert: true,
            },
            skin_conductance: FilterConfig {
                hp_order: 1,
                hp_cutoff_hz: 0.1,
                lp_order: 1,
                lp_cutoff_hz: 0.25,
                invert: true,
            },
            photoplethysmogram: FilterConfig {
                hp_order: 2,
                hp_cutoff_hz: 1.25,
                lp_order: 2,
                lp_cutoff_hz: 12.5,
                invert: true,
            },
            heart_rate: FilterConfig {
                hp_order: 0,
                hp_cutoff_hz: 0.0,
                lp_order: 0,
                lp_cutoff_hz: 0.0,
                invert: false,
            },
        }
    }
}

/// One second-order section (biquad), coefficients normalized by a0.
/// First-order sections use the same shape with `b2 == a2 == 0`.
#[derive(Debug, Clone, Copy)]
struct Sos {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

/// Design an order-N Butterworth filter as second-order sections via the
/// bilinear transform with frequency prewarping. Odd orders get one
/// first-order tail section.
fn butterworth_sos(order: usize, cutoff_hz: f64, fs: f64, highpass: bool) -> Vec<Sos> {
    // Normalized cutoff clamped below Nyquist to keep sections stable.
    let wn = (cutoff_hz / (fs * 0.5)).clamp(1e-6, 0.999);
    let w0 = PI * wn;
    let (cos_w0, sin_w0) = (w0.cos(), w0.sin());

    let mut sections = Vec::with_capacity(order / 2 + 1);

    // Pole-pair quality factors of the Butterworth prototype.
    let pairs = order / 2;
    for k in 0..pairs {
        let theta = if order % 2 == 0 {
            (2 * k + 1) as f64 * PI / (2 * order) as f64
        } else {
            (k + 1) as f64 * PI / order as f64
        };
        let q = 1.0 / (2.0 * theta.cos());
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1) = if highpass {
            ((1.0 + cos_w0) / 2.0 / a0, -(1.0 + cos_w0) / a0)
        } else {
            ((1.0 - cos_w0) / 2.0 / a0, (1.0 - cos_w0) / a0)
        };
        sections.push(Sos {
            b0,
            b1,
            b2: b0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        });
    }

    if order % 2 == 1 {
        let k = (w0 / 2.0).tan();
        let a1 = (k - 1.0) / (k + 1.0);
        if highpass {
            sections.push(Sos {
                b0: 1.0 / (k + 1.0),
                b1: -1.0 / (k + 1.0),
                b2: 0.0,
                a1,
                a2: 0.0,
            });
        } else {
            sections.push(Sos {
                b0: k / (k + 1.0),
                b1: k / (k + 1.0),
                b2: 0.0,
                a1,
                a2: 0.0,
            });
        }
    }

    sections
}

/// Causal filtering through a section cascade, direct form II transposed,
/// zero initial state.
fn sosfilt(sections: &[Sos], samples: &mut [f64]) {
    for s in sections {
        let mut z1 = 0.0;
        let mut z2 = 0.0;
        for v in samples.iter_mut() {
            let x = *v;
            let y = s.b0 * x + z1;
            z1 = s.b1 * x - s.a1 * y + z2;
            z2 = s.b2 * x - s.a2 * y;
            *v = y;
        }
    }
}

/// Causal high-pass Butterworth. `order == 0 || cutoff == 0` is the identity.
pub fn highpass(signal: &Array1<f64>, fs: f64, order: usize, cutoff_hz: f64) -> Array1<f64> {
    if order == 0 || cutoff_hz == 0.0 {
        return signal.clone();
    }
    let sections = butterworth_sos(order, cutoff_hz, fs, true);
    let mut out = signal.to_vec();
    sosfilt(&sections, &mut out);
    Array1::from(out)
}

/// Causal low-pass Butterworth. `order == 0 || cutoff == 0` is the identity.
pub fn lowpass(signal: &Array1<f64>, fs: f64, order: usize, cutoff_hz: f64) -> Array1<f64> {
    if order == 0 || cutoff_hz == 0.0 {
        return signal.clone();
    }
    let sections = butterworth_sos(order, cutoff_hz, fs, false);
    let mut out = signal.to_vec();
    sosfilt(&sections, &mut out);
    Array1::from(out)
}

/// High-pass, then low-pass, then optional polarity inversion.
pub fn apply_cascade(signal: &Array1<f64>, fs: f64, config: &FilterConfig) -> Array1<f64> {
    let out = highpass(signal, fs, config.hp_order, config.hp_cutoff_hz);
    let mut out = lowpass(&out, fs, config.lp_order, config.lp_cutoff_hz);
    if config.invert {
        out.mapv_inplace(|v| -v);
    }
    out
}
