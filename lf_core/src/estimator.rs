//! Line position estimation from one reflectance frame.
//!
//! Three gates run in order, each short-circuiting the next:
//! contrast, edge saturation, then the signal floor of the weighted centroid.
//! Whenever a gate judges the frame untrustworthy the last confident position
//! is returned unchanged.

use lf_traits::{SENSOR_COUNT, SensorFrame};
use tracing::debug;

use crate::config::EstimatorCfg;

/// Magnitude of the largest reportable position.
pub const POSITION_LIMIT: i16 = 127;

/// Per-sensor spatial weights, left to right.
const WEIGHTS: [f64; SENSOR_COUNT] = [-52.5, -37.5, -22.5, -7.5, 7.5, 22.5, 37.5, 52.5];
const WEIGHT_SPAN: f64 = 52.5;
const SCALE: f64 = POSITION_LIMIT as f64 / WEIGHT_SPAN;

/// Which path produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimateSource {
    Centroid,
    LeftEdge,
    RightEdge,
    HeldLowContrast,
    HeldWeakSignal,
    /// No frame was available this cycle.
    HeldNoFrame,
}

impl EstimateSource {
    pub fn is_held(self) -> bool {
        matches!(
            self,
            EstimateSource::HeldLowContrast
                | EstimateSource::HeldWeakSignal
                | EstimateSource::HeldNoFrame
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EstimateSource::Centroid => "centroid",
            EstimateSource::LeftEdge => "left_edge",
            EstimateSource::RightEdge => "right_edge",
            EstimateSource::HeldLowContrast => "held_low_contrast",
            EstimateSource::HeldWeakSignal => "held_weak_signal",
            EstimateSource::HeldNoFrame => "held_no_frame",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    /// Signed offset in `[-127, 127]`; 0 is centred, negative is left.
    pub position: i16,
    pub source: EstimateSource,
}

impl Default for Estimate {
    fn default() -> Self {
        Self {
            position: 0,
            source: EstimateSource::HeldNoFrame,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineEstimator {
    cfg: EstimatorCfg,
    last_known: i16,
}

impl LineEstimator {
    pub fn new(cfg: EstimatorCfg) -> Self {
        Self { cfg, last_known: 0 }
    }

    pub fn cfg(&self) -> &EstimatorCfg {
        &self.cfg
    }

    /// Most recent position produced by an edge or centroid computation.
    pub fn last_known(&self) -> i16 {
        self.last_known
    }

    /// Overwrite the last known position, clamped to the reportable range.
    pub fn set_last_known(&mut self, position: i16) {
        self.last_known = position.clamp(-POSITION_LIMIT, POSITION_LIMIT);
    }

    pub fn set_edge_diff_threshold(&mut self, threshold: u16) {
        self.cfg.edge_diff_threshold = threshold;
    }

    /// Estimate for a cycle without a frame.
    pub fn hold(&self) -> Estimate {
        self.held(EstimateSource::HeldNoFrame)
    }

    pub fn estimate(&mut self, frame: &SensorFrame) -> Estimate {
        let (min, max) = frame
            .iter()
            .fold((u16::MAX, u16::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

        let contrast = max - min;
        if contrast < self.cfg.min_contrast {
            debug!(contrast, min_contrast = self.cfg.min_contrast, "low contrast; holding");
            return self.held(EstimateSource::HeldLowContrast);
        }

        let s = frame.samples();
        let threshold = i32::from(self.cfg.edge_diff_threshold);
        let first = s[0];
        let last = s[SENSOR_COUNT - 1];
        if first == max && i32::from(first) - i32::from(s[1]) >= threshold {
            debug!(sample = first, "line off left edge");
            return self.confident(-POSITION_LIMIT, EstimateSource::LeftEdge);
        }
        if last == max && i32::from(last) - i32::from(s[SENSOR_COUNT - 2]) >= threshold {
            debug!(sample = last, "line off right edge");
            return self.confident(POSITION_LIMIT, EstimateSource::RightEdge);
        }

        let mut sum: u32 = 0;
        let mut weighted: f64 = 0.0;
        for (v, w) in frame.iter().zip(WEIGHTS) {
            let norm = v.saturating_sub(min);
            sum += u32::from(norm);
            weighted += f64::from(norm) * w;
        }
        if sum < self.cfg.min_signal_sum {
            debug!(sum, min_signal_sum = self.cfg.min_signal_sum, "weak signal; holding");
            return self.held(EstimateSource::HeldWeakSignal);
        }

        // Truncation below is sensitive to the last bit; keep the sum in f64.
        let limit = f64::from(POSITION_LIMIT);
        let scaled = (weighted / f64::from(sum)) * SCALE;
        // `as` truncates toward zero after the clamp.
        #[allow(clippy::cast_possible_truncation)]
        let position = scaled.clamp(-limit, limit) as i16;
        self.confident(position, EstimateSource::Centroid)
    }

    fn confident(&mut self, position: i16, source: EstimateSource) -> Estimate {
        self.last_known = position;
        Estimate { position, source }
    }

    fn held(&self, source: EstimateSource) -> Estimate {
        Estimate {
            position: self.last_known,
            source,
        }
    }
}

impl Default for LineEstimator {
    fn default() -> Self {
        Self::new(EstimatorCfg::default())
    }
}
