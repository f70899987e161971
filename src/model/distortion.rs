use crate::bitmap::CoverageRange;

/// Reordering cost model. Costs are log-space penalties (non-positive for
/// the provided implementations) added under the distortion weight.
pub trait DistortionModel: Send + Sync {
    /// Cost of translating `next` after `prev`. `prev` is `None` for the
    /// first phrase of a hypothesis, which is treated as starting at 0.
    fn cost(&self, prev: Option<CoverageRange>, next: CoverageRange) -> f32;

    /// Reordering window: an extension may start at most this many
    /// positions past the first uncovered position. Negative means
    /// unlimited.
    fn max_distortion(&self) -> i32 {
        -1
    }

    /// Whether the last-translated end position distinguishes hypotheses
    /// for recombination. Position-insensitive models let hypotheses with
    /// different phrase orders merge.
    fn position_sensitive(&self) -> bool;
}

/// Jump-distance penalty: `-|prev_end - next_start|`.
pub struct LinearDistortion {
    max_distortion: i32,
}

impl LinearDistortion {
    pub fn new(max_distortion: i32) -> Self {
        Self { max_distortion }
    }
}

impl DistortionModel for LinearDistortion {
    fn cost(&self, prev: Option<CoverageRange>, next: CoverageRange) -> f32 {
        let prev_end = prev.map_or(0, |r| r.end);
        -(prev_end.abs_diff(next.start) as f32)
    }

    fn max_distortion(&self) -> i32 {
        self.max_distortion
    }

    fn position_sensitive(&self) -> bool {
        true
    }
}

/// No reordering preference. Used when the surrounding system scores order
/// elsewhere or the input is known to translate monotonically.
pub struct MonotoneDistortion;

impl DistortionModel for MonotoneDistortion {
    fn cost(&self, _prev: Option<CoverageRange>, _next: CoverageRange) -> f32 {
        0.0
    }

    fn position_sensitive(&self) -> bool {
        false
    }
}
