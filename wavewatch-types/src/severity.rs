//! Severity levels and threshold-based classification.

use core::fmt;

/// One rank in the ordered classification of an observation's intensity.
///
/// The derived `Ord` follows the declaration order: `Calm` is the baseline
/// and `Extreme` is the single most severe level that drives escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeverityLevel {
    Calm,
    Low,
    Medium,
    High,
    VeryHigh,
    Extreme,
}

impl SeverityLevel {
    /// All levels, from baseline to most severe.
    pub const ALL: [SeverityLevel; 6] = [
        SeverityLevel::Calm,
        SeverityLevel::Low,
        SeverityLevel::Medium,
        SeverityLevel::High,
        SeverityLevel::VeryHigh,
        SeverityLevel::Extreme,
    ];

    /// The single most severe level.
    pub const fn top() -> SeverityLevel {
        SeverityLevel::Extreme
    }

    /// Short uppercase label for display and log rows.
    pub fn label(&self) -> &'static str {
        match self {
            SeverityLevel::Calm => "CALM",
            SeverityLevel::Low => "LOW",
            SeverityLevel::Medium => "MEDIUM",
            SeverityLevel::High => "HIGH",
            SeverityLevel::VeryHigh => "VERY_HIGH",
            SeverityLevel::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which side of a threshold counts as "exceeded".
///
/// A wave camera reports a pixel row where *smaller* means a higher wave,
/// while an earthquake feed reports a magnitude where *larger* means worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScaleDirection {
    /// A raw value strictly below the threshold satisfies the step.
    Below,
    /// A raw value at or above the threshold satisfies the step.
    AtOrAbove,
}

/// Error building a [`SeverityScale`] from an invalid step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    /// A step names the baseline level, which is implicit.
    BaselineStep,
    /// Steps are not strictly ordered from most severe to least severe.
    LevelOrder,
    /// Thresholds are not monotonic in the scale's direction.
    ThresholdOrder,
    /// A threshold is NaN or infinite.
    NonFiniteThreshold,
}

impl fmt::Display for ScaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleError::BaselineStep => write!(f, "baseline level cannot appear as a step"),
            ScaleError::LevelOrder => {
                write!(f, "steps must be strictly ordered from most to least severe")
            }
            ScaleError::ThresholdOrder => {
                write!(f, "thresholds must be monotonic in the scale direction")
            }
            ScaleError::NonFiniteThreshold => write!(f, "thresholds must be finite"),
        }
    }
}

impl std::error::Error for ScaleError {}

/// An ordered list of (threshold, level) pairs mapping raw values to levels.
///
/// Steps are held from most severe to least severe and evaluated in that
/// order: the first satisfied threshold wins. This ordering is load-bearing;
/// checking least-to-most-severe silently misclassifies when threshold
/// ranges overlap. If no step is satisfied the level is [`SeverityLevel::Calm`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeverityScale {
    direction: ScaleDirection,
    steps: Vec<(f64, SeverityLevel)>,
}

impl SeverityScale {
    /// Build a scale from steps ordered most severe first.
    ///
    /// Validates that levels strictly descend, that no step names the
    /// baseline, and that thresholds are monotonic in the direction of
    /// severity (ascending for [`ScaleDirection::Below`], descending for
    /// [`ScaleDirection::AtOrAbove`]).
    pub fn new(
        direction: ScaleDirection,
        steps: Vec<(f64, SeverityLevel)>,
    ) -> Result<Self, ScaleError> {
        for window in steps.windows(2) {
            let (prev_t, prev_l) = window[0];
            let (next_t, next_l) = window[1];
            if next_l >= prev_l {
                return Err(ScaleError::LevelOrder);
            }
            let monotonic = match direction {
                ScaleDirection::Below => prev_t <= next_t,
                ScaleDirection::AtOrAbove => prev_t >= next_t,
            };
            if !monotonic {
                return Err(ScaleError::ThresholdOrder);
            }
        }
        for (threshold, level) in &steps {
            if !threshold.is_finite() {
                return Err(ScaleError::NonFiniteThreshold);
            }
            if *level == SeverityLevel::Calm {
                return Err(ScaleError::BaselineStep);
            }
        }
        Ok(Self { direction, steps })
    }

    /// Map a raw value to a severity level.
    ///
    /// Pure, total, and deterministic: thresholds are checked from most
    /// severe to least severe, ties resolve toward the higher severity, and
    /// anything unmatched (including NaN or infinite inputs) is `Calm`.
    pub fn classify(&self, raw_value: f64) -> SeverityLevel {
        if !raw_value.is_finite() {
            return SeverityLevel::Calm;
        }
        for (threshold, level) in &self.steps {
            let exceeded = match self.direction {
                ScaleDirection::Below => raw_value < *threshold,
                ScaleDirection::AtOrAbove => raw_value >= *threshold,
            };
            if exceeded {
                return *level;
            }
        }
        SeverityLevel::Calm
    }

    /// The direction this scale compares in.
    pub fn direction(&self) -> ScaleDirection {
        self.direction
    }

    /// The configured steps, most severe first.
    pub fn steps(&self) -> &[(f64, SeverityLevel)] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_scale() -> SeverityScale {
        SeverityScale::new(
            ScaleDirection::Below,
            vec![
                (180.0, SeverityLevel::Extreme),
                (210.0, SeverityLevel::VeryHigh),
                (230.0, SeverityLevel::High),
                (250.0, SeverityLevel::Medium),
                (280.0, SeverityLevel::Low),
            ],
        )
        .unwrap()
    }

    fn magnitude_scale() -> SeverityScale {
        SeverityScale::new(
            ScaleDirection::AtOrAbove,
            vec![
                (6.0, SeverityLevel::Extreme),
                (5.0, SeverityLevel::High),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_level_ordering() {
        assert!(SeverityLevel::Calm < SeverityLevel::Low);
        assert!(SeverityLevel::High < SeverityLevel::VeryHigh);
        assert_eq!(SeverityLevel::ALL.last(), Some(&SeverityLevel::top()));
    }

    #[test]
    fn test_classify_pixel_bands() {
        let scale = pixel_scale();
        assert_eq!(scale.classify(100.0), SeverityLevel::Extreme);
        assert_eq!(scale.classify(200.0), SeverityLevel::VeryHigh);
        assert_eq!(scale.classify(220.0), SeverityLevel::High);
        assert_eq!(scale.classify(240.0), SeverityLevel::Medium);
        assert_eq!(scale.classify(270.0), SeverityLevel::Low);
        assert_eq!(scale.classify(500.0), SeverityLevel::Calm);
    }

    #[test]
    fn test_classify_most_severe_first() {
        // 150 satisfies every Below step; the Extreme step must win.
        assert_eq!(pixel_scale().classify(150.0), SeverityLevel::Extreme);
    }

    #[test]
    fn test_classify_boundary_is_not_exceeded_below() {
        // Exactly at the threshold is not "below" it.
        assert_eq!(pixel_scale().classify(180.0), SeverityLevel::VeryHigh);
    }

    #[test]
    fn test_classify_boundary_is_exceeded_at_or_above() {
        let scale = magnitude_scale();
        assert_eq!(scale.classify(6.0), SeverityLevel::Extreme);
        assert_eq!(scale.classify(5.0), SeverityLevel::High);
        assert_eq!(scale.classify(4.9), SeverityLevel::Calm);
    }

    #[test]
    fn test_classify_is_total_for_non_finite() {
        let scale = pixel_scale();
        assert_eq!(scale.classify(f64::NAN), SeverityLevel::Calm);
        assert_eq!(scale.classify(f64::INFINITY), SeverityLevel::Calm);
        assert_eq!(scale.classify(f64::NEG_INFINITY), SeverityLevel::Calm);
    }

    #[test]
    fn test_classify_deterministic() {
        let scale = magnitude_scale();
        for _ in 0..3 {
            assert_eq!(scale.classify(5.5), SeverityLevel::High);
        }
    }

    #[test]
    fn test_new_rejects_unordered_levels() {
        let err = SeverityScale::new(
            ScaleDirection::Below,
            vec![
                (230.0, SeverityLevel::High),
                (180.0, SeverityLevel::Extreme),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ScaleError::LevelOrder);
    }

    #[test]
    fn test_new_rejects_non_monotonic_thresholds() {
        let err = SeverityScale::new(
            ScaleDirection::Below,
            vec![
                (210.0, SeverityLevel::Extreme),
                (180.0, SeverityLevel::VeryHigh),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ScaleError::ThresholdOrder);
    }

    #[test]
    fn test_new_rejects_baseline_step() {
        let err = SeverityScale::new(
            ScaleDirection::AtOrAbove,
            vec![(1.0, SeverityLevel::Calm)],
        )
        .unwrap_err();
        assert_eq!(err, ScaleError::BaselineStep);
    }

    #[test]
    fn test_new_rejects_nan_threshold() {
        let err = SeverityScale::new(
            ScaleDirection::AtOrAbove,
            vec![(f64::NAN, SeverityLevel::Extreme)],
        )
        .unwrap_err();
        assert_eq!(err, ScaleError::NonFiniteThreshold);
    }
}
