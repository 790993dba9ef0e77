//! Numeric tolerance forms.
//!
//! Playback position is never exact, so numeric checks state their tolerance
//! explicitly. "Integer part equals 33" and "strictly between 36 and 38" are
//! different questions and stay different variants.

use crate::result::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric condition over a single observed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericExpectation {
    /// `low < x < high`
    Between {
        /// Exclusive lower bound
        low: f64,
        /// Exclusive upper bound
        high: f64,
    },
    /// `low <= x <= high`
    Within {
        /// Inclusive lower bound
        low: f64,
        /// Inclusive upper bound
        high: f64,
    },
    /// `floor(x) == value`
    FloorEquals {
        /// Expected integer part
        value: i64,
    },
    /// `|x - value| <= tolerance`
    Approx {
        /// Target value
        value: f64,
        /// Absolute tolerance
        tolerance: f64,
    },
    /// `x >= value`
    AtLeast {
        /// Inclusive minimum
        value: f64,
    },
    /// `x <= value`
    AtMost {
        /// Inclusive maximum
        value: f64,
    },
}

impl NumericExpectation {
    /// Open interval
    #[must_use]
    pub const fn between(low: f64, high: f64) -> Self {
        Self::Between { low, high }
    }

    /// Closed interval
    #[must_use]
    pub const fn within(low: f64, high: f64) -> Self {
        Self::Within { low, high }
    }

    /// Integer-part equality
    #[must_use]
    pub const fn floor_equals(value: i64) -> Self {
        Self::FloorEquals { value }
    }

    /// Absolute tolerance around a value
    #[must_use]
    pub const fn approx(value: f64, tolerance: f64) -> Self {
        Self::Approx { value, tolerance }
    }

    /// Lower bound, inclusive
    #[must_use]
    pub const fn at_least(value: f64) -> Self {
        Self::AtLeast { value }
    }

    /// Upper bound, inclusive
    #[must_use]
    pub const fn at_most(value: f64) -> Self {
        Self::AtMost { value }
    }

    /// Reject forms no value can satisfy: empty intervals, negative
    /// tolerances and NaN bounds.
    pub fn validate(&self) -> VigilResult<()> {
        let satisfiable = match *self {
            Self::Between { low, high } => low < high,
            Self::Within { low, high } => low <= high,
            Self::FloorEquals { .. } => true,
            Self::Approx { value, tolerance } => !value.is_nan() && tolerance >= 0.0,
            Self::AtLeast { value } | Self::AtMost { value } => !value.is_nan(),
        };
        if satisfiable {
            Ok(())
        } else {
            Err(VigilError::Config {
                message: format!("numeric expectation '{self}' can never match"),
            })
        }
    }

    /// The condition with `subject` in place of `x`
    #[must_use]
    pub fn describe(&self, subject: &str) -> String {
        match self {
            Self::Between { low, high } => format!("{low} < {subject} < {high}"),
            Self::Within { low, high } => format!("{low} <= {subject} <= {high}"),
            Self::FloorEquals { value } => format!("floor({subject}) == {value}"),
            Self::Approx { value, tolerance } => format!("{subject} == {value} ± {tolerance}"),
            Self::AtLeast { value } => format!("{subject} >= {value}"),
            Self::AtMost { value } => format!("{subject} <= {value}"),
        }
    }

    /// Whether `actual` satisfies the condition. NaN never does.
    #[must_use]
    pub fn matches(&self, actual: f64) -> bool {
        if actual.is_nan() {
            return false;
        }
        match *self {
            Self::Between { low, high } => low < actual && actual < high,
            Self::Within { low, high } => low <= actual && actual <= high,
            #[allow(clippy::cast_precision_loss)]
            Self::FloorEquals { value } => actual.floor() == value as f64,
            Self::Approx { value, tolerance } => (actual - value).abs() <= tolerance,
            Self::AtLeast { value } => actual >= value,
            Self::AtMost { value } => actual <= value,
        }
    }
}

impl fmt::Display for NumericExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe("x"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod forms_tests {
        use super::*;

        #[test]
        fn test_open_interval_excludes_bounds() {
            let cond = NumericExpectation::between(36.0, 38.0);
            assert!(cond.matches(37.0));
            assert!(!cond.matches(36.0));
            assert!(!cond.matches(38.0));
        }

        #[test]
        fn test_closed_interval_includes_bounds() {
            let cond = NumericExpectation::within(36.0, 38.0);
            assert!(cond.matches(36.0));
            assert!(cond.matches(38.0));
            assert!(!cond.matches(38.01));
        }

        #[test]
        fn test_floor_equals() {
            let cond = NumericExpectation::floor_equals(33);
            assert!(cond.matches(33.0));
            assert!(cond.matches(33.99));
            assert!(!cond.matches(32.999));
            assert!(!cond.matches(34.0));
        }

        #[test]
        fn test_approx() {
            let cond = NumericExpectation::approx(37.0, 0.5);
            assert!(cond.matches(36.5));
            assert!(cond.matches(37.4));
            assert!(!cond.matches(37.6));
        }

        #[test]
        fn test_nan_never_matches() {
            for cond in [
                NumericExpectation::between(f64::NEG_INFINITY, f64::INFINITY),
                NumericExpectation::AtLeast {
                    value: f64::NEG_INFINITY,
                },
                NumericExpectation::floor_equals(0),
            ] {
                assert!(!cond.matches(f64::NAN));
            }
        }

        #[test]
        fn test_display() {
            assert_eq!(
                NumericExpectation::between(36.0, 38.0).to_string(),
                "36 < x < 38"
            );
            assert_eq!(
                NumericExpectation::floor_equals(33).to_string(),
                "floor(x) == 33"
            );
        }

        #[test]
        fn test_describe_names_the_subject() {
            assert_eq!(
                NumericExpectation::floor_equals(33).describe("currentTime"),
                "floor(currentTime) == 33"
            );
            assert_eq!(
                NumericExpectation::at_least(4.0).describe("readyState.max"),
                "readyState.max >= 4"
            );
        }

        #[test]
        fn test_validate_rejects_unsatisfiable_forms() {
            for bad in [
                NumericExpectation::between(38.0, 36.0),
                NumericExpectation::between(36.0, 36.0),
                NumericExpectation::within(2.0, 1.0),
                NumericExpectation::within(f64::NAN, 1.0),
                NumericExpectation::approx(6.0, -0.1),
                NumericExpectation::approx(6.0, f64::NAN),
                NumericExpectation::at_least(f64::NAN),
            ] {
                assert!(
                    matches!(bad.validate(), Err(VigilError::Config { .. })),
                    "{bad}"
                );
            }
            for good in [
                NumericExpectation::between(36.0, 38.0),
                NumericExpectation::within(1.0, 1.0),
                NumericExpectation::approx(6.0, 0.0),
                NumericExpectation::floor_equals(33),
            ] {
                good.validate().unwrap();
            }
        }

        #[test]
        fn test_yaml_tagged_form() {
            let cond: NumericExpectation =
                serde_yaml_ng::from_str("kind: between\nlow: 36\nhigh: 38\n").unwrap();
            assert_eq!(cond, NumericExpectation::between(36.0, 38.0));
            let cond: NumericExpectation =
                serde_yaml_ng::from_str("kind: floor_equals\nvalue: 33\n").unwrap();
            assert_eq!(cond, NumericExpectation::floor_equals(33));
        }
    }

    proptest! {
        #[test]
        fn prop_open_interval_implies_closed(low in -1e6f64..1e6, width in 0f64..1e3, x in -1e6f64..1e6) {
            let high = low + width;
            if NumericExpectation::between(low, high).matches(x) {
                prop_assert!(NumericExpectation::within(low, high).matches(x));
            }
        }

        #[test]
        fn prop_floor_equals_matches_its_unit_interval(n in -10_000i64..10_000, frac in 0f64..0.999) {
            #[allow(clippy::cast_precision_loss)]
            let x = n as f64 + frac;
            prop_assert!(NumericExpectation::floor_equals(n).matches(x));
            prop_assert!(!NumericExpectation::floor_equals(n + 1).matches(x));
        }
    }
}
