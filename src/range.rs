//! Nagios threshold ranges.
//!
//! A range is written as `[@]start:end`. Either side may be left out, which makes the range
//! unbounded in that direction, and `~` as start stands for negative infinity. A bare number
//! `N` is the same as `0:N`. By default a value *outside* the range raises an alert, a leading
//! `@` flips that so a value *inside* the range raises it.
//!
//! ```rust
//! # use check_prometheus::Range;
//! let range: Range = "10".parse().unwrap();
//! assert!(!range.is_violated_by(5.0));
//! assert!(range.is_violated_by(11.0));
//! assert!(range.is_violated_by(-1.0));
//!
//! let inverted: Range = "@10:20".parse().unwrap();
//! assert!(inverted.is_violated_by(15.0));
//! assert_eq!(inverted.to_string(), "@10:20");
//! ```

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RangeParseError {
    #[error("empty range expression")]
    Empty,
    #[error("invalid bound '{bound}' in range '{expression}'")]
    InvalidBound { bound: String, expression: String },
    #[error("range '{0}' contains more than one ':'")]
    Separator(String),
    #[error("range '{0}' has a start greater than its end")]
    StartAfterEnd(String),
}

/// A parsed threshold range. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    low: f64,
    high: f64,
    invert: bool,
}

impl Range {
    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Returns true if `value` lies within `[low, high]`, XORed with the invert flag.
    ///
    /// NaN is never in range.
    pub fn in_range(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }

        let inside = self.low <= value && value <= self.high;
        inside != self.invert
    }

    /// Returns true if `value` should raise an alert for this range.
    ///
    /// NaN never raises an alert here, the classifier deals with it separately.
    pub fn is_violated_by(&self, value: f64) -> bool {
        !value.is_nan() && !self.in_range(value)
    }
}

impl FromStr for Range {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(RangeParseError::Empty);
        }

        let (invert, body) = match text.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let (low, high) = match body.split_once(':') {
            None => (0.0, parse_bound(body, text)?),
            Some((start, end)) => {
                if end.contains(':') {
                    return Err(RangeParseError::Separator(text.to_owned()));
                }

                let low = match start.trim() {
                    "" | "~" => f64::NEG_INFINITY,
                    start => parse_bound(start, text)?,
                };
                let high = match end.trim() {
                    "" => f64::INFINITY,
                    end => parse_bound(end, text)?,
                };
                (low, high)
            }
        };

        if low > high {
            return Err(RangeParseError::StartAfterEnd(text.to_owned()));
        }

        Ok(Range { low, high, invert })
    }
}

fn parse_bound(bound: &str, expression: &str) -> Result<f64, RangeParseError> {
    match bound.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RangeParseError::InvalidBound {
            bound: bound.to_owned(),
            expression: expression.to_owned(),
        }),
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            f.write_str("@")?;
        }

        if self.low == 0.0 && self.high.is_finite() {
            return write!(f, "{}", self.high);
        }

        if self.low == f64::NEG_INFINITY {
            f.write_str("~:")?;
        } else {
            write!(f, "{}:", self.low)?;
        }

        if self.high.is_finite() {
            write!(f, "{}", self.high)?;
        }

        Ok(())
    }
}
