//! Normalisation of intensity arrays.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Normalisation applied to a run's intensity axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Normalisation {
    /// Raw, un-normalised values.
    #[default]
    None,
    /// Divide by the spectrum's own total counts.
    Counts,
    /// Divide by the run's event / spill count.
    Events,
}

impl Normalisation {
    /// All accepted names, in display order.
    pub const NAMES: [&'static str; 3] = ["none", "counts", "events"];

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Counts => "counts",
            Self::Events => "events",
        }
    }
}

impl fmt::Display for Normalisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalisation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "counts" => Ok(Self::Counts),
            "events" => Ok(Self::Events),
            other => Err(Error::Configuration(format!(
                "invalid normalisation type '{other}', expected one of {:?}",
                Self::NAMES
            ))),
        }
    }
}

/// Divides every value by the array's own sum.
///
/// An array summing to zero (all-empty spectrum) is returned unchanged
/// rather than filled with NaN. No display scale factor is applied.
#[must_use]
pub fn normalise_counts(y: &[f64]) -> Vec<f64> {
    let total: f64 = y.iter().sum();
    if total == 0.0 {
        return y.to_vec();
    }
    y.iter().map(|v| v / total).collect()
}

/// Divides every value by an external event / spill count.
///
/// # Errors
/// Returns [`Error::Normalisation`] if `events` is zero or not finite.
pub fn normalise_events(y: &[f64], events: f64) -> Result<Vec<f64>> {
    if !events.is_finite() || events == 0.0 {
        return Err(Error::Normalisation(format!(
            "cannot divide by an event count of {events}"
        )));
    }
    Ok(y.iter().map(|v| v / events).collect())
}

/// Extracts the integer event count that starts at character `offset` of a
/// comment-file line. Surrounding whitespace is ignored.
///
/// # Errors
/// Returns [`Error::Normalisation`] if the field is missing or not an
/// integer.
pub fn parse_event_field(line: &str, offset: usize) -> Result<i64> {
    let field: String = line.chars().skip(offset).collect();
    field.trim().parse::<i64>().map_err(|_| {
        Error::Normalisation(format!(
            "no event count at offset {offset} of '{}'",
            line.trim_end()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_normalisation() {
        assert_eq!("counts".parse::<Normalisation>().unwrap(), Normalisation::Counts);
        assert_eq!(Normalisation::Events.to_string(), "events");
        let err = "spills".parse::<Normalisation>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_normalise_counts() {
        let y = normalise_counts(&[1.0, 2.0, 3.0, 2.0, 1.0]);
        assert_relative_eq!(y[0], 1.0 / 9.0);
        assert_relative_eq!(y[2], 3.0 / 9.0);
        assert_relative_eq!(y.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_normalise_counts_all_zero() {
        assert_eq!(normalise_counts(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalise_counts(&[]).is_empty());
    }

    #[test]
    fn test_normalise_events() {
        let y = normalise_events(&[10.0, 20.0], 5.0).unwrap();
        assert_eq!(y, vec![2.0, 4.0]);
        assert!(normalise_events(&[1.0], 0.0).unwrap_err().is_normalisation());
    }

    #[test]
    fn test_parse_event_field() {
        let line = "Number of events : 123456\n";
        assert_eq!(parse_event_field(line, 19).unwrap(), 123_456);
        assert!(parse_event_field(" ", 19).is_err());
        assert!(parse_event_field("Number of events : abc", 19).is_err());
    }
}
