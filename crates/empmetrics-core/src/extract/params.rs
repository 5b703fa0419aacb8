//! Typed extractor parameters.
//!
//! Values are validated on construction, so an extractor never issues a query
//! with an inverted range or an unparseable date.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::resolver::OrganizationRecord;

/// Format dates are bound in.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format times of day are bound in.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Invalid extractor parameters.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParamError {
    /// A date was not `YYYY-MM-DD`.
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },

    /// A time was not `HH:MM` or `HH:MM:SS`.
    #[error("invalid time '{value}': expected HH:MM or HH:MM:SS")]
    InvalidTime {
        /// The rejected input.
        value: String,
    },

    /// A range ends before it starts.
    #[error("{what} ends before it starts: {start} > {end}")]
    InvertedRange {
        /// Which range was rejected.
        what: &'static str,
        /// Formatted start bound.
        start: String,
        /// Formatted end bound.
        end: String,
    },
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`ParamError::InvalidDate`] on any other input.
pub fn parse_date(value: &str) -> Result<NaiveDate, ParamError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ParamError::InvalidDate {
        value: value.to_string(),
    })
}

/// Parses an `HH:MM` or `HH:MM:SS` time of day.
///
/// # Errors
///
/// Returns [`ParamError::InvalidTime`] on any other input.
pub fn parse_time(value: &str) -> Result<NaiveTime, ParamError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, TIME_FORMAT))
        .map_err(|_| ParamError::InvalidTime {
            value: value.to_string(),
        })
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvertedRange`] if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ParamError> {
        if start > end {
            return Err(ParamError::InvertedRange {
                what: "date range",
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from `YYYY-MM-DD` strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is malformed or the range is inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self, ParamError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// First day of the range.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Inclusive window of working hours. Access outside it counts as after
/// hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    /// Creates a window covering `start..=end` within one day.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvertedRange`] if `start > end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ParamError> {
        if start > end {
            return Err(ParamError::InvertedRange {
                what: "time window",
                start: start.format(TIME_FORMAT).to_string(),
                end: end.format(TIME_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from `HH:MM[:SS]` strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is malformed or the window is
    /// inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self, ParamError> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    /// Start of working hours.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// End of working hours.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }
}

/// Inputs of the termination indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationParams {
    /// Only values recorded strictly after midnight of this date count.
    pub cutoff: NaiveDate,
    /// Organization whose field definitions hold hire and term dates.
    pub organization: OrganizationRecord,
}

impl TerminationParams {
    /// Creates termination parameters.
    #[must_use]
    pub const fn new(cutoff: NaiveDate, organization: OrganizationRecord) -> Self {
        Self {
            cutoff,
            organization,
        }
    }

    /// Cutoff as the bound timestamp.
    #[must_use]
    pub fn cutoff_timestamp(&self) -> String {
        format!("{} 00:00:00", self.cutoff.format(DATE_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_range() {
        let range = DateRange::parse("2020-01-01", "2020-06-08").unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(range.end(), NaiveDate::from_ymd_opt(2020, 6, 8).unwrap());
    }

    #[test]
    fn test_single_day_range_is_valid() {
        assert!(DateRange::parse("2020-03-03", "2020-03-03").is_ok());
    }

    #[test]
    fn test_inverted_date_range_is_rejected() {
        let err = DateRange::parse("2020-06-08", "2020-01-01").unwrap_err();
        assert!(matches!(err, ParamError::InvertedRange { what: "date range", .. }));
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let err = DateRange::parse("2020/01/01", "2020-06-08").unwrap_err();
        assert_eq!(
            err,
            ParamError::InvalidDate {
                value: "2020/01/01".to_string()
            }
        );
    }

    #[test]
    fn test_parse_time_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_time("08:00").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("18:00:30").unwrap(),
            NaiveTime::from_hms_opt(18, 0, 30).unwrap()
        );
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("eight").is_err());
    }

    #[test]
    fn test_inverted_time_window_is_rejected() {
        let err = TimeWindow::parse("18:00", "08:00").unwrap_err();
        assert!(matches!(err, ParamError::InvertedRange { what: "time window", .. }));
    }

    #[test]
    fn test_cutoff_timestamp_is_midnight() {
        let params = TerminationParams::new(
            NaiveDate::from_ymd_opt(2020, 5, 8).unwrap(),
            OrganizationRecord::new(1, "Maize"),
        );
        assert_eq!(params.cutoff_timestamp(), "2020-05-08 00:00:00");
    }
}
