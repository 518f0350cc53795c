// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron expression parsing.
//!
//! The scheduling loop that actually fires runs on a timer is an external
//! collaborator (spec.md §1, §6); this module only parses and validates the
//! expression and answers "does this instant match", which is what the
//! builder needs to validate `schedule`/`stop`/`restart` entries at load
//! time (spec.md §4.3 item 3).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field of a cron expression: `*`, a value, a step (`*/5`), a
/// range (`1-5`), or a comma-separated list of any of the above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Field {
    Any,
    Values(Vec<u32>),
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Values(values) => values.contains(&value),
        }
    }

    fn parse(raw: &str, min: u32, max: u32) -> Result<Self, CronError> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        let mut values = Vec::new();
        for part in raw.split(',') {
            values.extend(Self::parse_part(part, min, max)?);
        }
        values.sort_unstable();
        values.dedup();
        Ok(Field::Values(values))
    }

    fn parse_part(part: &str, min: u32, max: u32) -> Result<Vec<u32>, CronError> {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (
                r,
                Some(
                    s.parse::<u32>()
                        .map_err(|_| CronError::InvalidField(part.to_string()))?,
                ),
            ),
            None => (part, None),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range_part.split_once('-') {
            let lo: u32 = lo
                .parse()
                .map_err(|_| CronError::InvalidField(part.to_string()))?;
            let hi: u32 = hi
                .parse()
                .map_err(|_| CronError::InvalidField(part.to_string()))?;
            (lo, hi)
        } else {
            let v: u32 = range_part
                .parse()
                .map_err(|_| CronError::InvalidField(part.to_string()))?;
            (v, v)
        };

        if start < min || end > max || start > end {
            return Err(CronError::InvalidField(part.to_string()));
        }

        let step = step.unwrap_or(1).max(1);
        Ok((start..=end).step_by(step as usize).collect())
    }
}

/// A parsed 5-field cron expression (`minute hour day-of-month month day-of-week`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cron {
    expression: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("cron expression must have exactly 5 fields, got {0}")]
    WrongFieldCount(usize),
    #[error("invalid cron field: {0}")]
    InvalidField(String),
}

/// Minimal description of an instant, enough to test a cron match without
/// pulling in a full calendar library.
#[derive(Debug, Clone, Copy)]
pub struct Instant {
    pub minute: u32,
    pub hour: u32,
    pub day_of_month: u32,
    pub month: u32,
    pub day_of_week: u32,
}

impl Cron {
    /// Parse a 5-field cron expression. Fields are, in order: minute
    /// (0-59), hour (0-23), day-of-month (1-31), month (1-12),
    /// day-of-week (0-6, 0 = Sunday).
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::WrongFieldCount(fields.len()));
        }
        Ok(Cron {
            expression: expression.to_string(),
            minute: Field::parse(fields[0], 0, 59)?,
            hour: Field::parse(fields[1], 0, 23)?,
            day_of_month: Field::parse(fields[2], 1, 31)?,
            month: Field::parse(fields[3], 1, 12)?,
            day_of_week: Field::parse(fields[4], 0, 6)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `instant` matches this cron expression. Day-of-month and
    /// day-of-week are OR'd together when both are restricted, matching
    /// standard cron semantics.
    pub fn matches(&self, instant: Instant) -> bool {
        let minute_ok = self.minute.matches(instant.minute);
        let hour_ok = self.hour.matches(instant.hour);
        let month_ok = self.month.matches(instant.month);

        let dom_restricted = !matches!(self.day_of_month, Field::Any);
        let dow_restricted = !matches!(self.day_of_week, Field::Any);
        let day_ok = match (dom_restricted, dow_restricted) {
            (false, false) => true,
            (true, false) => self.day_of_month.matches(instant.day_of_month),
            (false, true) => self.day_of_week.matches(instant.day_of_week),
            (true, true) => {
                self.day_of_month.matches(instant.day_of_month)
                    || self.day_of_week.matches(instant.day_of_week)
            }
        };

        minute_ok && hour_ok && month_ok && day_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(Cron::parse("* * *"), Err(CronError::WrongFieldCount(3)));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Cron::parse("60 * * * *").is_err());
        assert!(Cron::parse("* * * 13 *").is_err());
    }

    #[test]
    fn matches_wildcard() {
        let cron = Cron::parse("* * * * *").expect("valid");
        assert!(cron.matches(Instant {
            minute: 7,
            hour: 13,
            day_of_month: 4,
            month: 2,
            day_of_week: 3,
        }));
    }

    #[test]
    fn matches_step_field() {
        let cron = Cron::parse("*/15 * * * *").expect("valid");
        assert!(cron.matches(Instant {
            minute: 30,
            hour: 0,
            day_of_month: 1,
            month: 1,
            day_of_week: 0,
        }));
        assert!(!cron.matches(Instant {
            minute: 31,
            hour: 0,
            day_of_month: 1,
            month: 1,
            day_of_week: 0,
        }));
    }

    #[test]
    fn matches_list_and_range() {
        let cron = Cron::parse("0 9-17 * * 1-5").expect("valid");
        assert!(cron.matches(Instant {
            minute: 0,
            hour: 12,
            day_of_month: 15,
            month: 6,
            day_of_week: 3,
        }));
        assert!(!cron.matches(Instant {
            minute: 0,
            hour: 12,
            day_of_month: 15,
            month: 6,
            day_of_week: 0,
        }));
    }

    #[test]
    fn day_of_month_and_day_of_week_are_ored() {
        // "on the 1st OR on Sundays" (standard cron semantics when both are restricted)
        let cron = Cron::parse("0 0 1 * 0").expect("valid");
        assert!(cron.matches(Instant {
            minute: 0,
            hour: 0,
            day_of_month: 1,
            month: 5,
            day_of_week: 3, // not Sunday, but it's the 1st
        }));
        assert!(cron.matches(Instant {
            minute: 0,
            hour: 0,
            day_of_month: 15, // not the 1st, but it's Sunday
            month: 5,
            day_of_week: 0,
        }));
        assert!(!cron.matches(Instant {
            minute: 0,
            hour: 0,
            day_of_month: 15,
            month: 5,
            day_of_week: 3,
        }));
    }
}
