//! Cron expression parsing and occurrence computation

use chrono::{DateTime, Utc};
use croner::Cron;

use crate::error::{EngineError, EngineResult};

/// Parsed cron schedule, standard 5-field form (minute hour day month
/// weekday) with the usual `*/n` shorthand. Keeps the original expression
/// around since task files store the string.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> EngineResult<Self> {
        let cron = Cron::new(expr)
            .parse()
            .map_err(|e| EngineError::InvalidSchedule(format!("{expr:?}: {e}")))?;
        Ok(Self { expr: expr.to_string(), cron })
    }

    /// The first fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> EngineResult<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).map_err(|e| {
            EngineError::InvalidSchedule(format!("no next occurrence for {:?}: {e}", self.expr))
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_five_field_expressions() {
        assert!(CronSchedule::parse("*/5 * * * *").is_ok());
        assert!(CronSchedule::parse("0 8 * * 1").is_ok());
        assert!(CronSchedule::parse("not a cron").is_err());
        assert!(CronSchedule::parse("").is_err());
    }

    #[test]
    fn next_after_advances_to_the_following_slot() {
        let schedule = CronSchedule::parse("*/5 * * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 1, 10, 2, 30).unwrap();

        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap());

        // Asking again from the fire time moves strictly forward.
        let following = schedule.next_after(next).unwrap();
        assert_eq!(following, Utc.with_ymd_and_hms(2024, 3, 1, 10, 10, 0).unwrap());
    }
}
