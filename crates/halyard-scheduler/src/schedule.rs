//! Schedule-string parsing.
//!
//! Three accepted forms: `@every <duration>`, `@once <duration>`, and a
//! simplified five-field cron expression.

use crate::error::{Result, SchedulerError};

/// The outcome of parsing a schedule string.
pub struct ParsedSchedule {
    /// `true` for `@once` — the job is marked `Completed` after its single
    /// execution instead of being rescheduled.
    pub once: bool,
    /// Seconds until (or between) firings.
    pub interval_sec: u64,
}

/// Parse a duration suffix: bare digits (seconds), or digits followed by
/// `s`/`m`/`h`/`d`.
fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SchedulerError::InvalidSchedule("empty duration".into()));
    }
    let (digits, mult) = match s.chars().last().unwrap() {
        'd' => (&s[..s.len() - 1], 86_400),
        'h' => (&s[..s.len() - 1], 3_600),
        'm' => (&s[..s.len() - 1], 60),
        's' => (&s[..s.len() - 1], 1),
        c if c.is_ascii_digit() => (s, 1),
        _ => return Err(SchedulerError::InvalidSchedule(format!("bad duration: {s}"))),
    };
    digits
        .parse::<u64>()
        .map(|n| n * mult)
        .map_err(|_| SchedulerError::InvalidSchedule(format!("bad duration: {s}")))
}

/// Parse a schedule string into `(once, interval_sec)`. Unrecognised cron
/// expressions fall back to a 60-second interval rather than rejecting the
/// job outright.
pub fn parse(schedule: &str) -> Result<ParsedSchedule> {
    let schedule = schedule.trim();

    if let Some(rest) = schedule.strip_prefix("@every ") {
        return Ok(ParsedSchedule {
            once: false,
            interval_sec: parse_duration(rest)?,
        });
    }
    if let Some(rest) = schedule.strip_prefix("@once ") {
        return Ok(ParsedSchedule {
            once: true,
            interval_sec: parse_duration(rest)?,
        });
    }

    // Five-field cron subset.
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() == 5 {
        let interval_sec = match fields.as_slice() {
            ["*", "*", "*", "*", "*"] => 60,
            ["0", "*", "*", "*", "*"] => 3_600,
            ["0", "0", "*", "*", "*"] => 86_400,
            [minute, "*", "*", "*", "*"] if minute.starts_with("*/") => {
                minute[2..].parse::<u64>().map(|n| n * 60).unwrap_or(60)
            }
            _ => 60,
        };
        return Ok(ParsedSchedule {
            once: false,
            interval_sec,
        });
    }

    Err(SchedulerError::InvalidSchedule(format!(
        "unrecognised schedule: {schedule}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_seconds() {
        let p = parse("@every 30s").unwrap();
        assert!(!p.once);
        assert_eq!(p.interval_sec, 30);
    }

    #[test]
    fn every_bare_number_is_seconds() {
        let p = parse("@every 45").unwrap();
        assert_eq!(p.interval_sec, 45);
    }

    #[test]
    fn every_minutes_hours_days() {
        assert_eq!(parse("@every 2m").unwrap().interval_sec, 120);
        assert_eq!(parse("@every 1h").unwrap().interval_sec, 3_600);
        assert_eq!(parse("@every 1d").unwrap().interval_sec, 86_400);
    }

    #[test]
    fn once_is_flagged() {
        let p = parse("@once 1s").unwrap();
        assert!(p.once);
        assert_eq!(p.interval_sec, 1);
    }

    #[test]
    fn every_minute_cron() {
        assert_eq!(parse("* * * * *").unwrap().interval_sec, 60);
    }

    #[test]
    fn hourly_cron() {
        assert_eq!(parse("0 * * * *").unwrap().interval_sec, 3_600);
    }

    #[test]
    fn daily_cron() {
        assert_eq!(parse("0 0 * * *").unwrap().interval_sec, 86_400);
    }

    #[test]
    fn every_n_minutes_cron() {
        assert_eq!(parse("*/15 * * * *").unwrap().interval_sec, 900);
    }

    #[test]
    fn unrecognised_cron_falls_back_to_60s() {
        assert_eq!(parse("30 5 1 * *").unwrap().interval_sec, 60);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("not a schedule").is_err());
    }
}
