//! Reset schedules and wall-clock time
//!
//! `CronClock` answers "when is the next/previous boundary of this cron
//! expression" for unix-second instants. The default implementation parses
//! standard 5-field expressions (minute hour day-of-month month day-of-week,
//! Sunday = 0) on top of the `cron` crate, which expects a leading seconds
//! field and numbers weekdays 1-7 from Sunday.

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::{RankingError, Result};

pub trait CronClock: Send + Sync {
    /// First boundary strictly after `after`.
    fn next(&self, expr: &str, after: i64) -> Result<i64>;
    /// Latest boundary at or before `at`.
    fn prev(&self, expr: &str, at: i64) -> Result<i64>;

    fn validate(&self, expr: &str) -> Result<()> {
        self.next(expr, 0).map(|_| ())
    }
}

/// `CronClock` backed by the `cron` crate, with parsed schedules memoized.
#[derive(Default)]
pub struct CronSchedule {
    parsed: RwLock<HashMap<String, Arc<Schedule>>>,
}

impl CronSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule(&self, expr: &str) -> Result<Arc<Schedule>> {
        if let Some(schedule) = self.parsed.read().get(expr) {
            return Ok(schedule.clone());
        }
        let normalized = normalize_expression(expr)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            RankingError::invalid(format!("invalid cron expression '{expr}': {e}"))
        })?;
        let schedule = Arc::new(schedule);
        self.parsed
            .write()
            .insert(expr.to_string(), schedule.clone());
        Ok(schedule)
    }
}

impl CronClock for CronSchedule {
    fn next(&self, expr: &str, after: i64) -> Result<i64> {
        let schedule = self.schedule(expr)?;
        let from = to_datetime(after)?;
        schedule
            .after(&from)
            .next()
            .map(|t| t.timestamp())
            .ok_or_else(|| RankingError::invalid(format!("cron expression '{expr}' has no future boundary")))
    }

    fn prev(&self, expr: &str, at: i64) -> Result<i64> {
        let schedule = self.schedule(expr)?;
        // The iterator walks backwards strictly before its anchor.
        let from = to_datetime(at.saturating_add(1))?;
        schedule
            .after(&from)
            .next_back()
            .map(|t| t.timestamp())
            .ok_or_else(|| RankingError::invalid(format!("cron expression '{expr}' has no past boundary")))
    }
}

fn to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| RankingError::invalid(format!("timestamp {ts} is out of range")))
}

/// Convert a standard 5-field expression into the 6-field form the `cron`
/// crate parses. 6/7-field expressions pass through untouched.
fn normalize_expression(expr: &str) -> Result<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = translate_weekdays(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(RankingError::invalid(format!(
            "invalid cron expression '{expr}': expected 5 fields, got {n}"
        ))),
    }
}

/// Map numeric weekdays from 0-7 (Sunday = 0 or 7) to 1-7 (Sunday = 1).
fn translate_weekdays(field: &str) -> Result<String> {
    let parts: Result<Vec<String>> = field.split(',').map(translate_weekday_part).collect();
    Ok(parts?.join(","))
}

fn translate_weekday_part(part: &str) -> Result<String> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (part, None),
    };
    if let (Some(step), Some((lo, hi))) = (step, base.split_once('-')) {
        if let (Some(lo), Some(hi)) = (weekday_number(lo)?, weekday_number(hi)?) {
            return expand_weekday_steps(lo, hi, step);
        }
    }
    let base = match base.split_once('-') {
        Some((lo, hi)) => match (weekday_number(lo)?, weekday_number(hi)?) {
            (Some(0), Some(7)) => "1-7".to_string(),
            (Some(7), Some(7)) => "1".to_string(),
            (Some(lo), Some(7)) => format!("{}-7,1", lo + 1),
            (Some(lo), Some(hi)) => format!("{}-{}", lo % 7 + 1, hi % 7 + 1),
            _ => base.to_string(),
        },
        None => match weekday_number(base)? {
            Some(n) => (n % 7 + 1).to_string(),
            None => base.to_string(),
        },
    };
    Ok(match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    })
}

/// Stepped numeric ranges are listed out, since shifting the bounds would
/// move the step origin (`5-7/2` is Fri,Sun and must not become `6-7,1/2`).
fn expand_weekday_steps(lo: u32, hi: u32, step: &str) -> Result<String> {
    let step: u32 = match step.parse() {
        Ok(n) if n > 0 => n,
        _ => return Err(RankingError::invalid(format!("invalid day of week step '{step}'"))),
    };
    if lo > hi {
        return Err(RankingError::invalid(format!("invalid day of week range '{lo}-{hi}'")));
    }
    let mut days: Vec<u32> = (lo..=hi).step_by(step as usize).map(|d| d % 7 + 1).collect();
    days.sort_unstable();
    days.dedup();
    Ok(days.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
}

fn weekday_number(token: &str) -> Result<Option<u32>> {
    if !token.chars().all(|c| c.is_ascii_digit()) || token.is_empty() {
        return Ok(None);
    }
    match token.parse::<u32>() {
        Ok(n) if n <= 7 => Ok(Some(n)),
        _ => Err(RankingError::invalid(format!("invalid day of week '{token}'"))),
    }
}

// ============================================================================
// Wall clock
// ============================================================================

pub trait WallClock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
