//! Leaderboard domain types
//!
//! Configs, records, epochs and the closed enums that drive ranking:
//! - `SortOrder`: which direction ranks "better"
//! - `Operator`: how a submitted score merges into a stored one
//! - `OverrideOperator`: per-write operator override (`no_override` = config default)
//! - `DecrementFloor`: clamping policy for `Operator::Decrement`

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::cron::CronClock;
use crate::error::{RankingError, Result};

/// Maximum length of a leaderboard id in bytes.
pub const MAX_ID_LEN: usize = 128;
/// Tournament categories are limited to 0..=127.
pub const MAX_CATEGORY: u8 = 127;

// ============================================================================
// Sort order
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }

    /// Compare two (score, subscore) pairs. `Less` means `a` ranks ahead of `b`.
    pub fn compare_scores(&self, a: (i64, i64), b: (i64, i64)) -> Ordering {
        match self {
            SortOrder::Ascending => a.cmp(&b),
            SortOrder::Descending => b.cmp(&a),
        }
    }

    /// Strict total order over rank keys: scores first, then owner id ascending.
    pub fn compare(&self, a: &RankKey, b: &RankKey) -> Ordering {
        self.compare_scores(a.scores(), b.scores())
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    }
}

impl FromStr for SortOrder {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "desc" | "descending" => Ok(SortOrder::Descending),
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            other => Err(RankingError::invalid(format!("unknown sort order '{other}'"))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Best,
    Set,
    Increment,
    Decrement,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Best => "best",
            Operator::Set => "set",
            Operator::Increment => "increment",
            Operator::Decrement => "decrement",
        }
    }
}

impl FromStr for Operator {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "best" => Ok(Operator::Best),
            "set" => Ok(Operator::Set),
            "incr" | "increment" => Ok(Operator::Increment),
            "decr" | "decrement" => Ok(Operator::Decrement),
            other => Err(RankingError::invalid(format!("unknown operator '{other}'"))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator requested by a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideOperator {
    #[default]
    NoOverride,
    Use(Operator),
}

impl OverrideOperator {
    pub fn resolve(self, config_default: Operator) -> Operator {
        match self {
            OverrideOperator::NoOverride => config_default,
            OverrideOperator::Use(op) => op,
        }
    }
}

impl FromStr for OverrideOperator {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "no_override" => Ok(OverrideOperator::NoOverride),
            other => other.parse().map(OverrideOperator::Use),
        }
    }
}

/// Lower bound applied by `Operator::Decrement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecrementFloor {
    /// Scores never drop below zero.
    #[default]
    Zero,
    /// Scores may go negative (saturating at `i64::MIN`).
    Unbounded,
}

impl FromStr for DecrementFloor {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "zero" => Ok(DecrementFloor::Zero),
            "unbounded" | "none" => Ok(DecrementFloor::Unbounded),
            other => Err(RankingError::invalid(format!("unknown decrement floor '{other}'"))),
        }
    }
}

// ============================================================================
// Rank keys and epochs
// ============================================================================

/// Position of an owner inside an epoch's ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankKey {
    pub score: i64,
    pub subscore: i64,
    pub owner_id: String,
}

impl RankKey {
    pub fn new(score: i64, subscore: i64, owner_id: impl Into<String>) -> Self {
        Self {
            score,
            subscore,
            owner_id: owner_id.into(),
        }
    }

    pub fn scores(&self) -> (i64, i64) {
        (self.score, self.subscore)
    }
}

/// Which side of an anchor key a page is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Entries ranked after the anchor.
    Forward,
    /// Entries ranked before the anchor.
    Backward,
}

/// One reset window of a leaderboard. `expiry == 0` means the epoch never ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub start: i64,
    pub expiry: i64,
}

impl Epoch {
    pub const PERMANENT: Epoch = Epoch { start: 0, expiry: 0 };

    pub fn expiry_time(&self) -> Option<i64> {
        (self.expiry > 0).then_some(self.expiry)
    }
}

// ============================================================================
// Configs
// ============================================================================

/// Tournament extension of a leaderboard config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentSettings {
    pub title: String,
    pub description: String,
    pub category: u8,
    pub start_time: i64,
    /// 0 = never ends.
    pub end_time: i64,
    /// Length of the active window inside each epoch, in seconds.
    pub duration: i64,
    /// 0 = unlimited.
    pub max_size: u32,
    /// 0 = unlimited.
    pub max_num_score: i32,
    pub join_required: bool,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: 0,
            start_time: 0,
            end_time: 0,
            duration: 0,
            max_size: 0,
            max_num_score: 0,
            join_required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub id: String,
    pub sort_order: SortOrder,
    pub operator: Operator,
    pub authoritative: bool,
    pub reset_schedule: Option<String>,
    pub metadata: Vec<u8>,
    pub enable_ranks: bool,
    pub decrement_floor: DecrementFloor,
    pub create_time: i64,
    pub tournament: Option<TournamentSettings>,
}

impl LeaderboardConfig {
    /// Plain leaderboard with default settings (descending, best, ranks on).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sort_order: SortOrder::default(),
            operator: Operator::default(),
            authoritative: false,
            reset_schedule: None,
            metadata: Vec::new(),
            enable_ranks: true,
            decrement_floor: DecrementFloor::default(),
            create_time: 0,
            tournament: None,
        }
    }

    pub fn new_tournament(id: impl Into<String>, settings: TournamentSettings) -> Self {
        Self {
            tournament: Some(settings),
            ..Self::new(id)
        }
    }

    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_reset_schedule(mut self, cron: impl Into<String>) -> Self {
        self.reset_schedule = Some(cron.into());
        self
    }

    pub fn with_ranks(mut self, enabled: bool) -> Self {
        self.enable_ranks = enabled;
        self
    }

    pub fn is_tournament(&self) -> bool {
        self.tournament.is_some()
    }

    /// Reset schedule, ignoring blank strings.
    pub fn schedule(&self) -> Option<&str> {
        self.reset_schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Check creation-time invariants. Cron expressions are parsed once here
    /// so the scheduler never sees an unparseable schedule.
    pub fn validate(&self, cron: &dyn CronClock) -> Result<()> {
        if self.id.is_empty() {
            return Err(RankingError::invalid("leaderboard id must not be empty"));
        }
        if self.id.len() > MAX_ID_LEN {
            return Err(RankingError::invalid(format!(
                "leaderboard id must be at most {MAX_ID_LEN} bytes"
            )));
        }
        if self.id.contains('\0') {
            return Err(RankingError::invalid("leaderboard id must not contain NUL"));
        }
        if let Some(expr) = self.schedule() {
            cron.validate(expr)?;
        }
        if let Some(t) = &self.tournament {
            if t.category > MAX_CATEGORY {
                return Err(RankingError::invalid(format!(
                    "category must be between 0 and {MAX_CATEGORY}"
                )));
            }
            if t.start_time < 0 || t.end_time < 0 {
                return Err(RankingError::invalid("tournament times must not be negative"));
            }
            if t.end_time > 0 && t.end_time <= t.start_time {
                return Err(RankingError::invalid("end time must be after start time"));
            }
            if t.duration <= 0 {
                return Err(RankingError::invalid("duration must be greater than zero"));
            }
            if t.max_num_score < 0 {
                return Err(RankingError::invalid("max num score must not be negative"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub username: Option<String>,
    pub score: i64,
    pub subscore: i64,
    pub num_score: i32,
    /// Personal attempt cap, 0 = unlimited.
    pub max_num_score: i32,
    pub metadata: Vec<u8>,
    pub create_time: i64,
    pub update_time: i64,
    /// End of the epoch this record belongs to.
    pub expiry_time: Option<i64>,
    /// Filled in on reads while ranks are enabled; never persisted.
    pub rank: Option<i64>,
}

impl LeaderboardRecord {
    /// Zero-valued record for an owner entering an epoch.
    pub fn fresh(
        leaderboard_id: &str,
        owner_id: &str,
        epoch: &Epoch,
        max_num_score: i32,
        now: i64,
    ) -> Self {
        Self {
            leaderboard_id: leaderboard_id.to_string(),
            owner_id: owner_id.to_string(),
            username: None,
            score: 0,
            subscore: 0,
            num_score: 0,
            max_num_score,
            metadata: Vec::new(),
            create_time: now,
            update_time: now,
            expiry_time: epoch.expiry_time(),
            rank: None,
        }
    }

    pub fn scores(&self) -> (i64, i64) {
        (self.score, self.subscore)
    }

    pub fn rank_key(&self) -> RankKey {
        RankKey::new(self.score, self.subscore, self.owner_id.clone())
    }

    /// Epoch bucket this record lives in (0 = permanent epoch).
    pub fn epoch_expiry(&self) -> i64 {
        self.expiry_time.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!("ascending".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!("Desc".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert_eq!("".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert!(matches!(
            "sideways".parse::<SortOrder>(),
            Err(RankingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("".parse::<Operator>().unwrap(), Operator::Best);
        assert_eq!("incr".parse::<Operator>().unwrap(), Operator::Increment);
        assert_eq!("DECREMENT".parse::<Operator>().unwrap(), Operator::Decrement);
        assert_eq!("set".parse::<Operator>().unwrap(), Operator::Set);
        assert!("max".parse::<Operator>().is_err());
    }

    #[test]
    fn test_override_operator() {
        let o: OverrideOperator = "no_override".parse().unwrap();
        assert_eq!(o.resolve(Operator::Set), Operator::Set);
        let o: OverrideOperator = "decr".parse().unwrap();
        assert_eq!(o.resolve(Operator::Best), Operator::Decrement);
    }

    #[test]
    fn test_descending_compare_breaks_ties_by_owner() {
        let order = SortOrder::Descending;
        let a = RankKey::new(100, 0, "a");
        let b = RankKey::new(50, 0, "b");
        let c = RankKey::new(100, 0, "c");
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(order.compare(&a, &c), Ordering::Less);
        assert_eq!(order.compare(&c, &a), Ordering::Greater);
    }

    #[test]
    fn test_ascending_compare_uses_subscore() {
        let order = SortOrder::Ascending;
        let a = RankKey::new(10, 1, "z");
        let b = RankKey::new(10, 2, "a");
        assert_eq!(order.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_epoch_expiry_time() {
        assert_eq!(Epoch::PERMANENT.expiry_time(), None);
        assert_eq!(Epoch { start: 5, expiry: 10 }.expiry_time(), Some(10));
    }
}
