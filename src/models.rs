// ABOUTME: Core domain types for streak and goal-history tracking
// ABOUTME: Civil dates, metrics, streak records, goal ledger entries, and HTTP view models
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Domain model for the streak engine.
//!
//! The central value type is [`CivilDate`]: a calendar date in the single
//! deployment-wide reference timezone. Every date that enters the engine is
//! either parsed from an ISO-8601 string or resolved through
//! [`CivilDate::today_in`]; raw UTC timestamps are never compared to dates.

use crate::errors::AppError;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A calendar date (year-month-day) in the fixed reference timezone.
///
/// Ordering and equality are plain calendar comparisons, which makes the
/// idempotency guard in the streak state machine immune to the
/// datetime-vs-date mismatches that plague timestamp comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CivilDate(NaiveDate);

impl CivilDate {
    /// Wrap an already-resolved calendar date.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse an ISO-8601 calendar date (`YYYY-MM-DD`).
    ///
    /// # Errors
    /// Returns [`AppError`] with code `INVALID_DATE` when the input is not a
    /// valid calendar date.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| AppError::invalid_date(format!("'{input}' is not a calendar date: {e}")))
    }

    /// Today's civil date in the deployment timezone.
    ///
    /// This is the single timezone-resolution point of the engine: callers
    /// never derive a date from a timestamp themselves.
    #[must_use]
    pub fn today_in(offset: FixedOffset) -> Self {
        Self(Utc::now().with_timezone(&offset).date_naive())
    }

    /// The previous calendar day, `None` at the representable minimum.
    #[must_use]
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    /// Signed whole days from `self` to `other` (positive when `other` is later).
    #[must_use]
    pub fn days_until(self, other: Self) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }

    /// The underlying calendar date.
    #[must_use]
    pub const fn as_naive(self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for CivilDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// The per-user metric a streak is tracked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Daily calorie goal met (logged food calories >= goal in force).
    Calories,
    /// Daily exercise goal met (logged minutes >= per-record minimum).
    Exercise,
}

impl Metric {
    /// Stable string form used in the database and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Exercise => "exercise",
        }
    }

    /// Parse the wire/database form.
    ///
    /// # Errors
    /// Returns [`AppError`] with code `INVALID_INPUT` for unknown metrics.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        match input {
            "calories" => Ok(Self::Calories),
            "exercise" => Ok(Self::Exercise),
            other => Err(AppError::invalid_input(format!(
                "unknown streak type '{other}' (expected 'calories' or 'exercise')"
            ))),
        }
    }

    /// Both tracked metrics, in display order.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Calories, Self::Exercise]
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-(user, metric) streak counters.
///
/// Invariants the engine maintains:
/// - `longest_streak >= current_streak`, and `longest_streak` never decreases
/// - `current_streak == 0` exactly when `streak_start_date` is `None`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakRecord {
    /// Row identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Tracked metric.
    pub metric: Metric,
    /// Consecutive qualifying days ending at `last_activity_date`.
    pub current_streak: i64,
    /// High-water mark over the record's lifetime.
    pub longest_streak: i64,
    /// Most recent day that counted toward any streak. Retained across
    /// breaks for display and analytics.
    pub last_activity_date: Option<CivilDate>,
    /// First day of the active streak, `None` when the streak is zero.
    pub streak_start_date: Option<CivilDate>,
    /// Qualifying threshold for the exercise metric, in minutes.
    pub minimum_exercise_minutes: i64,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time; doubles as the optimistic-concurrency token.
    pub updated_at: DateTime<Utc>,
}

impl StreakRecord {
    /// Fresh zero-streak record, created lazily on the first evaluated event
    /// for a (user, metric) pair.
    #[must_use]
    pub fn new(user_id: Uuid, metric: Metric, minimum_exercise_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            metric,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            streak_start_date: None,
            minimum_exercise_minutes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One goal-ledger row: the calorie goal in force from `effective_date`
/// until superseded by a later entry for the same user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalHistoryEntry {
    /// Owning user.
    pub user_id: Uuid,
    /// First day this goal value applies.
    pub effective_date: CivilDate,
    /// Daily calorie goal in kcal.
    pub goal_value: i64,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// Which link of the goal fallback chain produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalSource {
    /// A goal-history entry with `effective_date <= date`.
    Ledger,
    /// The user's current profile-derived goal.
    Profile,
    /// The deployment-wide default.
    Default,
}

/// A goal value together with the source that supplied it.
///
/// The tagged source makes the ledger → profile → default fallback chain
/// observable instead of silent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolvedGoal {
    /// Daily calorie goal in kcal.
    pub value: i64,
    /// Where the value came from.
    pub source: GoalSource,
}

/// Read-side view of a [`StreakRecord`] with derived display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakView {
    /// Owning user.
    pub user_id: Uuid,
    /// Tracked metric, under the wire name `streak_type`.
    #[serde(rename = "streak_type")]
    pub metric: Metric,
    /// Consecutive qualifying days.
    pub current_streak: i64,
    /// Lifetime high-water mark.
    pub longest_streak: i64,
    /// Most recent counted day.
    pub last_activity_date: Option<CivilDate>,
    /// First day of the active streak.
    pub streak_start_date: Option<CivilDate>,
    /// Exercise qualifying threshold in minutes.
    pub minimum_exercise_minutes: i64,
    /// Whether a nonzero streak is currently running.
    pub is_active: bool,
    /// Days from `streak_start_date` through today, for an active streak.
    pub days_since_start: Option<i64>,
    /// Days since the last counted day, for a broken streak with history.
    pub days_since_break: Option<i64>,
}

impl StreakView {
    /// Derive the view fields from a (reaped) record as of `today`.
    #[must_use]
    pub fn from_record(record: &StreakRecord, today: CivilDate) -> Self {
        let is_active = record.current_streak > 0;
        let days_since_start = if is_active {
            record.streak_start_date.map(|start| start.days_until(today))
        } else {
            None
        };
        let days_since_break = if is_active {
            None
        } else {
            record.last_activity_date.map(|last| last.days_until(today))
        };
        Self {
            user_id: record.user_id,
            metric: record.metric,
            current_streak: record.current_streak,
            longest_streak: record.longest_streak,
            last_activity_date: record.last_activity_date,
            streak_start_date: record.streak_start_date,
            minimum_exercise_minutes: record.minimum_exercise_minutes,
            is_active,
            days_since_start,
            days_since_break,
        }
    }
}
