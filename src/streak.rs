// ABOUTME: Streak state machine, inactivity reaping, and the locked update orchestration
// ABOUTME: Advances, breaks, or rebuilds per-(user, metric) streaks under a keyed mutex
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Streak state machine and updater.
//!
//! Per (user, metric) a record is either `Zero` (`current_streak == 0`) or
//! `Active(n)`. [`advance`] is the pure transition function; it never touches
//! storage, which keeps every branch unit-testable. [`StreakUpdater`] wraps
//! it in the read-advance-write sequence, serialized per key by
//! [`StreakLocks`]: the transition is neither commutative nor associative, so
//! two concurrent qualifying events on a new day could otherwise both observe
//! "no streak yet" and both start one. An optimistic `updated_at` check
//! backstops writers outside this process; a miss retries from a fresh read.

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::evaluator::AchievementEvaluator;
use crate::models::{CivilDate, Metric, StreakRecord};
use crate::recalculator::{HistoryRecalculator, RebuiltStreak};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of the pure transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Nothing changed; the write can be skipped entirely.
    Unchanged,
    /// Counters changed and must be persisted.
    Mutated,
    /// The most recently counted day was retracted: rebuild the streak
    /// ending at `up_to` and adopt the result.
    NeedsRebuild {
        /// Day the rebuilt run must end at (the day before the retracted
        /// one); `None` at the calendar minimum.
        up_to: Option<CivilDate>,
    },
}

/// Advance a streak record for an evaluated day.
///
/// `activity_date` must already be a civil date in the reference timezone;
/// callers never pass raw UTC timestamps. Dates are compared as calendar
/// values, so multiple qualifying events on an already-counted day are
/// no-ops rather than double counts.
pub fn advance(record: &mut StreakRecord, activity_date: CivilDate, met: bool) -> Advance {
    if met {
        advance_met(record, activity_date)
    } else {
        advance_missed(record, activity_date)
    }
}

fn advance_met(record: &mut StreakRecord, activity_date: CivilDate) -> Advance {
    match record.last_activity_date {
        // Idempotency guard: the day already counted. Covers a second
        // qualifying log on the same day and upward edits of a counted day.
        Some(last) if record.current_streak > 0 && last == activity_date => Advance::Unchanged,
        Some(last) if record.current_streak > 0 => {
            let gap = last.days_until(activity_date);
            if gap == 1 {
                // Contiguous continuation
                record.current_streak += 1;
                record.last_activity_date = Some(activity_date);
                record.longest_streak = record.longest_streak.max(record.current_streak);
                Advance::Mutated
            } else if gap > 1 {
                start_fresh(record, activity_date);
                Advance::Mutated
            } else {
                // Retroactive qualifying day at or before the counted run;
                // the run already accounts for it or a repair will
                Advance::Unchanged
            }
        }
        // No prior counted day, or the previous chain is broken
        _ => {
            start_fresh(record, activity_date);
            Advance::Mutated
        }
    }
}

fn advance_missed(record: &mut StreakRecord, activity_date: CivilDate) -> Advance {
    match record.last_activity_date {
        // The most recently counted day is being re-evaluated because its
        // logged activity was edited or deleted. Rebuilding from the day
        // before keeps one retracted entry from erasing the whole history.
        Some(last) if record.current_streak > 0 && last == activity_date => Advance::NeedsRebuild {
            up_to: activity_date.pred(),
        },
        _ => {
            if record.current_streak == 0 && record.streak_start_date.is_none() {
                Advance::Unchanged
            } else {
                record.current_streak = 0;
                record.streak_start_date = None;
                // last_activity_date is retained for display and analytics
                Advance::Mutated
            }
        }
    }
}

fn start_fresh(record: &mut StreakRecord, activity_date: CivilDate) {
    record.current_streak = 1;
    record.streak_start_date = Some(activity_date);
    record.last_activity_date = Some(activity_date);
    record.longest_streak = record.longest_streak.max(1);
}

/// Fold a rebuilt run back into the record. `longest_streak` stays monotone.
pub fn adopt_rebuild(record: &mut StreakRecord, rebuilt: &RebuiltStreak) {
    record.current_streak = rebuilt.length;
    record.streak_start_date = rebuilt.oldest_met;
    if rebuilt.length > 0 {
        record.last_activity_date = rebuilt.most_recent_met;
    }
    record.longest_streak = record.longest_streak.max(rebuilt.length);
}

/// Lazily zero a stale streak. Returns whether the record changed.
///
/// Runs on every read so a display never shows a nonzero streak after a full
/// missed day, even when no new event has arrived to trigger an update.
pub fn reap(record: &mut StreakRecord, today: CivilDate) -> bool {
    if record.current_streak == 0 {
        return false;
    }
    match record.last_activity_date {
        None => {
            // Should be unreachable: an active streak always has a last
            // counted day. Repair rather than fail the read.
            warn!(
                user.id = %record.user_id, metric = %record.metric,
                current_streak = record.current_streak,
                "active streak with no last_activity_date; resetting"
            );
            record.current_streak = 0;
            record.streak_start_date = None;
            true
        }
        Some(last) if last.days_until(today) > 1 => {
            debug!(
                user.id = %record.user_id, metric = %record.metric,
                last_activity = %last, today = %today,
                "reaping stale streak"
            );
            record.current_streak = 0;
            record.streak_start_date = None;
            true
        }
        Some(_) => false,
    }
}

/// Keyed mutex registry serializing updates per (user, metric).
///
/// Different pairs are fully independent and proceed in parallel with no
/// shared locking.
#[derive(Default)]
pub struct StreakLocks {
    inner: DashMap<(Uuid, Metric), Arc<tokio::sync::Mutex<()>>>,
}

impl StreakLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a (user, metric) pair, creating it on first use.
    pub async fn acquire(&self, user_id: Uuid, metric: Metric) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let entry = self.inner.entry((user_id, metric)).or_default();
            Arc::clone(entry.value())
        };
        lock.lock_owned().await
    }
}

/// Dry-run report for `GET /streaks/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakCheck {
    /// Tracked metric, under the wire name `streak_type`.
    #[serde(rename = "streak_type")]
    pub metric: Metric,
    /// The civil date the check evaluated (today in the reference timezone).
    pub date: CivilDate,
    /// Whether the goal is currently met for that date.
    pub met_goal: bool,
    /// Whether applying an update now would increment the streak.
    pub would_increment: bool,
    /// Streak length as stored.
    pub current_streak: i64,
    /// Streak length after the simulated update.
    pub projected_streak: i64,
}

/// The read-advance-write orchestrator for streak state.
pub struct StreakUpdater {
    db: Arc<Database>,
    evaluator: Arc<AchievementEvaluator>,
    recalculator: Arc<HistoryRecalculator>,
    locks: StreakLocks,
    default_min_exercise_minutes: i64,
    max_retries: u32,
}

impl StreakUpdater {
    /// Build an updater over the given store and evaluation pipeline.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        evaluator: Arc<AchievementEvaluator>,
        recalculator: Arc<HistoryRecalculator>,
        default_min_exercise_minutes: i64,
        max_retries: u32,
    ) -> Self {
        Self {
            db,
            evaluator,
            recalculator,
            locks: StreakLocks::new(),
            default_min_exercise_minutes,
            max_retries,
        }
    }

    /// Apply an evaluated day to the (user, metric) streak.
    ///
    /// `met_override` short-circuits evaluation (the caller already knows the
    /// outcome); otherwise `exercise_minutes`, when supplied for the exercise
    /// metric, stands in for the log-store aggregate; otherwise the evaluator
    /// consults the log store. The record is created lazily on first use.
    ///
    /// # Errors
    /// Returns `CONCURRENT_MODIFICATION` when write conflicts persist past
    /// the retry bound, `STORAGE_UNAVAILABLE` on storage faults.
    pub async fn apply(
        &self,
        user_id: Uuid,
        metric: Metric,
        activity_date: CivilDate,
        met_override: Option<bool>,
        exercise_minutes: Option<f64>,
    ) -> AppResult<StreakRecord> {
        let _guard = self.locks.acquire(user_id, metric).await;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    user.id = %user_id, metric = %metric, attempt,
                    "retrying streak update after write conflict"
                );
            }

            let existing = self
                .db
                .get_streak(user_id, metric)
                .await
                .map_err(AppError::storage)?;
            let (mut record, created) = match existing {
                Some(record) => (record, false),
                None => (
                    StreakRecord::new(user_id, metric, self.default_min_exercise_minutes),
                    true,
                ),
            };
            let expected_updated_at = record.updated_at;

            let met = match (met_override, exercise_minutes) {
                (Some(met), _) => met,
                (None, Some(minutes)) if metric == Metric::Exercise => {
                    minutes >= record.minimum_exercise_minutes as f64
                }
                _ => {
                    self.evaluator
                        .met_goal(user_id, activity_date, metric, record.minimum_exercise_minutes)
                        .await?
                }
            };

            match advance(&mut record, activity_date, met) {
                Advance::Unchanged => return Ok(record),
                Advance::Mutated => {}
                Advance::NeedsRebuild { up_to } => {
                    let rebuilt = match up_to {
                        Some(end) => {
                            self.recalculator
                                .rebuild(user_id, metric, end, record.minimum_exercise_minutes)
                                .await?
                        }
                        None => RebuiltStreak {
                            length: 0,
                            most_recent_met: None,
                            oldest_met: None,
                        },
                    };
                    info!(
                        user.id = %user_id, metric = %metric, date = %activity_date,
                        rebuilt_length = rebuilt.length,
                        "last counted day retracted; streak rebuilt from history"
                    );
                    adopt_rebuild(&mut record, &rebuilt);
                }
            }

            record.updated_at = Utc::now();
            if created {
                // A concurrent creator outside this process loses the race as
                // a unique-constraint conflict; retry from a fresh read.
                if self
                    .db
                    .insert_streak(&record)
                    .await
                    .map_err(AppError::storage)?
                {
                    return Ok(record);
                }
            } else if self
                .db
                .update_streak(&record, expected_updated_at)
                .await
                .map_err(AppError::storage)?
            {
                return Ok(record);
            }
        }

        Err(AppError::concurrent_modification(format!(
            "streak for user {user_id} metric {metric} kept changing under us"
        )))
    }

    /// Dry-run: report whether an update evaluated for `today` would
    /// increment the streak, without persisting anything.
    ///
    /// A retraction path (`met == false` on the last counted day) is not
    /// simulated; the dry run reports no increment and the stored length.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` on storage faults.
    pub async fn check(
        &self,
        user_id: Uuid,
        metric: Metric,
        today: CivilDate,
    ) -> AppResult<StreakCheck> {
        let stored = self
            .db
            .get_streak(user_id, metric)
            .await
            .map_err(AppError::storage)?;
        let mut record = stored
            .unwrap_or_else(|| StreakRecord::new(user_id, metric, self.default_min_exercise_minutes));
        reap(&mut record, today);
        let current = record.current_streak;

        let met = self
            .evaluator
            .met_goal(user_id, today, metric, record.minimum_exercise_minutes)
            .await?;

        let mut simulated = record.clone();
        let projected = match advance(&mut simulated, today, met) {
            Advance::Unchanged | Advance::NeedsRebuild { .. } => current,
            Advance::Mutated => simulated.current_streak,
        };

        Ok(StreakCheck {
            metric,
            date: today,
            met_goal: met,
            would_increment: projected > current,
            current_streak: current,
            projected_streak: projected,
        })
    }

    /// Read the user's streak records with reaping applied. A reaped record
    /// is persisted best-effort (a conflicting writer will converge on its
    /// own fresh read), but the reaped view is returned regardless.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the initial read fails.
    pub async fn streaks_for_user(
        &self,
        user_id: Uuid,
        metric: Option<Metric>,
        today: CivilDate,
    ) -> AppResult<Vec<StreakRecord>> {
        let mut records = match metric {
            Some(metric) => self
                .db
                .get_streak(user_id, metric)
                .await
                .map_err(AppError::storage)?
                .into_iter()
                .collect(),
            None => self
                .db
                .get_streaks(user_id)
                .await
                .map_err(AppError::storage)?,
        };

        for record in &mut records {
            let expected_updated_at = record.updated_at;
            if reap(record, today) {
                record.updated_at = Utc::now();
                match self.db.update_streak(record, expected_updated_at).await {
                    Ok(true) => {}
                    Ok(false) => debug!(
                        user.id = %user_id, metric = %record.metric,
                        "reaped streak changed concurrently; returning reaped view"
                    ),
                    Err(e) => warn!(
                        user.id = %user_id, metric = %record.metric, error = %e,
                        "failed to persist reaped streak"
                    ),
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn date(s: &str) -> CivilDate {
        CivilDate::parse(s).unwrap()
    }

    fn record() -> StreakRecord {
        StreakRecord::new(Uuid::new_v4(), Metric::Calories, 15)
    }

    #[test]
    fn three_consecutive_met_days_build_a_streak_of_three() {
        let mut r = record();
        assert_eq!(advance(&mut r, date("2025-01-01"), true), Advance::Mutated);
        assert_eq!(advance(&mut r, date("2025-01-02"), true), Advance::Mutated);
        assert_eq!(advance(&mut r, date("2025-01-03"), true), Advance::Mutated);
        assert_eq!(r.current_streak, 3);
        assert_eq!(r.longest_streak, 3);
        assert_eq!(r.streak_start_date, Some(date("2025-01-01")));
        assert_eq!(r.last_activity_date, Some(date("2025-01-03")));
    }

    #[test]
    fn same_day_repeat_is_a_noop() {
        let mut r = record();
        advance(&mut r, date("2025-01-01"), true);
        // Breakfast already counted; dinner must not double count
        assert_eq!(advance(&mut r, date("2025-01-01"), true), Advance::Unchanged);
        assert_eq!(r.current_streak, 1);
        assert_eq!(r.longest_streak, 1);
    }

    #[test]
    fn missed_day_breaks_then_next_met_day_starts_at_one() {
        let mut r = record();
        for day in ["2025-01-01", "2025-01-02", "2025-01-03"] {
            advance(&mut r, date(day), true);
        }
        assert_eq!(advance(&mut r, date("2025-01-04"), false), Advance::Mutated);
        assert_eq!(r.current_streak, 0);
        assert_eq!(r.streak_start_date, None);
        // last counted day preserved for display
        assert_eq!(r.last_activity_date, Some(date("2025-01-03")));

        advance(&mut r, date("2025-01-05"), true);
        assert_eq!(r.current_streak, 1);
        assert_eq!(r.longest_streak, 3);
        assert_eq!(r.streak_start_date, Some(date("2025-01-05")));
    }

    #[test]
    fn gap_of_two_days_starts_fresh() {
        let mut r = record();
        advance(&mut r, date("2025-01-01"), true);
        advance(&mut r, date("2025-01-02"), true);
        advance(&mut r, date("2025-01-05"), true);
        assert_eq!(r.current_streak, 1);
        assert_eq!(r.longest_streak, 2);
        assert_eq!(r.streak_start_date, Some(date("2025-01-05")));
    }

    #[test]
    fn retracting_the_last_counted_day_requests_a_rebuild() {
        let mut r = record();
        for day in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05"] {
            advance(&mut r, date(day), true);
        }
        let outcome = advance(&mut r, date("2025-01-05"), false);
        assert_eq!(
            outcome,
            Advance::NeedsRebuild {
                up_to: Some(date("2025-01-04"))
            }
        );
        // advance itself must not have zeroed anything
        assert_eq!(r.current_streak, 5);
    }

    #[test]
    fn retracting_an_older_day_zeroes_without_rebuild() {
        let mut r = record();
        advance(&mut r, date("2025-01-01"), true);
        advance(&mut r, date("2025-01-02"), true);
        // A day other than the last counted one fails
        assert_eq!(advance(&mut r, date("2025-01-04"), false), Advance::Mutated);
        assert_eq!(r.current_streak, 0);
        assert_eq!(r.last_activity_date, Some(date("2025-01-02")));
    }

    #[test]
    fn missed_day_on_zero_streak_is_a_noop() {
        let mut r = record();
        assert_eq!(advance(&mut r, date("2025-01-01"), false), Advance::Unchanged);
    }

    #[test]
    fn retroactive_met_day_inside_the_run_is_a_noop() {
        let mut r = record();
        advance(&mut r, date("2025-01-02"), true);
        advance(&mut r, date("2025-01-03"), true);
        // Editing Jan 2 upward after it already counted
        assert_eq!(advance(&mut r, date("2025-01-02"), true), Advance::Unchanged);
        assert_eq!(r.current_streak, 2);
    }

    #[test]
    fn longest_streak_never_decreases() {
        let mut r = record();
        for day in ["2025-01-01", "2025-01-02", "2025-01-03"] {
            advance(&mut r, date(day), true);
        }
        advance(&mut r, date("2025-01-04"), false);
        advance(&mut r, date("2025-01-05"), true);
        assert_eq!(r.longest_streak, 3);
        advance(&mut r, date("2025-01-06"), true);
        assert_eq!(r.longest_streak, 3);
    }

    #[test]
    fn adopt_rebuild_restores_counters_and_keeps_longest() {
        let mut r = record();
        for day in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05"] {
            advance(&mut r, date(day), true);
        }
        let rebuilt = RebuiltStreak {
            length: 4,
            most_recent_met: Some(date("2025-01-04")),
            oldest_met: Some(date("2025-01-01")),
        };
        adopt_rebuild(&mut r, &rebuilt);
        assert_eq!(r.current_streak, 4);
        assert_eq!(r.longest_streak, 5);
        assert_eq!(r.last_activity_date, Some(date("2025-01-04")));
        assert_eq!(r.streak_start_date, Some(date("2025-01-01")));
    }

    #[test]
    fn adopt_rebuild_to_zero_keeps_last_activity_for_display() {
        let mut r = record();
        advance(&mut r, date("2025-01-05"), true);
        let rebuilt = RebuiltStreak {
            length: 0,
            most_recent_met: None,
            oldest_met: None,
        };
        adopt_rebuild(&mut r, &rebuilt);
        assert_eq!(r.current_streak, 0);
        assert_eq!(r.streak_start_date, None);
        assert_eq!(r.last_activity_date, Some(date("2025-01-05")));
    }

    #[test]
    fn reap_zeroes_after_a_full_missed_day() {
        let mut r = record();
        advance(&mut r, date("2025-01-03"), true);
        // Jan 4 (yesterday) is still recoverable, Jan 5 is not
        assert!(!reap(&mut r, date("2025-01-04")));
        assert!(reap(&mut r, date("2025-01-05")));
        assert_eq!(r.current_streak, 0);
        assert_eq!(r.streak_start_date, None);
        assert_eq!(r.last_activity_date, Some(date("2025-01-03")));
    }

    #[test]
    fn reap_repairs_active_streak_with_no_last_activity() {
        let mut r = record();
        r.current_streak = 7;
        r.streak_start_date = Some(date("2025-01-01"));
        r.last_activity_date = None;
        assert!(reap(&mut r, date("2025-01-08")));
        assert_eq!(r.current_streak, 0);
        assert_eq!(r.streak_start_date, None);
    }

    #[test]
    fn reap_is_idempotent() {
        let mut r = record();
        advance(&mut r, date("2025-01-03"), true);
        assert!(reap(&mut r, date("2025-01-06")));
        assert!(!reap(&mut r, date("2025-01-06")));
    }
}
