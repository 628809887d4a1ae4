// ABOUTME: Self-healing rebuild of streak length from raw history
// ABOUTME: Capped backward day-by-day walk re-evaluating each day against the goal then in force
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! History recalculation.
//!
//! When a retroactive edit or deletion un-qualifies the most recently counted
//! day, the streak is rebuilt by walking backward one day at a time from a
//! given end date, re-evaluating each day. The walk stops at the first miss
//! or at a hard cap that bounds its cost; hitting the cap is treated as
//! success with length equal to the cap, logged as a warning. Given unchanged
//! aggregates the rebuild is pure and idempotent, which also makes it usable
//! directly as a repair tool.

use crate::errors::AppResult;
use crate::evaluator::AchievementEvaluator;
use crate::models::{CivilDate, Metric};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of a backward rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuiltStreak {
    /// Number of consecutive qualifying days found.
    pub length: i64,
    /// The latest qualifying day of the run, `None` when length is 0.
    pub most_recent_met: Option<CivilDate>,
    /// The earliest qualifying day of the run, `None` when length is 0.
    pub oldest_met: Option<CivilDate>,
}

impl RebuiltStreak {
    const EMPTY: Self = Self {
        length: 0,
        most_recent_met: None,
        oldest_met: None,
    };
}

/// Backward day-by-day streak rebuilder.
pub struct HistoryRecalculator {
    evaluator: Arc<AchievementEvaluator>,
    max_days: u32,
}

impl HistoryRecalculator {
    /// Build a recalculator with the given walk cap.
    #[must_use]
    pub fn new(evaluator: Arc<AchievementEvaluator>, max_days: u32) -> Self {
        Self {
            evaluator,
            max_days,
        }
    }

    /// Rebuild the streak ending at `up_to` (inclusive) for (user, metric).
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when an evaluation lookup fails.
    pub async fn rebuild(
        &self,
        user_id: Uuid,
        metric: Metric,
        up_to: CivilDate,
        minimum_exercise_minutes: i64,
    ) -> AppResult<RebuiltStreak> {
        let mut result = RebuiltStreak::EMPTY;
        let mut day = up_to;

        while result.length < i64::from(self.max_days) {
            let met = self
                .evaluator
                .met_goal(user_id, day, metric, minimum_exercise_minutes)
                .await?;
            if !met {
                break;
            }

            result.length += 1;
            result.most_recent_met.get_or_insert(day);
            result.oldest_met = Some(day);

            match day.pred() {
                Some(prev) => day = prev,
                // Calendar minimum, nothing earlier to evaluate
                None => break,
            }
        }

        if result.length >= i64::from(self.max_days) {
            warn!(
                user.id = %user_id, metric = %metric, up_to = %up_to,
                cap = self.max_days,
                "streak rebuild hit the day cap without finding a break; \
                 reporting length = cap"
            );
        } else {
            debug!(
                user.id = %user_id, metric = %metric, up_to = %up_to,
                length = result.length,
                "streak rebuilt from history"
            );
        }

        Ok(result)
    }
}
