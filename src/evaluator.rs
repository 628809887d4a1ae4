// ABOUTME: Pure per-day goal evaluation against logged food and exercise aggregates
// ABOUTME: Collaborator traits for the log store plus the side-effect-free met_goal check
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Achievement evaluation.
//!
//! `met_goal` answers one question, side-effect free: did the user meet the
//! goal for (user, date, metric)? Meeting or exceeding both count; there is
//! no upper bound and no penalty for overshoot. Unknown users evaluate to
//! "not met" rather than erroring, which keeps the recalculator's backward
//! walk total.

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::goal_ledger::GoalLedger;
use crate::models::{CivilDate, Metric};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Collaborator seam for the log store's daily aggregates. This engine never
/// writes the underlying tables.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Sum of logged food calories for (user, date).
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the aggregate lookup fails.
    async fn daily_food_calories(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64>;

    /// Sum of logged exercise minutes for (user, date).
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the aggregate lookup fails.
    async fn daily_exercise_minutes(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64>;
}

/// [`ActivityLog`] backed by the externally owned `food_logs` and
/// `exercise_logs` tables.
pub struct SqlActivityLog {
    db: Arc<Database>,
}

impl SqlActivityLog {
    /// Wrap a database handle.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityLog for SqlActivityLog {
    async fn daily_food_calories(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64> {
        self.db
            .daily_food_calories(user_id, date)
            .await
            .map_err(AppError::storage)
    }

    async fn daily_exercise_minutes(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64> {
        self.db
            .daily_exercise_minutes(user_id, date)
            .await
            .map_err(AppError::storage)
    }
}

/// Pure evaluation of whether a (user, date, metric) day qualified.
pub struct AchievementEvaluator {
    ledger: Arc<GoalLedger>,
    log: Arc<dyn ActivityLog>,
}

impl AchievementEvaluator {
    /// Build an evaluator over the goal ledger and log store.
    #[must_use]
    pub fn new(ledger: Arc<GoalLedger>, log: Arc<dyn ActivityLog>) -> Self {
        Self { ledger, log }
    }

    /// Whether the user met the goal for `date`.
    ///
    /// - calories: logged calories `>=` the goal in force on that date
    ///   (resolved through the ledger's fallback chain)
    /// - exercise: logged minutes `>=` the supplied per-record threshold
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when an aggregate lookup fails; an
    /// unknown user is "not met", never an error.
    pub async fn met_goal(
        &self,
        user_id: Uuid,
        date: CivilDate,
        metric: Metric,
        minimum_exercise_minutes: i64,
    ) -> AppResult<bool> {
        let met = match metric {
            Metric::Calories => {
                let goal = self.ledger.goal_as_of(user_id, date).await?;
                let calories = self.log.daily_food_calories(user_id, date).await?;
                trace!(
                    user.id = %user_id, date = %date,
                    calories, goal.value = goal.value, goal.source = ?goal.source,
                    "evaluated calorie goal"
                );
                calories >= goal.value as f64
            }
            Metric::Exercise => {
                let minutes = self.log.daily_exercise_minutes(user_id, date).await?;
                trace!(
                    user.id = %user_id, date = %date,
                    minutes, threshold = minimum_exercise_minutes,
                    "evaluated exercise goal"
                );
                minutes >= minimum_exercise_minutes as f64
            }
        };
        Ok(met)
    }
}
