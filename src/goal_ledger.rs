// ABOUTME: Time-indexed ledger of which calorie goal was in force on which date
// ABOUTME: Idempotent upserts and a deterministic as-of lookup with an explicit fallback chain
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Goal ledger.
//!
//! `goal_as_of` must be a pure, deterministic function of ledger contents so
//! that the history recalculator's backward walk is reproducible: a day
//! evaluated today against the goal that was in force then, not the goal in
//! force now. The fallback chain (ledger entry → profile-derived goal →
//! deployment default) is explicit and tagged in the result.

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{CivilDate, GoalSource, ResolvedGoal};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Collaborator seam for the profile subsystem's BMR/TDEE-derived goal.
#[async_trait]
pub trait ProfileGoals: Send + Sync {
    /// Current profile-derived daily calorie goal, `None` for unknown users.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the lookup fails.
    async fn profile_derived_goal(&self, user_id: Uuid) -> AppResult<Option<i64>>;
}

/// [`ProfileGoals`] backed by the externally owned `user_profiles` table.
pub struct SqlProfileGoals {
    db: Arc<Database>,
}

impl SqlProfileGoals {
    /// Wrap a database handle.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileGoals for SqlProfileGoals {
    async fn profile_derived_goal(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        self.db
            .profile_calorie_goal(user_id)
            .await
            .map_err(AppError::storage)
    }
}

/// Time-indexed record of which calorie goal value was in force on which
/// date, per user.
pub struct GoalLedger {
    db: Arc<Database>,
    profiles: Arc<dyn ProfileGoals>,
    default_goal: i64,
}

impl GoalLedger {
    /// Build a ledger over the given store and profile collaborator.
    #[must_use]
    pub fn new(db: Arc<Database>, profiles: Arc<dyn ProfileGoals>, default_goal: i64) -> Self {
        Self {
            db,
            profiles,
            default_goal,
        }
    }

    /// Idempotently record the goal in force from `effective_date`. Called
    /// whenever a profile change alters the computed goal; overwrites any
    /// existing entry for that exact date.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the write fails.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        effective_date: CivilDate,
        goal_value: i64,
    ) -> AppResult<()> {
        if goal_value <= 0 {
            return Err(AppError::invalid_input(format!(
                "goal value must be positive, got {goal_value}"
            )));
        }
        self.db
            .upsert_goal_history(user_id, effective_date, goal_value)
            .await
            .map_err(AppError::storage)
    }

    /// Whether the user has any ledger entries at all. A user with ledger
    /// history is a known user even when their profile is gone.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when the lookup fails.
    pub async fn has_entries(&self, user_id: Uuid) -> AppResult<bool> {
        self.db
            .has_goal_history(user_id)
            .await
            .map_err(AppError::storage)
    }

    /// The goal value in force on `date`: the entry with the latest
    /// `effective_date <= date`, falling back to the profile-derived goal,
    /// then to the deployment default.
    ///
    /// # Errors
    /// Returns `STORAGE_UNAVAILABLE` when a lookup fails.
    pub async fn goal_as_of(&self, user_id: Uuid, date: CivilDate) -> AppResult<ResolvedGoal> {
        if let Some(entry) = self
            .db
            .goal_on_or_before(user_id, date)
            .await
            .map_err(AppError::storage)?
        {
            return Ok(ResolvedGoal {
                value: entry.goal_value,
                source: GoalSource::Ledger,
            });
        }

        if let Some(value) = self.profiles.profile_derived_goal(user_id).await? {
            debug!(user.id = %user_id, date = %date, "goal ledger empty, using profile goal");
            return Ok(ResolvedGoal {
                value,
                source: GoalSource::Profile,
            });
        }

        debug!(user.id = %user_id, date = %date, "no ledger or profile goal, using default");
        Ok(ResolvedGoal {
            value: self.default_goal,
            source: GoalSource::Default,
        })
    }
}
