// ABOUTME: In-memory collaborator implementations for tests
// ABOUTME: Seedable activity log and profile goal providers without a backing store
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! In-memory implementations of the collaborator seams, for unit and
//! integration tests that exercise the engine without the SQL log tables.

use crate::errors::AppResult;
use crate::evaluator::ActivityLog;
use crate::goal_ledger::ProfileGoals;
use crate::models::CivilDate;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Seedable in-memory activity log.
#[derive(Default)]
pub struct MemoryActivityLog {
    food: DashMap<(Uuid, CivilDate), f64>,
    exercise: DashMap<(Uuid, CivilDate), f64>,
}

impl MemoryActivityLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add food calories for a day (summed like the real aggregate).
    pub fn log_food(&self, user_id: Uuid, date: CivilDate, calories: f64) {
        *self.food.entry((user_id, date)).or_insert(0.0) += calories;
    }

    /// Delete all food logged for a day, simulating a retroactive deletion.
    pub fn delete_food(&self, user_id: Uuid, date: CivilDate) {
        self.food.remove(&(user_id, date));
    }

    /// Overwrite the day's food total, simulating a retroactive edit.
    pub fn set_food(&self, user_id: Uuid, date: CivilDate, calories: f64) {
        self.food.insert((user_id, date), calories);
    }

    /// Add exercise minutes for a day.
    pub fn log_exercise(&self, user_id: Uuid, date: CivilDate, minutes: f64) {
        *self.exercise.entry((user_id, date)).or_insert(0.0) += minutes;
    }

    /// Delete all exercise logged for a day.
    pub fn delete_exercise(&self, user_id: Uuid, date: CivilDate) {
        self.exercise.remove(&(user_id, date));
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn daily_food_calories(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64> {
        Ok(self
            .food
            .get(&(user_id, date))
            .map_or(0.0, |entry| *entry.value()))
    }

    async fn daily_exercise_minutes(&self, user_id: Uuid, date: CivilDate) -> AppResult<f64> {
        Ok(self
            .exercise
            .get(&(user_id, date))
            .map_or(0.0, |entry| *entry.value()))
    }
}

/// Fixed per-user profile goals.
#[derive(Default)]
pub struct StaticProfileGoals {
    goals: DashMap<Uuid, i64>,
}

impl StaticProfileGoals {
    /// Create an empty provider (every user unknown).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's profile-derived goal.
    pub fn insert(&self, user_id: Uuid, goal: i64) {
        self.goals.insert(user_id, goal);
    }
}

#[async_trait]
impl ProfileGoals for StaticProfileGoals {
    async fn profile_derived_goal(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        Ok(self.goals.get(&user_id).map(|entry| *entry.value()))
    }
}
