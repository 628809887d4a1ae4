// ABOUTME: Centralized resource container for dependency injection
// ABOUTME: Builds the database, ledger, evaluator, recalculator, and updater once at startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! # Engine Resources
//!
//! Centralized resource container constructed once at process startup and
//! passed by reference everywhere. There is no module-level mutable state in
//! this engine; anything request handlers need lives here behind an `Arc`.

use crate::config::ServerConfig;
use crate::database::Database;
use crate::evaluator::{AchievementEvaluator, ActivityLog, SqlActivityLog};
use crate::goal_ledger::{GoalLedger, ProfileGoals, SqlProfileGoals};
use crate::recalculator::HistoryRecalculator;
use crate::streak::StreakUpdater;
use std::sync::Arc;

/// Shared, immutable engine state.
#[derive(Clone)]
pub struct EngineResources {
    /// Streak and goal-history storage.
    pub database: Arc<Database>,
    /// Deployment configuration.
    pub config: Arc<ServerConfig>,
    /// Goal ledger with its fallback chain.
    pub ledger: Arc<GoalLedger>,
    /// Profile collaborator, used by the HTTP layer for user existence.
    pub profiles: Arc<dyn ProfileGoals>,
    /// Per-day goal evaluation.
    pub evaluator: Arc<AchievementEvaluator>,
    /// Backward history rebuild.
    pub recalculator: Arc<HistoryRecalculator>,
    /// Locked streak update orchestration.
    pub updater: Arc<StreakUpdater>,
}

impl EngineResources {
    /// Wire the engine against SQL-backed collaborators.
    #[must_use]
    pub fn new(database: Database, config: Arc<ServerConfig>) -> Self {
        let database = Arc::new(database);
        let profiles: Arc<dyn ProfileGoals> = Arc::new(SqlProfileGoals::new(Arc::clone(&database)));
        let log: Arc<dyn ActivityLog> = Arc::new(SqlActivityLog::new(Arc::clone(&database)));
        Self::with_collaborators(database, config, profiles, log)
    }

    /// Wire the engine against explicit collaborator implementations.
    /// Tests use this to substitute in-memory log stores.
    #[must_use]
    pub fn with_collaborators(
        database: Arc<Database>,
        config: Arc<ServerConfig>,
        profiles: Arc<dyn ProfileGoals>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        let ledger = Arc::new(GoalLedger::new(
            Arc::clone(&database),
            Arc::clone(&profiles),
            config.default_calorie_goal,
        ));
        let evaluator = Arc::new(AchievementEvaluator::new(Arc::clone(&ledger), log));
        let recalculator = Arc::new(HistoryRecalculator::new(
            Arc::clone(&evaluator),
            config.recalc_max_days,
        ));
        let updater = Arc::new(StreakUpdater::new(
            Arc::clone(&database),
            Arc::clone(&evaluator),
            Arc::clone(&recalculator),
            config.default_min_exercise_minutes,
            config.advance_max_retries,
        ));

        Self {
            database,
            config,
            ledger,
            profiles,
            evaluator,
            recalculator,
            updater,
        }
    }
}
