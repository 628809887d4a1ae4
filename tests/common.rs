// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory database setup, collaborator seeding, and resource wiring helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `embers`.

use embers::{
    config::ServerConfig,
    database::Database,
    models::CivilDate,
    resources::EngineResources,
    test_utils::{MemoryActivityLog, StaticProfileGoals},
};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process).
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard in-memory test database.
pub async fn create_test_database() -> Arc<Database> {
    init_test_logging();
    Arc::new(
        Database::new("sqlite::memory:")
            .await
            .expect("in-memory database"),
    )
}

/// Parse a test date literal.
pub fn date(s: &str) -> CivilDate {
    CivilDate::parse(s).expect("test date literal")
}

/// Engine wired against in-memory collaborators. Returns the log and profile
/// handles so tests can seed and retract activity.
pub async fn create_memory_engine() -> (
    Arc<EngineResources>,
    Arc<MemoryActivityLog>,
    Arc<StaticProfileGoals>,
) {
    create_memory_engine_with_config(ServerConfig::default()).await
}

/// Same as [`create_memory_engine`] but with a custom configuration.
pub async fn create_memory_engine_with_config(
    config: ServerConfig,
) -> (
    Arc<EngineResources>,
    Arc<MemoryActivityLog>,
    Arc<StaticProfileGoals>,
) {
    let database = create_test_database().await;
    let log = Arc::new(MemoryActivityLog::new());
    let profiles = Arc::new(StaticProfileGoals::new());
    let resources = Arc::new(EngineResources::with_collaborators(
        database,
        Arc::new(config),
        Arc::clone(&profiles) as Arc<dyn embers::goal_ledger::ProfileGoals>,
        Arc::clone(&log) as Arc<dyn embers::evaluator::ActivityLog>,
    ));
    (resources, log, profiles)
}

/// Engine wired against the SQL collaborators, with the externally owned
/// log and profile tables created and ready for seeding.
pub async fn create_sql_engine() -> Arc<EngineResources> {
    let database = create_test_database().await;
    create_collaborator_tables(&database).await;
    Arc::new(EngineResources::with_collaborators(
        Arc::clone(&database),
        Arc::new(ServerConfig::default()),
        Arc::new(embers::goal_ledger::SqlProfileGoals::new(Arc::clone(&database))),
        Arc::new(embers::evaluator::SqlActivityLog::new(database)),
    ))
}

/// Create the collaborator-owned tables the engine only reads. The engine's
/// own migrations deliberately never touch these.
pub async fn create_collaborator_tables(database: &Database) {
    for ddl in [
        "CREATE TABLE IF NOT EXISTS food_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            logged_on TEXT NOT NULL,
            calories REAL NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS exercise_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            logged_on TEXT NOT NULL,
            duration_minutes REAL NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            daily_calorie_goal INTEGER
        )",
    ] {
        sqlx::query(ddl)
            .execute(database.pool())
            .await
            .expect("collaborator DDL");
    }
}

/// Seed a food log row.
pub async fn insert_food(database: &Database, user_id: Uuid, day: CivilDate, calories: f64) {
    sqlx::query("INSERT INTO food_logs (user_id, logged_on, calories) VALUES (?1, ?2, ?3)")
        .bind(user_id.to_string())
        .bind(day.to_string())
        .bind(calories)
        .execute(database.pool())
        .await
        .expect("insert food log");
}

/// Seed an exercise log row.
pub async fn insert_exercise(database: &Database, user_id: Uuid, day: CivilDate, minutes: f64) {
    sqlx::query(
        "INSERT INTO exercise_logs (user_id, logged_on, duration_minutes) VALUES (?1, ?2, ?3)",
    )
    .bind(user_id.to_string())
    .bind(day.to_string())
    .bind(minutes)
    .execute(database.pool())
    .await
    .expect("insert exercise log");
}

/// Seed a user profile with a derived calorie goal.
pub async fn insert_profile(database: &Database, user_id: Uuid, daily_calorie_goal: i64) {
    sqlx::query("INSERT INTO user_profiles (user_id, daily_calorie_goal) VALUES (?1, ?2)")
        .bind(user_id.to_string())
        .bind(daily_calorie_goal)
        .execute(database.pool())
        .await
        .expect("insert profile");
}
