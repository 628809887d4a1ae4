// ABOUTME: Database management for streak and goal-history storage
// ABOUTME: SQLite schema migration, streak row CRUD with optimistic locking, and aggregate reads
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! # Database Management
//!
//! Owns two tables: `goal_history` (unique per user and effective date) and
//! `streaks` (unique per user and metric). The food/exercise log tables and
//! `user_profiles` belong to other subsystems; this module only reads them,
//! and `migrate()` never creates or alters them.
//!
//! Dates are stored as ISO-8601 text (`YYYY-MM-DD` for civil dates, RFC 3339
//! for timestamps). Streak updates carry the previous `updated_at` as an
//! optimistic-concurrency token: an `UPDATE` that matches zero rows means a
//! concurrent writer got there first.

use crate::models::{CivilDate, GoalHistoryEntry, Metric, StreakRecord};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// Database manager for streak and goal-history storage.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open a connection pool and run migrations.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        let pool = SqlitePool::connect(&connection_options).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations for the tables this engine owns.
    ///
    /// # Errors
    /// Returns an error when a DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS goal_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                effective_date TEXT NOT NULL,
                goal_value INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, effective_date)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_goal_history_user_date
             ON goal_history(user_id, effective_date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS streaks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                metric TEXT NOT NULL CHECK (metric IN ('calories', 'exercise')),
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_activity_date TEXT,
                streak_start_date TEXT,
                minimum_exercise_minutes INTEGER NOT NULL DEFAULT 15,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, metric)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_streaks_user_id ON streaks(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Idempotently upsert the goal in force from `effective_date`.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub async fn upsert_goal_history(
        &self,
        user_id: Uuid,
        effective_date: CivilDate,
        goal_value: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO goal_history (id, user_id, effective_date, goal_value, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, effective_date)
            DO UPDATE SET goal_value = excluded.goal_value
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(effective_date.to_string())
        .bind(goal_value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether any goal-history entries exist for the user, regardless of
    /// effective date.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn has_goal_history(&self, user_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM goal_history WHERE user_id = ?1 LIMIT 1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Latest goal-history entry with `effective_date <= date`.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn goal_on_or_before(
        &self,
        user_id: Uuid,
        date: CivilDate,
    ) -> Result<Option<GoalHistoryEntry>> {
        let row = sqlx::query(
            r"
            SELECT user_id, effective_date, goal_value, created_at
            FROM goal_history
            WHERE user_id = ?1 AND effective_date <= ?2
            ORDER BY effective_date DESC
            LIMIT 1
            ",
        )
        .bind(user_id.to_string())
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_goal_entry(&row)).transpose()
    }

    /// Streak record for a (user, metric) pair, if one exists.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn get_streak(&self, user_id: Uuid, metric: Metric) -> Result<Option<StreakRecord>> {
        let row = sqlx::query("SELECT * FROM streaks WHERE user_id = ?1 AND metric = ?2")
            .bind(user_id.to_string())
            .bind(metric.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_streak(&row)).transpose()
    }

    /// All streak records for a user, ordered by metric.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn get_streaks(&self, user_id: Uuid) -> Result<Vec<StreakRecord>> {
        let rows = sqlx::query("SELECT * FROM streaks WHERE user_id = ?1 ORDER BY metric")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_streak).collect()
    }

    /// Insert a freshly created streak record. Returns `false` when a
    /// concurrent creator won the (user, metric) unique constraint, in which
    /// case nothing was written and the caller should re-read.
    ///
    /// # Errors
    /// Returns an error when the write fails for any other reason.
    pub async fn insert_streak(&self, record: &StreakRecord) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO streaks (
                id, user_id, metric, current_streak, longest_streak,
                last_activity_date, streak_start_date, minimum_exercise_minutes,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.metric.as_str())
        .bind(record.current_streak)
        .bind(record.longest_streak)
        .bind(record.last_activity_date.map(|d| d.to_string()))
        .bind(record.streak_start_date.map(|d| d.to_string()))
        .bind(record.minimum_exercise_minutes)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a mutated streak record, guarded by the `updated_at` the
    /// caller read. Returns `false` when a concurrent writer invalidated the
    /// guard and nothing was written.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub async fn update_streak(
        &self,
        record: &StreakRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE streaks
            SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3,
                streak_start_date = ?4, minimum_exercise_minutes = ?5, updated_at = ?6
            WHERE id = ?7 AND updated_at = ?8
            ",
        )
        .bind(record.current_streak)
        .bind(record.longest_streak)
        .bind(record.last_activity_date.map(|d| d.to_string()))
        .bind(record.streak_start_date.map(|d| d.to_string()))
        .bind(record.minimum_exercise_minutes)
        .bind(record.updated_at.to_rfc3339())
        .bind(record.id.to_string())
        .bind(expected_updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sum of logged food calories for (user, date). Reads the externally
    /// owned `food_logs` table.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn daily_food_calories(&self, user_id: Uuid, date: CivilDate) -> Result<f64> {
        let row = sqlx::query(
            "SELECT CAST(COALESCE(SUM(calories), 0) AS REAL) AS total
             FROM food_logs WHERE user_id = ?1 AND logged_on = ?2",
        )
        .bind(user_id.to_string())
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    /// Sum of logged exercise minutes for (user, date). Reads the externally
    /// owned `exercise_logs` table.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn daily_exercise_minutes(&self, user_id: Uuid, date: CivilDate) -> Result<f64> {
        let row = sqlx::query(
            "SELECT CAST(COALESCE(SUM(duration_minutes), 0) AS REAL) AS total
             FROM exercise_logs WHERE user_id = ?1 AND logged_on = ?2",
        )
        .bind(user_id.to_string())
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    /// Current profile-derived daily calorie goal, `None` when the user has
    /// no profile. Reads the externally owned `user_profiles` table.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub async fn profile_calorie_goal(&self, user_id: Uuid) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT daily_calorie_goal FROM user_profiles WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("daily_calorie_goal")?),
            None => Ok(None),
        }
    }

    /// Access to the underlying pool, for test fixtures that seed the
    /// collaborator-owned tables.
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn row_to_goal_entry(row: &sqlx::sqlite::SqliteRow) -> Result<GoalHistoryEntry> {
        let user_id: String = row.try_get("user_id")?;
        let effective_date: String = row.try_get("effective_date")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(GoalHistoryEntry {
            user_id: Uuid::parse_str(&user_id)?,
            effective_date: CivilDate::parse(&effective_date)
                .map_err(|e| anyhow!("corrupt effective_date: {e}"))?,
            goal_value: row.try_get("goal_value")?,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        })
    }

    fn row_to_streak(row: &sqlx::sqlite::SqliteRow) -> Result<StreakRecord> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        let metric: String = row.try_get("metric")?;
        let last_activity_date: Option<String> = row.try_get("last_activity_date")?;
        let streak_start_date: Option<String> = row.try_get("streak_start_date")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(StreakRecord {
            id: Uuid::parse_str(&id)?,
            user_id: Uuid::parse_str(&user_id)?,
            metric: Metric::parse(&metric).map_err(|e| anyhow!("corrupt metric: {e}"))?,
            current_streak: row.try_get("current_streak")?,
            longest_streak: row.try_get("longest_streak")?,
            last_activity_date: last_activity_date
                .map(|d| CivilDate::parse(&d))
                .transpose()
                .map_err(|e| anyhow!("corrupt last_activity_date: {e}"))?,
            streak_start_date: streak_start_date
                .map(|d| CivilDate::parse(&d))
                .transpose()
                .map_err(|e| anyhow!("corrupt streak_start_date: {e}"))?,
            minimum_exercise_minutes: row.try_get("minimum_exercise_minutes")?,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
        })
    }
}
