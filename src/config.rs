// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses env vars for server binding, database URL, timezone, and streak policy knobs
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Environment-based configuration.
//!
//! Configuration is environment-only: every knob has a production-safe
//! default and can be overridden by an environment variable. The deployment
//! timezone offset is resolved here exactly once; the rest of the engine only
//! ever sees civil dates derived from it.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::str::FromStr;

/// Default daily calorie goal when neither ledger nor profile supplies one.
pub const DEFAULT_DAILY_CALORIE_GOAL: i64 = 2000;

/// Default qualifying threshold for the exercise metric, in minutes.
pub const DEFAULT_MIN_EXERCISE_MINUTES: i64 = 15;

/// Default cap on the backward recalculation walk, in days.
pub const DEFAULT_RECALC_MAX_DAYS: u32 = 365;

/// Default bound on advance retries after a write conflict.
pub const DEFAULT_ADVANCE_MAX_RETRIES: u32 = 3;

/// Server configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port (`HTTP_PORT`, default 8080).
    pub http_port: u16,
    /// Database connection string (`DATABASE_URL`, default `sqlite:./data/embers.db`).
    pub database_url: String,
    /// Deployment-wide reference timezone offset
    /// (`STREAK_TIMEZONE_OFFSET` as `+HH:MM`/`-HH:MM`, default `+00:00`).
    pub timezone_offset: FixedOffset,
    /// Cap on the backward recalculation walk (`STREAK_RECALC_MAX_DAYS`).
    pub recalc_max_days: u32,
    /// Fallback daily calorie goal (`DEFAULT_DAILY_CALORIE_GOAL`).
    pub default_calorie_goal: i64,
    /// Exercise threshold for lazily created records (`DEFAULT_MIN_EXERCISE_MINUTES`).
    pub default_min_exercise_minutes: i64,
    /// Retry bound for optimistic-concurrency conflicts (`STREAK_UPDATE_MAX_RETRIES`).
    pub advance_max_retries: u32,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    /// Returns an error when a variable is present but unparseable; absent
    /// variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_port: parse_env("HTTP_PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/embers.db".into()),
            timezone_offset: parse_timezone_offset()?,
            recalc_max_days: parse_env("STREAK_RECALC_MAX_DAYS", DEFAULT_RECALC_MAX_DAYS)?,
            default_calorie_goal: parse_env(
                "DEFAULT_DAILY_CALORIE_GOAL",
                DEFAULT_DAILY_CALORIE_GOAL,
            )?,
            default_min_exercise_minutes: parse_env(
                "DEFAULT_MIN_EXERCISE_MINUTES",
                DEFAULT_MIN_EXERCISE_MINUTES,
            )?,
            advance_max_retries: parse_env(
                "STREAK_UPDATE_MAX_RETRIES",
                DEFAULT_ADVANCE_MAX_RETRIES,
            )?,
        })
    }

    /// One-line startup summary for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} db={} tz={} recalc_cap={} default_goal={} min_exercise={} retries={}",
            self.http_port,
            self.database_url,
            self.timezone_offset,
            self.recalc_max_days,
            self.default_calorie_goal,
            self.default_min_exercise_minutes,
            self.advance_max_retries,
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            database_url: "sqlite::memory:".into(),
            timezone_offset: Utc.fix(),
            recalc_max_days: DEFAULT_RECALC_MAX_DAYS,
            default_calorie_goal: DEFAULT_DAILY_CALORIE_GOAL,
            default_min_exercise_minutes: DEFAULT_MIN_EXERCISE_MINUTES,
            advance_max_retries: DEFAULT_ADVANCE_MAX_RETRIES,
        }
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_timezone_offset() -> Result<FixedOffset> {
    match env::var("STREAK_TIMEZONE_OFFSET") {
        Ok(raw) => FixedOffset::from_str(&raw)
            .with_context(|| format!("invalid STREAK_TIMEZONE_OFFSET: '{raw}' (expected +HH:MM)")),
        Err(_) => Ok(Utc.fix()),
    }
}
