// ABOUTME: Main library entry point for the Embers streak engine
// ABOUTME: Streak and goal-history tracking for nutrition and exercise logging backends
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

#![deny(unsafe_code)]

//! # Embers
//!
//! A streak-and-goal-history tracking engine: per user and per metric
//! (daily-calorie-goal-met, daily-exercise-goal-met) it maintains a running
//! count of consecutive qualifying days and keeps it correct under
//! retroactive edits and deletions, goal changes over time, multiple
//! same-day writes, and timezone-fixed date boundaries.
//!
//! ## Architecture
//!
//! - **models**: civil dates, metrics, streak records, goal ledger entries
//! - **goal_ledger**: time-indexed record of which goal was in force when,
//!   with an explicit ledger → profile → default fallback chain
//! - **evaluator**: side-effect-free "did this day qualify?" against the
//!   log store's daily aggregates
//! - **streak**: the advance/break/no-op state machine, lazy reaping of
//!   stale streaks, and the locked read-advance-write orchestration
//! - **recalculator**: capped backward rebuild of streak length from raw
//!   history, the self-healing path after retroactive edits
//! - **routes**: the REST surface over [`resources::EngineResources`]
//!
//! Food/exercise logging, user profiles, and authentication are external
//! collaborators reached through traits or read-only queries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use embers::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Embers configured: {}", config.summary());
//!     Ok(())
//! }
//! ```

/// Environment-based configuration.
pub mod config;

/// Streak and goal-history storage over SQLite.
pub mod database;

/// Unified error handling with `AppError` and `ErrorCode`.
pub mod errors;

/// Per-day goal evaluation against logged aggregates.
pub mod evaluator;

/// Time-indexed goal ledger with explicit fallback chain.
pub mod goal_ledger;

/// Structured logging configuration.
pub mod logging;

/// Core domain types.
pub mod models;

/// Backward history rebuild for self-healing.
pub mod recalculator;

/// Shared engine resources, constructed once at startup.
pub mod resources;

/// HTTP route handlers for the streak API.
pub mod routes;

/// Streak state machine, reaping, and locked updates.
pub mod streak;

/// In-memory collaborators for tests.
pub mod test_utils;
