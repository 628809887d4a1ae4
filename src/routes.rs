// ABOUTME: HTTP route handlers for the streak API
// ABOUTME: REST endpoints for reading streaks, applying updates, and dry-run checks
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Streak routes.
//!
//! Three endpoints over [`EngineResources`]:
//! - `GET /streaks?user=&type=` — reaped view models with derived fields
//! - `POST /streaks/update` — apply an evaluated day to a streak
//! - `GET /streaks/check?user=&type=` — dry-run, nothing persisted
//!
//! Authentication lives in front of this service; handlers only validate
//! shape and delegate to the engine.

use crate::errors::AppError;
use crate::models::{CivilDate, Metric, StreakRecord, StreakView};
use crate::resources::EngineResources;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters for streak reads.
#[derive(Deserialize)]
struct StreaksQuery {
    user: Uuid,
    #[serde(rename = "type")]
    metric: Option<String>,
}

/// Query parameters for the dry-run check.
#[derive(Deserialize)]
struct CheckQuery {
    user: Uuid,
    #[serde(rename = "type")]
    metric: String,
}

/// Body for `POST /streaks/update`.
#[derive(Debug, Deserialize)]
struct UpdateRequest {
    user: Uuid,
    streak_type: String,
    /// Civil date being evaluated; defaults to today in the reference zone.
    date: Option<String>,
    /// Caller-known evaluation outcome; omitted means "evaluate here".
    met_goal: Option<bool>,
    /// Caller-supplied exercise aggregate for the day.
    exercise_minutes: Option<f64>,
}

/// Envelope for streak list responses.
#[derive(Serialize)]
struct StreaksResponse {
    streaks: Vec<StreakView>,
}

/// Streak API routes.
pub struct StreakRoutes;

impl StreakRoutes {
    /// Create all streak routes.
    #[must_use]
    pub fn routes(resources: Arc<EngineResources>) -> Router {
        Router::new()
            .route("/streaks", get(Self::handle_get_streaks))
            .route("/streaks/update", post(Self::handle_update))
            .route("/streaks/check", get(Self::handle_check))
            .with_state(resources)
    }

    /// Handle streak reads with lazy reaping.
    async fn handle_get_streaks(
        State(resources): State<Arc<EngineResources>>,
        Query(params): Query<StreaksQuery>,
    ) -> Result<Response, AppError> {
        let metric = params.metric.as_deref().map(Metric::parse).transpose()?;
        let today = CivilDate::today_in(resources.config.timezone_offset);

        let records = resources
            .updater
            .streaks_for_user(params.user, metric, today)
            .await?;

        // No streak rows yet: known users get zeroed views, unknown users
        // 404. Known means a profile or any goal-ledger history, so a user
        // whose profile was deleted keeps their streak surface.
        let records = if records.is_empty() {
            if resources
                .profiles
                .profile_derived_goal(params.user)
                .await?
                .is_none()
                && !resources.ledger.has_entries(params.user).await?
            {
                return Err(AppError::not_found(format!("user {}", params.user)));
            }
            let metrics = metric.map_or_else(|| Metric::all().to_vec(), |m| vec![m]);
            metrics
                .into_iter()
                .map(|m| {
                    StreakRecord::new(
                        params.user,
                        m,
                        resources.config.default_min_exercise_minutes,
                    )
                })
                .collect()
        } else {
            records
        };

        let streaks = records
            .iter()
            .map(|record| StreakView::from_record(record, today))
            .collect();

        Ok((StatusCode::OK, Json(StreaksResponse { streaks })).into_response())
    }

    /// Handle a streak update for an evaluated day.
    async fn handle_update(
        State(resources): State<Arc<EngineResources>>,
        Json(body): Json<UpdateRequest>,
    ) -> Result<Response, AppError> {
        let metric = Metric::parse(&body.streak_type)?;
        let today = CivilDate::today_in(resources.config.timezone_offset);
        let activity_date = match body.date.as_deref() {
            Some(raw) => CivilDate::parse(raw)?,
            None => today,
        };
        if let Some(minutes) = body.exercise_minutes {
            if !minutes.is_finite() || minutes < 0.0 {
                return Err(AppError::invalid_input(format!(
                    "exercise_minutes must be a non-negative number, got {minutes}"
                )));
            }
        }

        let record = resources
            .updater
            .apply(
                body.user,
                metric,
                activity_date,
                body.met_goal,
                body.exercise_minutes,
            )
            .await?;

        let view = StreakView::from_record(&record, today);
        Ok((StatusCode::OK, Json(view)).into_response())
    }

    /// Handle the dry-run check.
    async fn handle_check(
        State(resources): State<Arc<EngineResources>>,
        Query(params): Query<CheckQuery>,
    ) -> Result<Response, AppError> {
        let metric = Metric::parse(&params.metric)?;
        let today = CivilDate::today_in(resources.config.timezone_offset);

        let report = resources.updater.check(params.user, metric, today).await?;
        Ok((StatusCode::OK, Json(report)).into_response())
    }
}
