// ABOUTME: HTTP-level tests for the streak routes
// ABOUTME: Drives the router with oneshot requests and asserts wire shapes and error codes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{create_memory_engine, date};
use embers::models::Metric;
use embers::resources::EngineResources;
use embers::routes::StreakRoutes;
use embers::test_utils::StaticProfileGoals;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn setup() -> (Router, Arc<EngineResources>, Arc<StaticProfileGoals>) {
    let (engine, _, profiles) = create_memory_engine().await;
    let router = StreakRoutes::routes(Arc::clone(&engine));
    (router, engine, profiles)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_streaks_for_an_unknown_user_is_404() {
    let (router, _, _) = setup().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks?user={}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn get_streaks_for_a_known_user_without_rows_returns_zeroed_views() {
    let (router, _, profiles) = setup().await;
    let user = Uuid::new_v4();
    profiles.insert(user, 2000);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks?user={user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let streaks = body["streaks"].as_array().unwrap();
    assert_eq!(streaks.len(), 2);
    for streak in streaks {
        assert_eq!(streak["current_streak"], 0);
        assert_eq!(streak["is_active"], false);
    }
}

#[tokio::test]
async fn get_streaks_for_a_user_known_only_through_goal_history_is_ok() {
    let (router, engine, _) = setup().await;
    let user = Uuid::new_v4();

    // No profile, but the goal ledger remembers the user
    engine
        .ledger
        .upsert(user, date("2025-01-01"), 2100)
        .await
        .unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks?user={user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let streaks = body["streaks"].as_array().unwrap();
    assert_eq!(streaks.len(), 2);
    for streak in streaks {
        assert_eq!(streak["current_streak"], 0);
    }
}

#[tokio::test]
async fn get_streaks_filters_by_type() {
    let (router, engine, _) = setup().await;
    let user = Uuid::new_v4();
    engine
        .updater
        .apply(user, Metric::Calories, date("2025-01-01"), Some(true), None)
        .await
        .unwrap();
    engine
        .updater
        .apply(user, Metric::Exercise, date("2025-01-01"), Some(true), None)
        .await
        .unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks?user={user}&type=calories"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let streaks = body["streaks"].as_array().unwrap();
    assert_eq!(streaks.len(), 1);
    assert_eq!(streaks[0]["streak_type"], "calories");
}

#[tokio::test]
async fn get_streaks_with_an_unknown_type_is_400() {
    let (router, _, _) = setup().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks?user={}&type=steps", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn post_update_applies_a_met_day_and_returns_the_view() {
    let (router, _, _) = setup().await;
    let user = Uuid::new_v4();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/streaks/update")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "user": user,
                        "streak_type": "calories",
                        "date": "2025-01-01",
                        "met_goal": true,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["streak_type"], "calories");
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["longest_streak"], 1);
    assert_eq!(body["streak_start_date"], "2025-01-01");
}

#[tokio::test]
async fn post_update_with_exercise_minutes_evaluates_the_threshold() {
    let (router, _, _) = setup().await;
    let user = Uuid::new_v4();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/streaks/update")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "user": user,
                        "streak_type": "exercise",
                        "date": "2025-01-01",
                        "exercise_minutes": 25.0,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_streak"], 1);
}

#[tokio::test]
async fn post_update_with_a_malformed_date_is_400() {
    let (router, _, _) = setup().await;

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/streaks/update")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "user": Uuid::new_v4(),
                        "streak_type": "calories",
                        "date": "2025-02-30",
                        "met_goal": true,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_DATE");
}

#[tokio::test]
async fn post_update_with_negative_exercise_minutes_is_400() {
    let (router, _, _) = setup().await;

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/streaks/update")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "user": Uuid::new_v4(),
                        "streak_type": "exercise",
                        "date": "2025-01-01",
                        "exercise_minutes": -10.0,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn check_reports_without_persisting() {
    let (router, engine, _) = setup().await;
    let user = Uuid::new_v4();

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks/check?user={user}&type=calories"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["streak_type"], "calories");
    assert_eq!(body["met_goal"], false);
    assert_eq!(body["would_increment"], false);
    assert_eq!(body["current_streak"], 0);

    // Nothing was created by the dry run
    let stored = engine
        .database
        .get_streak(user, Metric::Calories)
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn check_requires_the_type_parameter() {
    let (router, _, _) = setup().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/streaks/check?user={}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
