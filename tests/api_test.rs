mod common;

use assessment_backend::{build_router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{bearer, seed_assessment, seed_question, seed_user, setup, unique_email};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

async fn app() -> (Router, sqlx::PgPool) {
    let pool = setup().await;
    let state = AppState::new(pool.clone()).expect("app state");
    (build_router(state), pool)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let (app, _) = app().await;

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, Method::GET, "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/attempts/{id}/submit"].is_object());
}

#[tokio::test]
async fn attempt_routes_require_a_bearer_token() {
    let (app, _) = app().await;

    let (status, body) = call(&app, Method::GET, "/api/attempts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/attempts",
        Some("Bearer not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn direct_attempt_over_http() {
    let (app, pool) = app().await;
    let user = seed_user(&pool, "student").await;
    let auth = bearer(user, "student");
    let q1 = seed_question(&pool, 1, 3, Some(1)).await;
    let q2 = seed_question(&pool, 2, 3, Some(2)).await;
    let assessment = seed_assessment(&pool, 10, true, &[(q1.id, None), (q2.id, None)]).await;

    let (status, started) = call(
        &app,
        Method::POST,
        "/api/attempts/start",
        Some(&auth),
        Some(json!({ "assessment_id": assessment })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["status"], "started");
    assert_eq!(started["origin"], "direct_attempt");
    assert!(started.get("access_token").is_none());
    let id = started["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/attempts/start",
        Some(&auth),
        Some(json!({ "assessment_id": assessment })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, sheet) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/questions", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["questions"].as_array().unwrap().len(), 2);
    assert!(!sheet.to_string().contains("is_correct"));

    let (status, saved) = call(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/answer", id),
        Some(&auth),
        Some(json!({ "question_id": q1.id, "selected_choice_id": q1.right_choice() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["saved"], true);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/attempts/{}/submit", id),
        Some(&auth),
        Some(json!({ "answers": [{ "question_id": q1.id, "selected_choice_id": q1.right_choice() }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, result) = call(
        &app,
        Method::POST,
        &format!("/api/attempts/{}/submit", id),
        Some(&auth),
        Some(json!({ "answers": [
            { "question_id": q1.id, "selected_choice_id": q1.right_choice() },
            { "question_id": q2.id, "selected_choice_id": q2.wrong_choice() },
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["total_score"], 1);
    assert_eq!(result["total_marks"], 3);
    assert_eq!(result["percentage"], 33.33);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/attempts/{}/submit", id),
        Some(&auth),
        Some(json!({ "answers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, fetched) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/result", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["correct_answers"], 1);
    assert_eq!(fetched["total_questions"], 2);

    let (status, listed) = call(&app, Method::GET, "/api/attempts", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], id);
    assert_eq!(listed[0]["status"], "completed");

    let other = bearer(seed_user(&pool, "student").await, "student");
    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/answers", id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let admin = bearer(seed_user(&pool, "admin").await, "admin");
    let (status, answers) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/answers", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answers.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn result_of_unfinished_attempt_is_not_found() {
    let (app, pool) = app().await;
    let user = seed_user(&pool, "student").await;
    let auth = bearer(user, "student");
    let q = seed_question(&pool, 1, 2, Some(0)).await;
    let assessment = seed_assessment(&pool, 10, true, &[(q.id, None)]).await;

    let (_, started) = call(
        &app,
        Method::POST,
        "/api/attempts/start",
        Some(&auth),
        Some(json!({ "assessment_id": assessment })),
    )
    .await;
    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/result", started["id"]),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn invitation_and_guest_flow_over_http() {
    let (app, pool) = app().await;
    let recruiter = seed_user(&pool, "recruiter").await;
    let recruiter_auth = bearer(recruiter, "recruiter");
    let q = seed_question(&pool, 1, 2, Some(0)).await;
    let assessment = seed_assessment(&pool, 10, true, &[(q.id, None)]).await;
    let email = unique_email("guest");

    let student_auth = bearer(seed_user(&pool, "student").await, "student");
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/assessments/{}/invitations", assessment),
        Some(&student_auth),
        Some(json!({ "emails": [email] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/assessments/{}/invitations", assessment),
        Some(&recruiter_auth),
        Some(json!({ "emails": ["not-an-email"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, created) = call(
        &app,
        Method::POST,
        &format!("/api/assessments/{}/invitations", assessment),
        Some(&recruiter_auth),
        Some(json!({ "emails": [email.to_uppercase()] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let invitation = &created["invitations"][0];
    assert_eq!(invitation["email"], email);
    assert_eq!(invitation["status"], "invited");
    let link = invitation["link"].as_str().unwrap();
    let token = link
        .split("token=")
        .nth(1)
        .expect("link carries the token")
        .to_string();
    assert!(link.starts_with("https://quiz.example.com/take-quiz?token="));

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/assessments/{}/invitations", assessment),
        Some(&recruiter_auth),
        Some(json!({ "emails": [email] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let base = format!("/api/public/invitations/{}", token);
    let (status, overview) = call(&app, Method::GET, &base, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["status"], "invited");
    assert_eq!(overview["total_questions"], 1);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/submit", base),
        None,
        Some(json!({ "answers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, sheet) = call(&app, Method::POST, &format!("{}/start", base), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["questions"][0]["id"], q.id);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("{}/answer", base),
        None,
        Some(json!({ "question_id": q.id, "selected_choice_id": q.wrong_choice() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, result) = call(
        &app,
        Method::POST,
        &format!("{}/submit", base),
        None,
        Some(json!({ "answers": [{ "question_id": q.id, "selected_choice_id": q.right_choice() }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["percentage"], 100.0);

    let (status, fetched) = call(&app, Method::GET, &format!("{}/result", base), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["total_score"], 1);

    let queued: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM notification_outbox WHERE recipient = $1 AND event_type = 'invitation'"#,
    )
    .bind(&email)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(queued, 1);
}

#[tokio::test]
async fn admin_routes_are_gated_by_role() {
    let (app, pool) = app().await;
    let admin = bearer(seed_user(&pool, "admin").await, "admin");
    let student = bearer(seed_user(&pool, "student").await, "student");
    let q = seed_question(&pool, 1, 2, Some(0)).await;
    let assessment = seed_assessment(&pool, 10, true, &[(q.id, None)]).await;

    let (status, _) = call(&app, Method::GET, "/api/admin/statistics", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = call(&app, Method::GET, "/api/admin/statistics", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(stats["total_attempts"].as_i64().unwrap() >= stats["completed_attempts"].as_i64().unwrap());

    let (_, started) = call(
        &app,
        Method::POST,
        "/api/attempts/start",
        Some(&student),
        Some(json!({ "assessment_id": assessment })),
    )
    .await;
    let attempt_id = started["id"].as_i64().unwrap();

    let (status, listed) = call(
        &app,
        Method::GET,
        &format!("/api/admin/assessments/{}/attempts", assessment),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], attempt_id);

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/admin/assessments/{}", assessment),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/admin/assessments/{}/attempts", assessment),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/admin/attempts/{}", attempt_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_get_a_typed_bad_request() {
    let (app, pool) = app().await;
    let user = seed_user(&pool, "student").await;
    let auth = bearer(user, "student");
    let q = seed_question(&pool, 1, 2, Some(0)).await;
    let assessment = seed_assessment(&pool, 10, true, &[(q.id, None)]).await;

    let (_, started) = call(
        &app,
        Method::POST,
        "/api/attempts/start",
        Some(&auth),
        Some(json!({ "assessment_id": assessment })),
    )
    .await;
    let submit = format!("/api/attempts/{}/submit", started["id"]);

    let (status, body) = call(
        &app,
        Method::POST,
        &submit,
        Some(&auth),
        Some(json!({ "answers": [{ "selected_choice_id": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri(&submit)
        .header(header::AUTHORIZATION, &auth)
        .body(Body::from(r#"{"answers": []}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "bad_request");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/public/invitations/unknown-token/submit",
        None,
        Some(json!({ "answers": "none" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    // The attempt is still open after the rejected payloads.
    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/attempts/{}/questions", started["id"]),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
