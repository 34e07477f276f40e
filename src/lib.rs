pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::middleware::{auth, cors::cors_layer, rate_limit};
use crate::services::{
    assessment_service::AssessmentService, attempt_service::AttemptService,
    audit_service::AuditService, invitation_service::InvitationService,
    notification_service::NotificationService,
};
use crate::utils::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub attempt_service: AttemptService,
    pub assessment_service: AssessmentService,
    pub invitation_service: InvitationService,
    pub notification_service: NotificationService,
    pub audit_service: AuditService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            attempt_service: AttemptService::with_clock(pool.clone(), clock),
            assessment_service: AssessmentService::new(pool.clone()),
            invitation_service: InvitationService::new(pool.clone()),
            notification_service: NotificationService::new(
                pool.clone(),
                http_client,
                config.mail_relay_url.clone(),
                config.mail_relay_secret.clone(),
            ),
            audit_service: AuditService::new(pool.clone()),
            pool,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let config = crate::config::get_config();

    let attempt_api = Router::new()
        .route("/api/attempts", get(routes::attempts::list_attempts))
        .route("/api/attempts/start", post(routes::attempts::start_attempt))
        .route(
            "/api/attempts/:id/submit",
            post(routes::attempts::submit_attempt),
        )
        .route("/api/attempts/:id/result", get(routes::attempts::get_result))
        .route(
            "/api/attempts/:id/questions",
            get(routes::attempts::get_questions),
        )
        .route(
            "/api/attempts/:id/answer",
            patch(routes::attempts::save_answer),
        )
        .route(
            "/api/attempts/:id/answers",
            get(routes::attempts::list_answers),
        )
        .route_layer(axum::middleware::from_fn(auth::require_bearer_auth));

    let recruiter_api = Router::new()
        .route(
            "/api/assessments/:id/invitations",
            post(routes::invitations::create_invitations),
        )
        .route_layer(axum::middleware::from_fn(auth::require_recruiter));

    let admin_api = Router::new()
        .route("/api/admin/statistics", get(routes::admin::statistics))
        .route(
            "/api/admin/assessments/:id/attempts",
            get(routes::admin::assessment_attempts),
        )
        .route(
            "/api/admin/assessments/:id",
            delete(routes::admin::delete_assessment),
        )
        .route(
            "/api/admin/attempts/:id",
            delete(routes::admin::delete_attempt),
        )
        .route(
            "/api/admin/attempts/:id/audit",
            get(routes::admin::attempt_audit),
        )
        .route_layer(axum::middleware::from_fn(auth::require_admin));

    let authenticated_api = attempt_api
        .merge(recruiter_api)
        .merge(admin_api)
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state("api", config.api_rps),
            rate_limit::rps_middleware,
        ));

    let public_api = Router::new()
        .route(
            "/api/public/invitations/:token",
            get(routes::public::get_invitation),
        )
        .route(
            "/api/public/invitations/:token/start",
            post(routes::public::start_invitation),
        )
        .route(
            "/api/public/invitations/:token/answer",
            patch(routes::public::save_answer),
        )
        .route(
            "/api/public/invitations/:token/submit",
            post(routes::public::submit),
        )
        .route(
            "/api/public/invitations/:token/result",
            get(routes::public::get_result),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state("public", config.public_rps),
            rate_limit::rps_middleware,
        ));

    let base_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/openapi.json", get(routes::docs::openapi_json));

    base_routes
        .merge(authenticated_api)
        .merge(public_api)
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}
