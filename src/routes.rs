use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

fn lead_intake_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/leads", post(handlers::submit_lead))
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Public form
        .route("/api/v1/courses", get(handlers::list_courses))
        .route("/api/v1/schedules/open", get(handlers::list_open_schedules))
        .route("/api/v1/settings", get(handlers::site_settings))
        // Notification entry point
        .route("/functions/lead-notify", post(handlers::lead_notify))
        // Admin workspace (staff bearer token)
        .route(
            "/api/v1/admin/session",
            get(handlers::admin_session).delete(handlers::end_session),
        )
        .route("/api/v1/admin/leads", get(handlers::list_leads))
        .route(
            "/api/v1/admin/leads/export.csv",
            get(handlers::export_leads),
        )
        .route(
            "/api/v1/admin/leads/:id/status",
            patch(handlers::update_lead_status),
        )
        .route(
            "/api/v1/admin/leads/:id/whatsapp",
            get(handlers::lead_whatsapp_link),
        )
        .route("/api/v1/admin/dashboard", get(handlers::dashboard))
        // Catalog management (staff bearer token)
        .route(
            "/api/v1/admin/courses",
            get(handlers::admin_list_courses).post(handlers::create_course),
        )
        .route(
            "/api/v1/admin/courses/:id",
            put(handlers::update_course).delete(handlers::delete_course),
        )
        .route(
            "/api/v1/admin/schedules",
            get(handlers::admin_list_schedules).post(handlers::create_schedule),
        )
        .route(
            "/api/v1/admin/schedules/:id",
            put(handlers::update_schedule).delete(handlers::delete_schedule),
        )
        .route("/api/v1/admin/settings", put(handlers::save_site_settings))
}

fn finish(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(routes)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Full application router without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    finish(lead_intake_routes().merge(api_routes()), state)
}

/// Application router with the lead intake route rate limited per client IP
/// (2 req/s, burst of 5). Must be served with connect info.
pub fn router_with_rate_limit(state: Arc<AppState>) -> anyhow::Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let limited = lead_intake_routes().layer(ServiceBuilder::new().layer(GovernorLayer {
        config: governor_conf,
    }));

    Ok(finish(limited.merge(api_routes()), state))
}
