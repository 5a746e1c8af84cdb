use crate::admin::{csv_filename, whatsapp_link, AdminWorkspace, Dashboard};
use crate::auth::{bearer_token, AdminSession, SessionResolver, StaffSession};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::dispatch_queue::DispatchQueue;
use crate::errors::{AppError, SessionError};
use crate::models::*;
use crate::notify::NotificationDispatcher;
use crate::store::LeadStore;
use crate::submission::{clip_user_agent, LeadSubmissionService};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Public lead intake (validate, store, queue notification).
    pub submissions: LeadSubmissionService,
    /// Staff notification sender, also reachable over HTTP.
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Staff review operations.
    pub workspace: AdminWorkspace,
    /// Courses, schedules and site settings.
    pub catalog: Catalog,
    /// Bearer token -> session, cached for `session_ttl_secs`.
    pub sessions: SessionResolver,
}

impl AppState {
    /// Wires every component onto one store.
    pub fn new(
        config: &Config,
        store: Arc<dyn LeadStore>,
        queue: DispatchQueue,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            submissions: LeadSubmissionService::new(store.clone(), queue),
            workspace: AdminWorkspace::new(
                store.clone(),
                config.admin_page_size,
                config.display_offset(),
            ),
            catalog: Catalog::new(store.clone()),
            sessions: SessionResolver::new(store, Duration::from_secs(config.session_ttl_secs)),
            dispatcher,
        }
    }
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "gtactical-leads-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Public form ============

/// GET /api/v1/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.catalog.list_active_courses().await?))
}

/// GET /api/v1/schedules/open
pub async fn list_open_schedules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScheduleOption>>, AppError> {
    Ok(Json(state.catalog.list_open_schedules().await?))
}

/// GET /api/v1/settings
pub async fn site_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SiteSettings>, AppError> {
    Ok(Json(state.catalog.site_settings().await?))
}

/// First hop of `X-Forwarded-For`, if it looks like an address.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_hexdigit() || b == b'.' || b == b':')
    {
        Some(first.to_string())
    } else {
        None
    }
}

/// Request metadata recorded with a lead.
pub fn capture_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> CaptureMetadata {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .and_then(clip_user_agent);

    CaptureMetadata {
        user_agent,
        ip_address: forwarded_for(headers).or_else(|| peer.map(|addr| addr.ip().to_string())),
    }
}

/// POST /api/v1/leads
///
/// Registers a prospective student. The response does not wait for the staff
/// notification.
///
/// # Returns
///
/// * `201` with `{success, lead_id, message}` once the lead is stored.
/// * `422` with per-field messages when validation fails.
/// * `503` with a retry message when the store rejects the write.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(input): Json<LeadInput>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let meta = capture_metadata(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let lead = state.submissions.submit(input, meta).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            success: true,
            lead_id: lead.id,
            message: "Inscrição enviada! Entraremos em contato em breve.".to_string(),
        }),
    ))
}

/// POST /functions/lead-notify
///
/// Sends the staff notification for the `record` in the body.
pub async fn lead_notify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotifyRequest>,
) -> (StatusCode, &'static str) {
    match state.dispatcher.dispatch_request(request).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(crate::errors::DispatchError::MissingPayload) => {
            (StatusCode::BAD_REQUEST, "missing record")
        }
        Err(_) => (StatusCode::BAD_GATEWAY, "email send failed"),
    }
}

// ============ Admin workspace ============

/// GET /api/v1/admin/session
pub async fn admin_session(session: StaffSession) -> Json<StaffSession> {
    Json(session)
}

/// DELETE /api/v1/admin/session
///
/// Signs out: the bearer token is deleted and stops working immediately.
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers).ok_or(SessionError::MissingToken)?;
    state.sessions.revoke(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/leads?q=
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<Vec<LeadView>>, AppError> {
    let views = state.workspace.list(&session, query.q.as_deref()).await?;
    Ok(Json(views))
}

/// PATCH /api/v1/admin/leads/:id/status
///
/// # Returns
///
/// * `Result<Json<LeadView>, AppError>` - The lead as re-read after the update.
pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<LeadView>, AppError> {
    let view = state
        .workspace
        .set_status(&session, id, request.status)
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/admin/leads/export.csv?q=
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Query(query): Query<LeadListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let views = state.workspace.list(&session, query.q.as_deref()).await?;
    let bytes = state
        .workspace
        .export_csv(&views)
        .map_err(|e| AppError::InternalError(format!("CSV export failed: {}", e)))?;

    let filename = csv_filename(chrono::Utc::now().date_naive());
    tracing::info!("✓ Exported {} leads to {}", views.len(), filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}

/// GET /api/v1/admin/leads/:id/whatsapp
pub async fn lead_whatsapp_link(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let view = state
        .workspace
        .view(&session, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    let url = whatsapp_link(&view)
        .map_err(|e| AppError::InternalError(format!("WhatsApp link: {}", e)))?;

    Ok(Json(json!({ "url": url.as_str() })))
}

/// GET /api/v1/admin/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(state.workspace.dashboard(&session).await?))
}

// ============ Catalog management ============

/// GET /api/v1/admin/courses
pub async fn admin_list_courses(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.catalog.courses(&session).await?))
}

/// POST /api/v1/admin/courses
///
/// # Returns
///
/// * `201` with the stored course.
/// * `409` when the normalized slug is already used by another course.
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(input): Json<CourseInput>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = state.catalog.create_course(&session, input).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// PUT /api/v1/admin/courses/:id
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(input): Json<CourseInput>,
) -> Result<Json<Course>, AppError> {
    Ok(Json(state.catalog.update_course(&session, id, input).await?))
}

/// DELETE /api/v1/admin/courses/:id
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_course(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/schedules
pub async fn admin_list_schedules(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<ScheduleView>>, AppError> {
    Ok(Json(state.catalog.schedules(&session).await?))
}

/// POST /api/v1/admin/schedules
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(input): Json<ScheduleInput>,
) -> Result<(StatusCode, Json<Schedule>), AppError> {
    let schedule = state.catalog.create_schedule(&session, input).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// PUT /api/v1/admin/schedules/:id
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(
        state.catalog.update_schedule(&session, id, input).await?,
    ))
}

/// DELETE /api/v1/admin/schedules/:id
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_schedule(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/settings
pub async fn save_site_settings(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(input): Json<SiteSettings>,
) -> Result<Json<SiteSettings>, AppError> {
    Ok(Json(state.catalog.save_site_settings(&session, input).await?))
}
