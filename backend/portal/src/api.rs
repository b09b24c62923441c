//! Axum REST API handlers.
//!
//! Reads are public. Every write takes an [`AdminSession`], so it is
//! rejected with `401` unless the request carries a live bearer token.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sabil_funds::report;
use sabil_funds::{
    Amount, CycleRequest, GlobalBalance, Project, ProjectStatus, Report, Settings,
    PLACEHOLDER_IMAGE_URL,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, AdminSession, SessionGrant};
use crate::config::Config;
use crate::cycle::{self, CommitRequest, Committed, Preview};
use crate::db::{self, NewProject};
use crate::drafting::Drafter;
use crate::errors::{PortalError, Result};
use crate::media::MediaClient;

pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
    /// `None` when Cloudinary credentials are not configured
    pub media: Option<MediaClient>,
    pub drafter: Drafter,
}

/// Assemble every route on top of the shared state.
pub fn router(state: Arc<ApiState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/draft-description", post(draft_description))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/reports", get(list_reports))
        .route(
            "/api/reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/api/settings", get(get_settings).put(save_settings))
        .route("/api/balance", get(get_balance))
        .route(
            "/api/upload",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/distributions/preview", post(preview_distribution))
        .route("/api/distributions", post(commit_distribution))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// JSON extractor
// ─────────────────────────────────────────────────────────

/// `Json<T>` whose rejections (bad syntax, wrong shape, out-of-range
/// amounts, missing content type) become a `400` with the usual error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(PortalError::Validation(rejection.body_text())),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub image_url: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub target_amount: Amount,
    #[serde(default)]
    pub is_important: bool,
}

/// Every field is optional; absent fields keep their stored value.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub target_amount: Option<Amount>,
    pub is_important: Option<bool>,
}

#[derive(Deserialize)]
pub struct DescriptionRequest {
    pub title: String,
}

#[derive(Serialize)]
pub struct DescriptionDraft {
    pub description: String,
    /// `false` when the ready-made template was used
    pub drafted: bool,
}

#[derive(Deserialize)]
pub struct UpdateReportPayload {
    pub title: String,
    pub description: String,
}

fn require_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PortalError::Validation("title is required".to_string()));
    }
    Ok(title.to_string())
}

fn require_positive_target(target: Amount) -> Result<Amount> {
    if target <= Amount::ZERO {
        return Err(PortalError::Validation(
            "target amount must be greater than zero".to_string(),
        ));
    }
    Ok(target)
}

// ─────────────────────────────────────────────────────────
// Health & auth
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<Arc<ApiState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<SessionGrant>> {
    let grant = auth::login(
        &state.pool,
        &state.config.admin_password,
        Duration::from_secs(state.config.session_ttl_secs),
        &body.password,
    )
    .await?;
    Ok(Json(grant))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(state): State<Arc<ApiState>>,
    session: AdminSession,
) -> Result<Json<SuccessResponse>> {
    auth::logout(&state.pool, &session).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

/// `GET /api/projects[?status=active|completed]`
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ProjectListQuery>,
) -> Result<Json<Vec<Project>>> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(ProjectStatus::parse(raw).ok_or_else(|| {
            PortalError::Validation(format!("unknown project status: {raw}"))
        })?),
    };
    Ok(Json(db::list_projects(&state.pool, status).await?))
}

/// `GET /api/projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Project>> {
    db::get_project(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| PortalError::NotFound(format!("Project {id}")))
}

/// `POST /api/projects`
///
/// New projects always start at zero collected and `active`.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    ApiJson(payload): ApiJson<CreateProjectPayload>,
) -> Result<impl IntoResponse> {
    let new = NewProject {
        title: require_title(&payload.title)?,
        description: payload.description,
        image_url: payload
            .image_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
        target_amount: require_positive_target(payload.target_amount)?,
        is_important: payload.is_important,
        created_at: Utc::now(),
    };

    let project = db::insert_project(&state.pool, &new).await?;
    info!("Project '{}' created (id={})", project.title, project.id);
    Ok((StatusCode::CREATED, Json(project)))
}

/// `POST /api/projects/draft-description`
///
/// Suggests a description for the admin to edit. Nothing is stored.
pub async fn draft_description(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    ApiJson(body): ApiJson<DescriptionRequest>,
) -> Result<Json<DescriptionDraft>> {
    let title = require_title(&body.title)?;
    let draft = match state.drafter.describe_project(&title).await {
        Some(text) => DescriptionDraft {
            description: text,
            drafted: true,
        },
        None => DescriptionDraft {
            description: report::project_description(&title),
            drafted: false,
        },
    };
    Ok(Json(draft))
}

/// `PUT /api/projects/:id`
///
/// The collected amount is never editable here. Lowering the target below
/// what has already been collected is rejected; status is recomputed.
pub async fn update_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    _session: AdminSession,
    ApiJson(payload): ApiJson<UpdateProjectPayload>,
) -> Result<Json<Project>> {
    let mut project = db::get_project(&state.pool, id)
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("Project {id}")))?;

    if let Some(title) = payload.title {
        project.title = require_title(&title)?;
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    if let Some(url) = payload.image_url.filter(|u| !u.trim().is_empty()) {
        project.image_url = url;
    }
    if let Some(is_important) = payload.is_important {
        project.is_important = is_important;
    }
    if let Some(target) = payload.target_amount {
        let target = require_positive_target(target)?;
        if target < project.current_amount {
            return Err(PortalError::Validation(format!(
                "target {target} is below the {} already collected",
                project.current_amount
            )));
        }
        project.target_amount = target;
    }
    project.status = ProjectStatus::for_amounts(project.current_amount, project.target_amount);

    if !db::update_project_details(&state.pool, &project).await? {
        return Err(PortalError::NotFound(format!("Project {id}")));
    }
    Ok(Json(project))
}

/// `DELETE /api/projects/:id`
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    _session: AdminSession,
) -> Result<Json<SuccessResponse>> {
    if !db::delete_project(&state.pool, id).await? {
        return Err(PortalError::NotFound(format!("Project {id}")));
    }
    info!("Project {id} deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ─────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────

/// `GET /api/reports`
pub async fn list_reports(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Report>>> {
    Ok(Json(db::list_reports(&state.pool).await?))
}

/// `GET /api/reports/:id`
pub async fn get_report(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<Report>> {
    db::get_report(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| PortalError::NotFound(format!("Report {id}")))
}

/// `PUT /api/reports/:id`: title and description only.
pub async fn update_report(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    _session: AdminSession,
    ApiJson(payload): ApiJson<UpdateReportPayload>,
) -> Result<Json<Report>> {
    let title = require_title(&payload.title)?;
    if !db::update_report_text(&state.pool, id, &title, &payload.description).await? {
        return Err(PortalError::NotFound(format!("Report {id}")));
    }
    db::get_report(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| PortalError::NotFound(format!("Report {id}")))
}

/// `DELETE /api/reports/:id`
pub async fn delete_report(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    _session: AdminSession,
) -> Result<Json<SuccessResponse>> {
    if !db::delete_report(&state.pool, id).await? {
        return Err(PortalError::NotFound(format!("Report {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

// ─────────────────────────────────────────────────────────
// Settings & balance
// ─────────────────────────────────────────────────────────

/// `GET /api/settings`
pub async fn get_settings(State(state): State<Arc<ApiState>>) -> Result<Json<Settings>> {
    Ok(Json(db::get_settings(&state.pool).await?))
}

/// `PUT /api/settings`
pub async fn save_settings(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    ApiJson(settings): ApiJson<Settings>,
) -> Result<Json<Settings>> {
    db::save_settings(&state.pool, &settings).await?;
    Ok(Json(settings))
}

/// `GET /api/balance`
pub async fn get_balance(State(state): State<Arc<ApiState>>) -> Result<Json<GlobalBalance>> {
    Ok(Json(db::get_balance(&state.pool).await?))
}

// ─────────────────────────────────────────────────────────
// Media
// ─────────────────────────────────────────────────────────

/// `POST /api/upload`, multipart field `image`.
pub async fn upload_image(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let media = state.media.as_ref().ok_or(PortalError::MediaDisabled)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("image/jpeg").to_string();
        if !content_type.starts_with("image/") {
            return Err(PortalError::Validation(format!(
                "expected an image, got {content_type}"
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| PortalError::Validation(format!("Failed to read field: {e}")))?;
        if data.is_empty() {
            return Err(PortalError::Validation("Invalid file upload".to_string()));
        }

        let image_url = media.upload_image(&data, &content_type).await?;
        info!("Image uploaded ({} bytes)", data.len());
        return Ok(Json(UploadResponse {
            success: true,
            image_url,
        }));
    }

    Err(PortalError::Validation(
        "No image file provided".to_string(),
    ))
}

// ─────────────────────────────────────────────────────────
// Distribution cycles
// ─────────────────────────────────────────────────────────

/// `POST /api/distributions/preview`
pub async fn preview_distribution(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    ApiJson(request): ApiJson<CycleRequest>,
) -> Result<Json<Preview>> {
    Ok(Json(
        cycle::preview(&state.pool, &state.drafter, &request).await?,
    ))
}

/// `POST /api/distributions`
pub async fn commit_distribution(
    State(state): State<Arc<ApiState>>,
    _session: AdminSession,
    ApiJson(request): ApiJson<CommitRequest>,
) -> Result<impl IntoResponse> {
    let committed: Committed = cycle::commit(&state.pool, &request).await?;
    Ok((StatusCode::CREATED, Json(committed)))
}
