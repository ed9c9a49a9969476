use crate::bureau_client::HttpBureauClient;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    ApplicantData, AuthenticateResponse, Consultation, FetchReportResponse, HistoryEntry,
    SubmitResponse,
};
use crate::orchestrator::Orchestrator;
use crate::store::PgConsultationStore;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The consultation pipeline.
    pub orchestrator: Orchestrator<PgConsultationStore, HttpBureauClient>,
}

/// Caller identity extracted from authenticated request headers.
///
/// Session/login mechanics live in front of this service; requests arrive
/// with the service API key and the already-resolved caller user id.
pub struct AuthenticatedUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing X-Api-Key header".to_string()))?;

        if api_key != state.config.service_api_key {
            return Err(AppError::Unauthorized("Invalid API key".to_string()));
        }

        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Missing or invalid X-User-Id header".to_string())
            })?;

        Ok(AuthenticatedUser(user_id))
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-buro-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/consultations
///
/// Validates the applicant, creates the consultation in `pending` and runs
/// the authentication stage once. The response always carries the new id
/// and resulting status; `requiresAuth` signals the recoverable
/// subject-not-authenticated outcome.
pub async fn submit_consultation(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(applicant): Json<ApplicantData>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    tracing::info!("POST /consultations for user {}", user_id);
    let response = state.orchestrator.submit(user_id, applicant).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/consultations/:id/authenticate
pub async fn authenticate_consultation(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(applicant): Json<ApplicantData>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    tracing::info!("POST /consultations/{}/authenticate", id);
    let response = state
        .orchestrator
        .authenticate(user_id, id, applicant)
        .await?;
    Ok(Json(response))
}

/// POST /api/v1/consultations/:id/report
pub async fn fetch_report(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(applicant): Json<ApplicantData>,
) -> Result<Json<FetchReportResponse>, AppError> {
    tracing::info!("POST /consultations/{}/report", id);
    let response = state
        .orchestrator
        .fetch_report(user_id, id, applicant)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/consultations/:id
pub async fn get_consultation(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Consultation>, AppError> {
    let consultation = state.orchestrator.get_consultation(user_id, id).await?;
    Ok(Json(consultation))
}

/// GET /api/v1/consultations
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = state.orchestrator.list_history(user_id).await?;
    Ok(Json(history))
}

/// GET /api/v1/consultations/:id/pdf
///
/// Returns the rendered PDF with a filename carrying the RFC. Fails with
/// 409 unless the consultation is `completed`.
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (file_name, bytes) = state.orchestrator.download_report(user_id, id).await?;
    tracing::info!("Rendered PDF {} ({} bytes)", file_name, bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
