//! API routes for mindd
//!
//! Handlers are thin: they unpack the request, call [`ProgressService`] and
//! map [`MindError`] onto a status code plus the JSON error envelope.
//!
//! [`ProgressService`]: mind_common::ProgressService

use crate::server::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mind_common::{
    Ack, BadgeView, CodeRequest, CompletionOutcome, CompletionRequest, EnergyAdjustRequest,
    EnergyResponse, ErrorBody, ErrorDetail, HealthResponse, LearnerProfile, Lesson, LoginRequest,
    MindError, ProgressResponse, PurchaseReceipt, PurchaseRequest, RecoveryRequest,
    RegisterRequest, ResetPasswordRequest, StoreItemView, SupportRequest, UpdateProfileRequest,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, warn};

type AppStateArc = Arc<AppState>;

/// Handler error: a [`MindError`] rendered as `{"error": {kind, message}}`
#[derive(Debug)]
pub struct ApiError(pub MindError);

impl From<MindError> for ApiError {
    fn from(err: MindError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &MindError) -> StatusCode {
    match err {
        MindError::NotFound(_) => StatusCode::NOT_FOUND,
        MindError::InvalidItem(_) | MindError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        MindError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        MindError::EnergyFull => StatusCode::UNPROCESSABLE_ENTITY,
        MindError::Conflict(_) => StatusCode::CONFLICT,
        MindError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        MindError::InvalidCredentials => StatusCode::UNAUTHORIZED,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("  {}", self.0);
        } else {
            warn!("  {} ({})", self.0, self.0.kind());
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.0.kind().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(MindError::InvalidRequest(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(MindError::InvalidRequest(rejection.body_text()))
    }
}

/// [`Json`] whose rejections use the error envelope
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// [`Path`] whose rejections use the error envelope
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Progress Routes
// ============================================================================

pub fn progress_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/progress", post(submit_completion))
        .route("/v1/progress/:learner_id/:course", get(get_progress))
}

async fn get_progress(
    State(state): State<AppStateArc>,
    ApiPath((learner_id, course)): ApiPath<(i64, String)>,
) -> ApiResult<ProgressResponse> {
    Ok(Json(state.service.progress(learner_id, course).await?))
}

async fn submit_completion(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<CompletionRequest>,
) -> ApiResult<CompletionOutcome> {
    Ok(Json(state.service.submit_completion(req).await?))
}

// ============================================================================
// Energy Routes
// ============================================================================

pub fn energy_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/learners/:learner_id/energy", post(adjust_energy))
}

async fn adjust_energy(
    State(state): State<AppStateArc>,
    ApiPath(learner_id): ApiPath<i64>,
    ApiJson(req): ApiJson<EnergyAdjustRequest>,
) -> ApiResult<EnergyResponse> {
    Ok(Json(state.service.adjust_energy(learner_id, req.delta).await?))
}

// ============================================================================
// Store Routes
// ============================================================================

pub fn store_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/store/items", get(list_items))
        .route("/v1/store/purchase", post(purchase))
}

async fn list_items(State(state): State<AppStateArc>) -> Json<Vec<StoreItemView>> {
    Json(state.service.store_items())
}

async fn purchase(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<PurchaseRequest>,
) -> ApiResult<PurchaseReceipt> {
    Ok(Json(state.service.purchase(req.learner_id, req.item).await?))
}

// ============================================================================
// Learner Routes
// ============================================================================

pub fn learner_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/learners/:learner_id", get(get_profile).put(update_profile))
        .route("/v1/learners/:learner_id/badges", get(get_badges))
}

async fn get_profile(
    State(state): State<AppStateArc>,
    ApiPath(learner_id): ApiPath<i64>,
) -> ApiResult<LearnerProfile> {
    Ok(Json(state.service.profile(learner_id).await?))
}

async fn update_profile(
    State(state): State<AppStateArc>,
    ApiPath(learner_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<LearnerProfile> {
    Ok(Json(state.service.update_profile(learner_id, req).await?))
}

async fn get_badges(
    State(state): State<AppStateArc>,
    ApiPath(learner_id): ApiPath<i64>,
) -> ApiResult<Vec<BadgeView>> {
    Ok(Json(state.service.badges(learner_id).await?))
}

// ============================================================================
// Lesson Routes
// ============================================================================

pub fn lesson_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/lessons/:course/:level", get(get_lesson))
}

async fn get_lesson(
    State(state): State<AppStateArc>,
    ApiPath((course, level)): ApiPath<(String, u32)>,
) -> ApiResult<Lesson> {
    Ok(Json(state.service.lesson(course, level).await?))
}

// ============================================================================
// Account Routes
// ============================================================================

pub fn account_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/accounts/register", post(register))
        .route("/v1/accounts/verify", post(verify))
        .route("/v1/accounts/login", post(login))
        .route("/v1/accounts/recovery", post(request_recovery))
        .route("/v1/accounts/recovery/validate", post(validate_recovery))
        .route("/v1/accounts/recovery/reset", post(reset_password))
}

async fn register(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let ack = state.service.register(req).await?;
    Ok((StatusCode::CREATED, Json(ack)))
}

async fn verify(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<CodeRequest>,
) -> ApiResult<Ack> {
    Ok(Json(state.service.verify(req).await?))
}

async fn login(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<LearnerProfile> {
    Ok(Json(state.service.login(req).await?))
}

async fn request_recovery(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<RecoveryRequest>,
) -> ApiResult<Ack> {
    Ok(Json(state.service.request_recovery(req).await?))
}

async fn validate_recovery(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<CodeRequest>,
) -> ApiResult<Ack> {
    Ok(Json(state.service.validate_recovery(req).await?))
}

async fn reset_password(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Ack> {
    Ok(Json(state.service.reset_password(req).await?))
}

// ============================================================================
// Support Routes
// ============================================================================

pub fn support_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/support", post(contact_support))
}

async fn contact_support(
    State(state): State<AppStateArc>,
    ApiJson(req): ApiJson<SupportRequest>,
) -> ApiResult<Ack> {
    Ok(Json(state.service.contact_support(req).await?))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
