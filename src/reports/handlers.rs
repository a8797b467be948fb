use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::extractors::{AdminUser, CurrentUser},
    error::ApiResult,
    extract::{Json, Path, Query},
    reports::{
        dto::{
            ApproveReportRequest, CreateReportRequest, EstimateResponse, GetEstimateRequest,
            ReportDto,
        },
        repo_types::{EstimateQuery, NewReport},
    },
    state::AppState,
};

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(get_estimate).post(create_report))
        .route("/reports/:id", patch(approve_report))
}

#[instrument(skip(state))]
pub async fn get_estimate(
    State(state): State<AppState>,
    Query(q): Query<GetEstimateRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    let query = EstimateQuery::try_from(q)?;
    let price = state.reports_service().create_estimate(&query).await?;
    Ok(Json(EstimateResponse { price }))
}

#[instrument(skip(state, user, body))]
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<ReportDto>)> {
    let report = NewReport::try_from(body)?;
    let created = state.reports_service().create(report, &user).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(state, admin, body))]
pub async fn approve_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<ApproveReportRequest>,
) -> ApiResult<Json<ReportDto>> {
    debug!(admin_id = admin.id, report_id = id, approved = body.approved, "approval requested");
    let report = state
        .reports_service()
        .change_approval(id, body.approved)
        .await?;
    Ok(Json(report.into()))
}
