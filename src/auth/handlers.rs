use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, CredentialsRequest, EmailQuery, PublicUser, RefreshRequest,
            UpdateUserRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        repo_types::User,
    },
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/refresh", post(refresh))
        .route("/auth/whoami", get(whoami))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(find_users))
        .route(
            "/auth/:id",
            get(find_user).patch(update_user).delete(remove_user),
        )
}

fn issue_tokens(keys: &JwtKeys, user: User) -> ApiResult<AuthResponse> {
    let pair = keys.sign_pair(user.id)?;
    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    })
}

fn ensure_self_or_admin(current: &User, target_id: i64) -> ApiResult<()> {
    if current.id != target_id && !current.admin {
        warn!(user_id = current.id, target_id, "attempt to modify another user");
        return Err(ApiError::Forbidden("Cannot modify another user".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let payload = payload.normalize()?;

    let user = state
        .auth_service()
        .signup(&payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state.jwt, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let payload = payload.normalize()?;

    let user = state
        .auth_service()
        .signin(&payload.email, &payload.password)
        .await?;

    Ok(Json(issue_tokens(&state.jwt, user)?))
}

#[instrument(skip(state, keys, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = state
        .users_service()
        .find_one(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    info!(user_id = user.id, "tokens refreshed");
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip_all)]
pub async fn whoami(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip(state))]
pub async fn find_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PublicUser>> {
    let user = state
        .users_service()
        .find_one(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn find_users(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let email = q.email.trim().to_lowercase();
    let users = state.users_service().find(&email).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, current, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<PublicUser>> {
    ensure_self_or_admin(&current, id)?;
    let payload = payload.normalize()?;

    let user = state
        .users_service()
        .update(id, payload.email, payload.password)
        .await?;
    info!(user_id = user.id, by = current.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, current))]
pub async fn remove_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PublicUser>> {
    ensure_self_or_admin(&current, id)?;
    let user = state.users_service().remove(id).await?;
    Ok(Json(user.into()))
}
