use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::ApiResult,
    state::AppState,
    users::{
        dto::{LoginPayload, PublicUser, TokenResponse, UserPayload},
        extractors::AuthUser,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create/", post(create_user))
        .route("/token/", post(create_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me/", get(get_me).put(put_me).patch(patch_me))
}

/// POST create/
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let Json(payload) = payload?;
    let new = services::validate_new_user(state.users.as_ref(), payload, None).await?;
    let user = services::create_user(state.users.as_ref(), new).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST token/
#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let user = services::login(state.users.as_ref(), payload).await?;
    let token = services::obtain_token(state.tokens.as_ref(), &user).await?;
    Ok(Json(TokenResponse { token: token.key }))
}

/// GET me/
#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

/// PUT me/: every field required.
#[instrument(skip_all)]
pub async fn put_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Json<PublicUser>> {
    let Json(payload) = payload?;
    let changes = services::validate_new_user(state.users.as_ref(), payload, Some(user.id))
        .await?
        .into();
    let user = services::update_user(state.users.as_ref(), user, changes).await?;
    Ok(Json(user.into()))
}

/// PATCH me/: only the fields present are touched.
#[instrument(skip_all)]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Json<PublicUser>> {
    let Json(payload) = payload?;
    let changes = services::validate_user_changes(state.users.as_ref(), payload, user.id).await?;
    let user = services::update_user(state.users.as_ref(), user, changes).await?;
    Ok(Json(user.into()))
}
