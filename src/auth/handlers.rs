use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            SignInRequest, SignInResponse, SignUpRequest, SignUpResponse, UserResponse,
            UsersResponse,
        },
        extractors::AuthUser,
        services,
    },
    error::AppError,
    state::AppState,
};

/// A body that is absent, not JSON or of the wrong shape counts as empty,
/// so the service answers with its own missing-fields error.
fn body_or_empty<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable request body");
            T::default()
        }
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signin", post(sign_in))
        .route("/signup", post(sign_up))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<SignInResponse>, AppError> {
    let token = services::sign_in(&state, body_or_empty(payload)).await?;
    Ok(Json(SignInResponse {
        message: "Sign in successfully!",
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignUpResponse>), AppError> {
    let user = services::sign_up(&state, body_or_empty(payload)).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            message: "Sign up successfully!",
            result: user,
        }),
    ))
}

#[instrument(skip(state, caller), fields(caller = %caller.0.sub))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<UsersResponse>, AppError> {
    let users = services::list_users(&state).await?;
    Ok(Json(UsersResponse {
        message: "Users fetched successfully",
        users,
    }))
}

#[instrument(skip(state, caller), fields(caller = %caller.0.sub))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::get_user(&state, &id).await?;
    Ok(Json(UserResponse {
        message: "User fetched successfully",
        user,
    }))
}
