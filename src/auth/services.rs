use anyhow::Context;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenIdentity,
        dto::{SignInRequest, SignUpRequest},
        jwt::JwtKeys,
        password::hash_password,
        repo::StoreError,
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
};

/// Absent and empty strings are both "missing".
fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

async fn hash_off_thread(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task")
        .map_err(AppError::Internal)??;
    Ok(hash)
}

#[instrument(skip(state, input))]
pub async fn sign_up(state: &AppState, input: SignUpRequest) -> Result<User, AppError> {
    let (Some(username), Some(email), Some(password)) = (
        present(input.username),
        present(input.email),
        present(input.password),
    ) else {
        warn!("sign-up with missing fields");
        return Err(AppError::MissingFields("Required fields are missing!"));
    };

    if state.store.find_by_email(&email).await?.is_some() {
        debug!(email = %email, "email already registered");
        warn!("sign-up for a registered email");
        return Err(AppError::EmailTaken);
    }

    let password_hash = hash_off_thread(password).await?;

    let candidate = NewUser {
        username,
        email,
        password_hash,
        phone_number: input.phone_number,
        age: input.age,
    };
    // Lost the race between lookup and insert: the store's constraint decides.
    let user = state.store.insert(candidate).await.map_err(|e| match e {
        StoreError::DuplicateKey => AppError::EmailTaken,
        other => other.into(),
    })?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Returns the wire token, already prefixed with `Bearer `.
#[instrument(skip(state, input))]
pub async fn sign_in(state: &AppState, input: SignInRequest) -> Result<String, AppError> {
    let (Some(email), Some(username)) = (present(input.email), present(input.username)) else {
        warn!("sign-in with missing fields");
        return Err(AppError::MissingFields("Email or username is missing!"));
    };

    debug!(email = %email, "checking user");
    let Some(user) = state.store.find_by_email(&email).await? else {
        debug!(email = %email, "no user for email");
        warn!("sign-in unknown email");
        return Err(AppError::UserNotFound);
    };

    if user.username != username {
        warn!(user_id = %user.id, "sign-in username mismatch");
        return Err(AppError::InvalidUsername);
    }

    let keys = JwtKeys::from(&state.config.jwt);
    let identity = TokenIdentity {
        username: user.username.clone(),
        email: user.email.clone(),
    };
    let token = keys.issue(&identity, user.id).map_err(AppError::Internal)?;

    info!(user_id = %user.id, "user signed in");
    Ok(format!("Bearer {token}"))
}

#[instrument(skip(state))]
pub async fn list_users(state: &AppState) -> Result<Vec<User>, AppError> {
    let users = state.store.list_all().await?;
    if users.is_empty() {
        return Err(AppError::NoUsers);
    }
    Ok(users)
}

/// Ids that are not UUIDs cannot name a stored record.
#[instrument(skip(state))]
pub async fn get_user(state: &AppState, id: &str) -> Result<User, AppError> {
    let Ok(id) = Uuid::parse_str(id) else {
        return Err(AppError::UserNotFound);
    };
    state
        .store
        .find_by_id(id)
        .await?
        .ok_or(AppError::UserNotFound)
}
