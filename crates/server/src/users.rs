//! Users API endpoints

use api_types::user::{LoginRequest, LoginResponse, UserNew, UserView};
use axum::{Json, extract::State, http::StatusCode};
use ledger::{CreateUserParams, LedgerError, LedgerStore};

use crate::{ServerError, server::ServerState, views::user_view};

fn validate(payload: &UserNew) -> Result<(), ServerError> {
    if payload.username.is_empty()
        || !payload
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ServerError::Generic(
            "username must contain only letters, digits or underscore".to_string(),
        ));
    }
    if payload.password.chars().count() < 6 {
        return Err(ServerError::Generic(
            "password must be at least 6 characters".to_string(),
        ));
    }
    if payload.full_name.trim().is_empty() {
        return Err(ServerError::Generic("full_name is required".to_string()));
    }
    match payload.email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ServerError::Generic("email is not valid".to_string())),
    }
}

/// Handle requests for creating a new user
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    validate(&payload)?;

    let hashed_password = token::hash_password(&payload.password)?;
    let user = state
        .store
        .queries()
        .create_user(CreateUserParams {
            username: payload.username,
            hashed_password,
            full_name: payload.full_name,
            email: payload.email,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user_view(user))))
}

/// Handle login requests, returning a fresh access token
pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let user = match state.store.queries().get_user(&payload.username).await {
        Ok(user) => user,
        Err(LedgerError::NotFound(_)) => {
            return Err(ServerError::Unauthorized(
                "wrong username or password".to_string(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    if !token::verify_password(&payload.password, &user.hashed_password) {
        return Err(ServerError::Unauthorized(
            "wrong username or password".to_string(),
        ));
    }

    let (access_token, token_payload) = state
        .token_maker
        .create_token(&user.username, state.config.access_token_duration)?;

    Ok(Json(LoginResponse {
        access_token,
        access_token_expires_at: token_payload.expired_at(),
        user: user_view(user),
    }))
}
