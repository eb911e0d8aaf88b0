use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest, PublicUser},
        extractors::AuthUser,
        password::{hash_password, verify_password, DUMMY_HASH},
        repo_types::{CreateUserError, User},
    },
    error::{ApiError, ApiJson},
    state::AppState,
    validation::{is_valid_email, Validator},
};

const MIN_PASSWORD_LEN: usize = 6;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
}

fn validate_credentials(payload: &CredentialsRequest) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.check(is_valid_email(&payload.email), "email", "Invalid email")
        .check(
            payload.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "Password must be at least 6 characters",
        );
    v.finish()
}

fn auth_response(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let token = state
        .keys
        .issue(user.id, &user.email)
        .map_err(|e| state.internal(e))?;
    Ok(AuthResponse {
        token,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if let Err(e) = validate_credentials(&payload) {
        warn!(email = %payload.email, "signup rejected: invalid input");
        return Err(e);
    }

    let existing = state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(|e| state.internal(e))?;
    if existing.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::DuplicateUser);
    }

    let hash = hash_password(&payload.password).map_err(|e| state.internal(e))?;

    let user = match state.users.create(&payload.email, &hash).await {
        Ok(u) => u,
        Err(CreateUserError::EmailTaken) => {
            warn!(email = %payload.email, "email registered concurrently");
            return Err(ApiError::DuplicateUser);
        }
        Err(CreateUserError::Other(e)) => return Err(state.internal(e)),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    let body = auth_response(&state, user)?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_credentials(&payload)?;

    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            let _ = verify_password(&payload.password, DUMMY_HASH);
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => return Err(state.internal(e)),
    };

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| state.internal(e))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(auth_response(&state, user)?))
}

#[instrument(skip(state, identity))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await
        .map_err(|e| state.internal(e))?
        .ok_or_else(|| {
            warn!(user_id = %identity.user_id, "token for unknown user");
            ApiError::InvalidToken
        })?;

    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}
