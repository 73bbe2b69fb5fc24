use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use super::jwt::JwtKeys;
use crate::{state::AppState, users::store};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/token", post(token))
}

/// Exchanges an email/password pair for a signed token.
#[instrument(skip(state, payload))]
pub async fn token(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, Response> {
    let email = payload.email.trim();
    let keys = JwtKeys::from_ref(&state);

    let claims = store::authenticate(
        &mut state.transactor(),
        &keys.policy(),
        OffsetDateTime::now_utc(),
        email,
        &payload.password,
    )
    .await
    .map_err(|e| {
        warn!(%email, error = %e, "token request rejected");
        e.into_response()
    })?;

    let token = keys.sign(&claims).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    })?;

    info!(user_id = %claims.subject(), "token issued");
    Ok(Json(TokenResponse { token }))
}
