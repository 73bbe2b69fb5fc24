use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::model::{NewUser, UpdateUser, User};
use super::store;
use crate::{
    auth::{authorize::require_role, claims::ROLE_ADMIN, jwt::Authenticated},
    error::Result,
    state::AppState,
    validate::Pagination,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(query).post(create))
        .route("/users/:id", get(query_by_id).put(update).delete(delete))
}

#[instrument(skip(state, claims))]
pub async fn query(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<User>>> {
    require_role(&claims, &[ROLE_ADMIN])?;
    let users = store::query(&mut state.transactor(), p.page, p.rows).await?;
    Ok(Json(users))
}

#[instrument(skip(state, claims))]
pub async fn query_by_id(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let user = store::query_by_id(&mut state.transactor(), &claims, &id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, claims, nu))]
pub async fn create(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Json(nu): Json<NewUser>,
) -> Result<impl IntoResponse> {
    require_role(&claims, &[ROLE_ADMIN])?;
    let user = store::create(&mut state.transactor(), nu, OffsetDateTime::now_utc()).await?;
    let location = format!("/v1/users/{}", user.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

#[instrument(skip(state, claims, uu))]
pub async fn update(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    Json(uu): Json<UpdateUser>,
) -> Result<StatusCode> {
    require_role(&claims, &[ROLE_ADMIN])?;
    store::update(&mut state.transactor(), &claims, &id, uu, OffsetDateTime::now_utc()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, claims))]
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    require_role(&claims, &[ROLE_ADMIN])?;
    store::delete(&mut state.transactor(), &claims, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
