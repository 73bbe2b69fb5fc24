use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::model::{NewProduct, Product, UpdateProduct};
use super::store;
use crate::{auth::jwt::Authenticated, error::Result, state::AppState, validate::Pagination};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(query).post(create))
        .route("/products/:id", get(query_by_id).put(update).delete(delete))
        .route("/users/:id/products", get(query_by_owner))
}

#[instrument(skip(state, _claims))]
pub async fn query(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Product>>> {
    let products = store::query(&mut state.transactor(), p.page, p.rows).await?;
    Ok(Json(products))
}

#[instrument(skip(state, _claims))]
pub async fn query_by_id(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let product = store::query_by_id(&mut state.transactor(), &id).await?;
    Ok(Json(product))
}

#[instrument(skip(state, _claims))]
pub async fn query_by_owner(
    State(state): State<AppState>,
    Authenticated(_claims): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let products = store::query_by_owner(&mut state.transactor(), &id).await?;
    Ok(Json(products))
}

#[instrument(skip(state, claims, np))]
pub async fn create(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Json(np): Json<NewProduct>,
) -> Result<impl IntoResponse> {
    let product =
        store::create(&mut state.transactor(), &claims, np, OffsetDateTime::now_utc()).await?;
    let location = format!("/v1/products/{}", product.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(product)))
}

#[instrument(skip(state, claims, up))]
pub async fn update(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    Json(up): Json<UpdateProduct>,
) -> Result<StatusCode> {
    store::update(&mut state.transactor(), &claims, &id, up, OffsetDateTime::now_utc()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, claims))]
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    store::delete(&mut state.transactor(), &claims, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
