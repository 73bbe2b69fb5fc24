use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::Product;
use crate::db::{postgres::pg_run, Database, Transactor};

#[async_trait]
pub trait ProductRepo: Database {
    async fn insert_product(tr: &mut Transactor<Self>, product: &Product) -> Result<(), sqlx::Error>;

    /// Rewrites name, cost, quantity and `date_updated`. The owner column is
    /// left alone. Returns rows affected.
    async fn update_product(tr: &mut Transactor<Self>, product: &Product) -> Result<u64, sqlx::Error>;

    async fn delete_product(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error>;

    async fn list_products(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error>;

    async fn product_by_id(
        tr: &mut Transactor<Self>,
        id: Uuid,
    ) -> Result<Option<Product>, sqlx::Error>;

    async fn products_by_owner(
        tr: &mut Transactor<Self>,
        user_id: Uuid,
    ) -> Result<Vec<Product>, sqlx::Error>;
}

#[async_trait]
impl ProductRepo for PgPool {
    async fn insert_product(tr: &mut Transactor<Self>, product: &Product) -> Result<(), sqlx::Error> {
        let query = sqlx::query(
            r#"
            INSERT INTO products (id, name, cost, quantity, user_id, date_created, date_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.cost)
        .bind(product.quantity)
        .bind(product.user_id)
        .bind(product.date_created)
        .bind(product.date_updated);
        pg_run!(tr, query, execute)?;
        Ok(())
    }

    async fn update_product(tr: &mut Transactor<Self>, product: &Product) -> Result<u64, sqlx::Error> {
        let query = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, cost = $3, quantity = $4, date_updated = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.cost)
        .bind(product.quantity)
        .bind(product.date_updated);
        Ok(pg_run!(tr, query, execute)?.rows_affected())
    }

    async fn delete_product(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error> {
        let query = sqlx::query("DELETE FROM products WHERE id = $1").bind(id);
        Ok(pg_run!(tr, query, execute)?.rows_affected())
    }

    async fn list_products(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let query = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, cost, quantity, user_id, date_created, date_updated
            FROM products
            ORDER BY id
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit);
        pg_run!(tr, query, fetch_all)
    }

    async fn product_by_id(
        tr: &mut Transactor<Self>,
        id: Uuid,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, cost, quantity, user_id, date_created, date_updated
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id);
        pg_run!(tr, query, fetch_optional)
    }

    async fn products_by_owner(
        tr: &mut Transactor<Self>,
        user_id: Uuid,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let query = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, cost, quantity, user_id, date_created, date_updated
            FROM products
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id);
        pg_run!(tr, query, fetch_all)
    }
}
