use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::User;
use crate::db::{postgres::pg_run, Database, Transactor};

/// Statements the user store issues. Every call runs against whatever the
/// transactor currently holds: the pool, or an open transaction.
#[async_trait]
pub trait UserRepo: Database {
    async fn insert_user(tr: &mut Transactor<Self>, user: &User) -> Result<(), sqlx::Error>;

    /// Full-row update keyed by `user.id`; returns rows affected.
    async fn update_user(tr: &mut Transactor<Self>, user: &User) -> Result<u64, sqlx::Error>;

    async fn delete_user(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error>;

    /// Users ordered by id.
    async fn list_users(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn user_by_id(tr: &mut Transactor<Self>, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn user_by_email(
        tr: &mut Transactor<Self>,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl UserRepo for PgPool {
    async fn insert_user(tr: &mut Transactor<Self>, user: &User) -> Result<(), sqlx::Error> {
        let query = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, roles, date_created, date_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.date_created)
        .bind(user.date_updated);
        pg_run!(tr, query, execute)?;
        Ok(())
    }

    async fn update_user(tr: &mut Transactor<Self>, user: &User) -> Result<u64, sqlx::Error> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, roles = $5, date_updated = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.date_updated);
        Ok(pg_run!(tr, query, execute)?.rows_affected())
    }

    async fn delete_user(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error> {
        let query = sqlx::query("DELETE FROM users WHERE id = $1").bind(id);
        Ok(pg_run!(tr, query, execute)?.rows_affected())
    }

    async fn list_users(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, roles, date_created, date_updated
            FROM users
            ORDER BY id
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit);
        pg_run!(tr, query, fetch_all)
    }

    async fn user_by_id(tr: &mut Transactor<Self>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, roles, date_created, date_updated
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id);
        pg_run!(tr, query, fetch_optional)
    }

    async fn user_by_email(
        tr: &mut Transactor<Self>,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, roles, date_created, date_updated
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email);
        pg_run!(tr, query, fetch_optional)
    }
}
