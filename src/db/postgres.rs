use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::{Database, Handle, Transactor};

#[async_trait]
impl Database for PgPool {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.commit().await
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.rollback().await
    }
}

/// Executor behind a Postgres transactor.
pub enum PgHandle<'a> {
    Pool(&'a PgPool),
    Conn(&'a mut PgConnection),
}

impl Transactor<PgPool> {
    pub fn handle(&mut self) -> PgHandle<'_> {
        match &mut self.handle {
            Handle::Root => PgHandle::Pool(&self.db),
            Handle::Bound { tx, .. } => PgHandle::Conn(&mut **tx),
        }
    }
}

/// Runs a query builder against whatever a Postgres transactor currently holds.
///
/// `pg_run!(tr, sqlx::query(..).bind(..), execute)`
macro_rules! pg_run {
    ($tr:expr, $query:expr, $exec:ident) => {
        match $tr.handle() {
            $crate::db::postgres::PgHandle::Pool(pool) => $query.$exec(pool).await,
            $crate::db::postgres::PgHandle::Conn(conn) => $query.$exec(conn).await,
        }
    };
}

pub(crate) use pg_run;
