//! In-memory [`Database`] for tests.
//!
//! A transaction works on a private copy of the committed tables and commit
//! publishes the copy wholesale, so concurrent transactions overwrite each
//! other. Tests drive it sequentially.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Database, Handle, Transactor};
use crate::products::{model::Product, repo::ProductRepo};
use crate::users::{model::User, repo::UserRepo};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    users: BTreeMap<Uuid, User>,
    products: BTreeMap<Uuid, Product>,
}

#[derive(Debug)]
pub struct MemoryTx {
    staged: Tables,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    committed: Arc<Mutex<Tables>>,
    begins: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
    fail_rollbacks: Arc<AtomicBool>,
}

impl MemoryDb {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn fail_rollbacks(&self, fail: bool) {
        self.fail_rollbacks.store(fail, Ordering::SeqCst);
    }
}

fn with_tables<R>(tr: &mut Transactor<MemoryDb>, f: impl FnOnce(&mut Tables) -> R) -> R {
    match &mut tr.handle {
        Handle::Bound { tx, .. } => f(&mut tx.staged),
        Handle::Root => f(&mut tr.db.committed.lock().expect("memory tables poisoned")),
    }
}

fn violation(msg: String) -> sqlx::Error {
    sqlx::Error::Protocol(msg)
}

#[async_trait]
impl Database for MemoryDb {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let staged = self.committed.lock().expect("memory tables poisoned").clone();
        Ok(MemoryTx { staged })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), sqlx::Error> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        *self.committed.lock().expect("memory tables poisoned") = tx.staged;
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<(), sqlx::Error> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rollbacks.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed);
        }
        Ok(())
    }
}

fn email_taken(tables: &Tables, email: &str, except: Uuid) -> bool {
    tables
        .users
        .values()
        .any(|u| u.id != except && u.email == email)
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserRepo for MemoryDb {
    async fn insert_user(tr: &mut Transactor<Self>, user: &User) -> Result<(), sqlx::Error> {
        with_tables(tr, |t| {
            if t.users.contains_key(&user.id) {
                return Err(violation(format!("duplicate user id {}", user.id)));
            }
            if email_taken(t, &user.email, user.id) {
                return Err(violation("duplicate user email".into()));
            }
            t.users.insert(user.id, user.clone());
            Ok(())
        })
    }

    async fn update_user(tr: &mut Transactor<Self>, user: &User) -> Result<u64, sqlx::Error> {
        with_tables(tr, |t| {
            if email_taken(t, &user.email, user.id) {
                return Err(violation("duplicate user email".into()));
            }
            match t.users.get_mut(&user.id) {
                Some(row) => {
                    *row = user.clone();
                    Ok(1)
                }
                None => Ok(0),
            }
        })
    }

    async fn delete_user(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error> {
        with_tables(tr, |t| {
            let removed = t.users.remove(&id).map_or(0, |_| 1);
            t.products.retain(|_, p| p.user_id != id);
            Ok(removed)
        })
    }

    async fn list_users(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        with_tables(tr, |t| Ok(page(t.users.values().cloned(), offset, limit)))
    }

    async fn user_by_id(tr: &mut Transactor<Self>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        with_tables(tr, |t| Ok(t.users.get(&id).cloned()))
    }

    async fn user_by_email(
        tr: &mut Transactor<Self>,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        with_tables(tr, |t| Ok(t.users.values().find(|u| u.email == email).cloned()))
    }
}

#[async_trait]
impl ProductRepo for MemoryDb {
    async fn insert_product(tr: &mut Transactor<Self>, product: &Product) -> Result<(), sqlx::Error> {
        with_tables(tr, |t| {
            if t.products.contains_key(&product.id) {
                return Err(violation(format!("duplicate product id {}", product.id)));
            }
            t.products.insert(product.id, product.clone());
            Ok(())
        })
    }

    async fn update_product(tr: &mut Transactor<Self>, product: &Product) -> Result<u64, sqlx::Error> {
        with_tables(tr, |t| match t.products.get_mut(&product.id) {
            Some(row) => {
                // the owner column is never rewritten
                let user_id = row.user_id;
                *row = product.clone();
                row.user_id = user_id;
                Ok(1)
            }
            None => Ok(0),
        })
    }

    async fn delete_product(tr: &mut Transactor<Self>, id: Uuid) -> Result<u64, sqlx::Error> {
        with_tables(tr, |t| Ok(t.products.remove(&id).map_or(0, |_| 1)))
    }

    async fn list_products(
        tr: &mut Transactor<Self>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error> {
        with_tables(tr, |t| Ok(page(t.products.values().cloned(), offset, limit)))
    }

    async fn product_by_id(
        tr: &mut Transactor<Self>,
        id: Uuid,
    ) -> Result<Option<Product>, sqlx::Error> {
        with_tables(tr, |t| Ok(t.products.get(&id).cloned()))
    }

    async fn products_by_owner(
        tr: &mut Transactor<Self>,
        user_id: Uuid,
    ) -> Result<Vec<Product>, sqlx::Error> {
        with_tables(tr, |t| {
            Ok(t.products
                .values()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect())
        })
    }
}
