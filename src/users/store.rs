//! User store: create, update, delete and lookups, plus credential
//! authentication.

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::model::{NewUser, UpdateUser, User};
use super::repo::UserRepo;
use crate::auth::authorize::{authorized, require_access};
use crate::auth::claims::{Claims, ClaimsPolicy, ROLE_ADMIN};
use crate::auth::password::{hash_password, verify_password};
use crate::db::Transactor;
use crate::error::{Error, Result};
use crate::validate::{page_window, parse_id};

const ENTITY: &str = "user";

#[instrument(skip(tr, nu), fields(email = %nu.email))]
pub async fn create<D: UserRepo>(
    tr: &mut Transactor<D>,
    nu: NewUser,
    now: OffsetDateTime,
) -> Result<User> {
    nu.validate()?;
    let password_hash = hash_password(&nu.password)?;

    let user = User {
        id: Uuid::new_v4(),
        name: nu.name,
        email: nu.email,
        password_hash,
        roles: nu.roles,
        date_created: now,
        date_updated: now,
    };

    let row = user.clone();
    tr.within_transaction(move |tx| {
        Box::pin(async move {
            D::insert_user(tx, &row)
                .await
                .map_err(|e| Error::persistence("insert user", e))
        })
    })
    .await?;

    info!(user_id = %user.id, "user created");
    Ok(user)
}

#[instrument(skip(tr, claims, uu))]
pub async fn update<D: UserRepo>(
    tr: &mut Transactor<D>,
    claims: &Claims,
    id: &str,
    uu: UpdateUser,
    now: OffsetDateTime,
) -> Result<()> {
    let id = parse_id(id)?;
    uu.validate()?;

    let mut user = fetch(tr, id).await?;
    require_access(claims, user.id)?;

    if let Some(name) = uu.name {
        user.name = name;
    }
    if let Some(email) = uu.email {
        user.email = email;
    }
    if let Some(roles) = uu.roles {
        user.roles = roles;
    }
    if let Some(password) = uu.password {
        user.password_hash = hash_password(&password)?;
    }
    user.date_updated = now;

    tr.within_transaction(move |tx| {
        Box::pin(async move {
            let affected = D::update_user(tx, &user)
                .await
                .map_err(|e| Error::persistence("update user", e))?;
            if affected == 0 {
                return Err(Error::not_found(ENTITY, user.id));
            }
            Ok(())
        })
    })
    .await
}

/// An ADMIN may delete any id, present or not. Anyone else may delete only
/// their own record, which has to exist.
#[instrument(skip(tr, claims))]
pub async fn delete<D: UserRepo>(tr: &mut Transactor<D>, claims: &Claims, id: &str) -> Result<()> {
    let id = parse_id(id)?;

    let admin = authorized(claims, &[ROLE_ADMIN]);
    if !admin {
        if claims.subject() != id {
            warn!(user_id = %id, "delete of another user refused");
            return Err(Error::Forbidden);
        }
        fetch(tr, id).await?;
    }

    tr.within_transaction(move |tx| {
        Box::pin(async move {
            D::delete_user(tx, id)
                .await
                .map_err(|e| Error::persistence("delete user", e))?;
            Ok(())
        })
    })
    .await
}

/// One page of users ordered by id. Role gating is the router's job.
#[instrument(skip(tr))]
pub async fn query<D: UserRepo>(tr: &mut Transactor<D>, page: i64, rows: i64) -> Result<Vec<User>> {
    let (offset, limit) = page_window(page, rows)?;
    D::list_users(tr, offset, limit)
        .await
        .map_err(|e| Error::persistence("list users", e))
}

/// Existence is checked before access, so a missing id reads as `NotFound`
/// for every caller.
#[instrument(skip(tr, claims))]
pub async fn query_by_id<D: UserRepo>(
    tr: &mut Transactor<D>,
    claims: &Claims,
    id: &str,
) -> Result<User> {
    let id = parse_id(id)?;
    let user = fetch(tr, id).await?;
    require_access(claims, user.id)?;
    Ok(user)
}

#[instrument(skip(tr, claims))]
pub async fn query_by_email<D: UserRepo>(
    tr: &mut Transactor<D>,
    claims: &Claims,
    email: &str,
) -> Result<User> {
    let user = D::user_by_email(tr, email)
        .await
        .map_err(|e| Error::persistence("select user by email", e))?
        .ok_or_else(|| Error::not_found(ENTITY, email))?;
    require_access(claims, user.id)?;
    Ok(user)
}

/// Checks an email/password pair and, on success, issues claims for the user.
/// An unknown email and a wrong password fail the same way.
#[instrument(skip(tr, policy, password))]
pub async fn authenticate<D: UserRepo>(
    tr: &mut Transactor<D>,
    policy: &ClaimsPolicy,
    now: OffsetDateTime,
    email: &str,
    password: &str,
) -> Result<Claims> {
    let user = D::user_by_email(tr, email)
        .await
        .map_err(|e| Error::persistence("select user by email", e))?
        .ok_or(Error::AuthenticationFailure)?;

    verify_password(password, &user.password_hash)?;

    policy.issue(user.id, &user.roles, now).map_err(|e| {
        warn!(error = %e, "claims policy produced no valid lifetime");
        Error::AuthenticationFailure
    })
}

async fn fetch<D: UserRepo>(tr: &mut Transactor<D>, id: Uuid) -> Result<User> {
    D::user_by_id(tr, id)
        .await
        .map_err(|e| Error::persistence("select user", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id))
}
