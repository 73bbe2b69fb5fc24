use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

/// Roles the service knows how to grant.
pub const KNOWN_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_USER];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("claims expire at or before they are issued")]
    NotAfterIssue,
}

/// Verified identity of the caller. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawClaims")]
pub struct Claims {
    sub: Uuid,
    roles: BTreeSet<String>,
    iss: String,
    #[serde(with = "time::serde::timestamp")]
    iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    exp: OffsetDateTime,
}

// wire form, checked before it becomes `Claims`
#[derive(Deserialize)]
struct RawClaims {
    sub: Uuid,
    #[serde(default)]
    roles: BTreeSet<String>,
    iss: String,
    #[serde(with = "time::serde::timestamp")]
    iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    exp: OffsetDateTime,
}

impl TryFrom<RawClaims> for Claims {
    type Error = ClaimsError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        Claims::new(raw.sub, raw.roles, raw.iss, raw.iat, raw.exp)
    }
}

fn whole_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}

impl Claims {
    /// Timestamps are truncated to whole seconds, the precision a token carries.
    pub fn new<R, S>(
        subject: Uuid,
        roles: R,
        issuer: impl Into<String>,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<Self, ClaimsError>
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let iat = whole_seconds(issued_at);
        let exp = whole_seconds(expires_at);
        if exp <= iat {
            return Err(ClaimsError::NotAfterIssue);
        }
        Ok(Self {
            sub: subject,
            roles: roles.into_iter().map(Into::into).collect(),
            iss: issuer.into(),
            iat,
            exp,
        })
    }

    pub fn subject(&self) -> Uuid {
        self.sub
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn issuer(&self) -> &str {
        &self.iss
    }

    pub fn issued_at(&self) -> OffsetDateTime {
        self.iat
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.exp
    }
}

/// Issuer and lifetime stamped on claims produced by authentication.
#[derive(Debug, Clone)]
pub struct ClaimsPolicy {
    pub issuer: String,
    pub ttl: Duration,
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        Self {
            issuer: "sales-api".into(),
            ttl: Duration::hours(1),
        }
    }
}

impl ClaimsPolicy {
    pub fn issue(
        &self,
        subject: Uuid,
        roles: &[String],
        now: OffsetDateTime,
    ) -> Result<Claims, ClaimsError> {
        Claims::new(subject, roles.iter().cloned(), self.issuer.clone(), now, now + self.ttl)
    }
}
