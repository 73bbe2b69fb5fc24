use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::KNOWN_ROLES;
use crate::error::{FieldErrors, Result};
use crate::validate::is_valid_email;

/// User record in the database.
#[derive(Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
    pub roles: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub date_updated: OffsetDateTime,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("date_created", &self.date_created)
            .field("date_updated", &self.date_updated)
            .finish_non_exhaustive()
    }
}

/// Request body for adding a user.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub password: String,
    pub password_confirm: String,
}

/// Partial update: only `Some` fields are applied.
#[derive(Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

fn check_name(fields: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        fields.push("name", "must not be empty");
    }
}

fn check_email(fields: &mut FieldErrors, email: &str) {
    if !is_valid_email(email) {
        fields.push("email", "must be a valid email address");
    }
}

fn check_roles(fields: &mut FieldErrors, roles: &[String]) {
    if roles.is_empty() {
        fields.push("roles", "at least one role is required");
    }
    if let Some(unknown) = roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
        fields.push("roles", format!("unknown role {unknown:?}"));
    }
}

fn check_password(fields: &mut FieldErrors, password: &str, confirm: Option<&str>) {
    if password.is_empty() {
        fields.push("password", "must not be empty");
    }
    if confirm != Some(password) {
        fields.push("password_confirm", "must match password");
    }
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check_name(&mut fields, &self.name);
        check_email(&mut fields, &self.email);
        check_roles(&mut fields, &self.roles);
        check_password(&mut fields, &self.password, Some(&self.password_confirm));
        fields.into_result()
    }
}

impl UpdateUser {
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut fields, name);
        }
        if let Some(email) = &self.email {
            check_email(&mut fields, email);
        }
        if let Some(roles) = &self.roles {
            check_roles(&mut fields, roles);
        }
        if let Some(password) = &self.password {
            check_password(&mut fields, password, self.password_confirm.as_deref());
        }
        fields.into_result()
    }
}

// Debug for request bodies leaves passwords out.

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for UpdateUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("password_changed", &self.password.is_some())
            .finish()
    }
}
