use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{FieldErrors, Result};

/// Product record; `user_id` is the owner and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub cost: i32,
    pub quantity: i32,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub date_updated: OffsetDateTime,
}

/// Request body for adding a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub cost: i32,
    pub quantity: i32,
    /// Accepted for compatibility and ignored: the owner is always the caller.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub cost: Option<i32>,
    pub quantity: Option<i32>,
}

fn check(fields: &mut FieldErrors, name: Option<&str>, cost: Option<i32>, quantity: Option<i32>) {
    if name.is_some_and(|n| n.trim().is_empty()) {
        fields.push("name", "must not be empty");
    }
    if cost.is_some_and(|c| c < 0) {
        fields.push("cost", "must be zero or greater");
    }
    if quantity.is_some_and(|q| q < 0) {
        fields.push("quantity", "must be zero or greater");
    }
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check(&mut fields, Some(&self.name), Some(self.cost), Some(self.quantity));
        fields.into_result()
    }
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check(&mut fields, self.name.as_deref(), self.cost, self.quantity);
        fields.into_result()
    }
}

impl Product {
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check(&mut fields, Some(&self.name), Some(self.cost), Some(self.quantity));
        fields.into_result()
    }
}
