use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, FieldErrors, Result};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Parses a caller-supplied identifier.
pub fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| Error::InvalidId(id.to_string()))
}

/// `?page=&rows=` on list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_rows")]
    pub rows: i64,
}

fn first_page() -> i64 {
    1
}

fn default_rows() -> i64 {
    20
}

/// Rows to skip and rows to return for a 1-based page.
pub fn page_window(page_number: i64, rows_per_page: i64) -> Result<(i64, i64)> {
    let mut fields = FieldErrors::new();
    if page_number < 1 {
        fields.push("page", "must be 1 or greater");
    }
    if rows_per_page < 1 {
        fields.push("rows", "must be 1 or greater");
    }
    fields.into_result()?;

    let offset = (page_number - 1).checked_mul(rows_per_page).ok_or_else(|| {
        let mut fields = FieldErrors::new();
        fields.push("page", "out of range");
        Error::Validation(fields)
    })?;
    Ok((offset, rows_per_page))
}
