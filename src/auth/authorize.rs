//! Authorization predicates over [`Claims`].
//!
//! - No IO
//! - No panics
//! - Pure policy checks; callers decide what to do with a denial

use uuid::Uuid;

use super::claims::{Claims, ROLE_ADMIN};
use crate::error::{Error, Result};

/// True when the claims hold at least one of `required`.
///
/// An empty `required` list is vacuously satisfied, so never call this with
/// an empty list when a check is intended.
pub fn authorized(claims: &Claims, required: &[&str]) -> bool {
    required.is_empty() || required.iter().any(|role| claims.roles().contains(*role))
}

pub fn is_owner(claims: &Claims, owner_id: Uuid) -> bool {
    claims.subject() == owner_id
}

/// Owner of the resource, or an admin.
pub fn can_access(claims: &Claims, owner_id: Uuid) -> bool {
    is_owner(claims, owner_id) || authorized(claims, &[ROLE_ADMIN])
}

pub fn require_role(claims: &Claims, required: &[&str]) -> Result<()> {
    if authorized(claims, required) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

pub fn require_access(claims: &Claims, owner_id: Uuid) -> Result<()> {
    if can_access(claims, owner_id) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
