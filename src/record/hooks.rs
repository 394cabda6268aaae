//! Extension points of a record.
//!
//! - [`ExtraData`]: state that is not backed by a column of the record's
//!   table, loaded and saved alongside the row.
//! - [`FieldHasher`]: one-way transform applied to encrypted fields.

use md5::{Digest, Md5};

use super::error::RecordError;
use super::identity::Identity;
use super::session::Session;
use crate::db::{DbError, Row};

/// What an [`ExtraData`] hook can see and touch.
pub struct ExtraContext<'a> {
    pub session: &'a Session,
    pub table: &'a str,
    pub id: &'a Identity,
    pub extra: &'a mut Row,
    pub errors: &'a mut Vec<RecordError>,
}

/// Hooks for application-defined fields.
///
/// `reset` declares the extra fields (with their default values); after that
/// they are read and written through the record like ordinary fields.
/// Every hook defaults to a successful no-op.
pub trait ExtraData: Send {
    fn reset(&mut self, _extra: &mut Row) {}

    fn load(&mut self, _ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        Ok(true)
    }

    fn save(&mut self, _ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        Ok(true)
    }

    fn delete(&mut self, _ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        Ok(true)
    }
}

/// Records without extra fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExtraData;

impl ExtraData for NoExtraData {}

/// One-way hash applied to encrypted fields before they are stored.
pub trait FieldHasher: Send + Sync {
    fn name(&self) -> &str;

    fn hash(&self, value: &str) -> String;

    /// Whether the digest is fit for protecting secrets such as passwords.
    fn is_secure(&self) -> bool {
        false
    }
}

/// Hex-encoded MD5, the historical default.
///
/// MD5 is fast and unsalted: it offers no real protection for passwords.
/// It is kept only so existing stored digests keep matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyMd5Hasher;

impl FieldHasher for LegacyMd5Hasher {
    fn name(&self) -> &str {
        "md5"
    }

    fn hash(&self, value: &str) -> String {
        hex::encode(Md5::digest(value.as_bytes()))
    }
}
