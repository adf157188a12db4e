//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use chrono::{DateTime, NaiveDate, Utc};
use clopetracker_common::{Role, StoredAsset, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column list shared by every profile SELECT, in `from_row` order.
pub(crate) const PROFILE_COLUMNS: &str = "id, username, email, first_name, last_name, \
     birth_date, phone, role, group_id, cigarettes_smoked, avatar_name, avatar_content_type, \
     created_at";

fn conversion_failure<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_failure(idx, e))?;
    Ok(T::from(uuid))
}

fn parse_opt_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
}

#[derive(Debug, thiserror::Error)]
#[error("invalid role: {0}")]
struct InvalidRole(String);

fn parse_role(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Role> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: String| conversion_failure(idx, InvalidRole(e)))
}

/// Profile (user account) record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub role: Role,
    /// Group placeholder until groups become their own table.
    pub group_id: Option<i64>,
    pub cigarettes_smoked: i64,
    /// The live avatar, if any.
    pub avatar: Option<StoredAsset>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh member profile with a new identity and no avatar.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            birth_date: None,
            phone: None,
            role: Role::default(),
            group_id: None,
            cigarettes_smoked: 0,
            avatar: None,
            created_at: Utc::now(),
        }
    }

    /// Name of the live avatar asset, if any.
    pub fn avatar_name(&self) -> Option<&str> {
        self.avatar.as_ref().map(|a| a.name.as_str())
    }

    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let avatar_name: Option<String> = row.get(10)?;
        let avatar_content_type: Option<String> = row.get(11)?;

        Ok(Self {
            id: parse_id(row, 0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            birth_date: parse_opt_date(row, 5)?,
            phone: row.get(6)?,
            role: parse_role(row, 7)?,
            group_id: row.get(8)?,
            cigarettes_smoked: row.get(9)?,
            avatar: avatar_name.map(|name| StoredAsset {
                name,
                content_type: avatar_content_type.unwrap_or_default(),
            }),
            created_at: parse_timestamp(row, 12)?,
        })
    }
}
