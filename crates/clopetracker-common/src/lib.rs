//! Clopetracker-Common: Shared types, identifiers, and errors.
//!
//! This crate provides functionality used across clopetracker:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for profile records
//! - **Core Types**: Profile roles, stored assets, and upload payloads
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use clopetracker_common::{Error, Result, Role, StoredAsset, UserId};
//!
//! let id = UserId::new();
//! let asset = StoredAsset::new("profiles/me.webp", "image/webp");
//! assert_eq!(asset.name, "profiles/me.webp");
//! assert_eq!(Role::default(), Role::Member);
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("profile"))
//! }
//! # let _ = id;
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
