//! Clopetracker-DB: Database schema, migrations, and query operations
//!
//! This crate provides database functionality for clopetracker using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use clopetracker_db::models::Profile;
//! use clopetracker_db::pool::{get_conn, init_pool};
//! use clopetracker_db::queries::profiles;
//!
//! let pool = init_pool("/var/lib/clopetracker/db.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let profile = Profile::new("alice", "alice@example.com");
//! profiles::insert_profile(&conn, &profile).unwrap();
//! println!("Created profile: {}", profile.username);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
