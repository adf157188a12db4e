//! Database query modules.
//!
//! - profiles: Profile CRUD, guarded avatar updates, and the cigarette counter

pub mod profiles;
