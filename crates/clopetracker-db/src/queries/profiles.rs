//! Profile database queries.
//!
//! CRUD operations for profile records, including the guarded update used
//! by the avatar lifecycle to detect concurrent avatar changes.

use clopetracker_common::{Error, Result, UserId};
use rusqlite::Connection;

use crate::models::{Profile, PROFILE_COLUMNS};

fn map_write_error(e: rusqlite::Error, username: &str) -> Error {
    if e.to_string().contains("UNIQUE constraint failed") {
        Error::invalid_input(format!("Username '{}' already exists", username))
    } else {
        Error::database(e.to_string())
    }
}

/// Insert a new profile.
///
/// # Returns
///
/// * `Ok(())` - The profile was inserted
/// * `Err(Error::InvalidInput)` - If the username already exists
/// * `Err(Error)` - If a database error occurs
pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, username, email, first_name, last_name, birth_date, phone,
             role, group_id, cigarettes_smoked, avatar_name, avatar_content_type, created_at)
         VALUES (:id, :username, :email, :first_name, :last_name, :birth_date, :phone,
             :role, :group_id, :cigarettes_smoked, :avatar_name, :avatar_content_type, :created_at)",
        rusqlite::named_params! {
            ":id": profile.id.to_string(),
            ":username": profile.username,
            ":email": profile.email,
            ":first_name": profile.first_name,
            ":last_name": profile.last_name,
            ":birth_date": profile.birth_date.map(|d| d.to_string()),
            ":phone": profile.phone,
            ":role": profile.role.to_string(),
            ":group_id": profile.group_id,
            ":cigarettes_smoked": profile.cigarettes_smoked,
            ":avatar_name": profile.avatar.as_ref().map(|a| a.name.as_str()),
            ":avatar_content_type": profile.avatar.as_ref().map(|a| a.content_type.as_str()),
            ":created_at": profile.created_at.to_rfc3339(),
        },
    )
    .map_err(|e| map_write_error(e, &profile.username))?;

    Ok(())
}

/// Get a profile by ID.
///
/// # Returns
///
/// * `Ok(Some(Profile))` - The profile if found
/// * `Ok(None)` - If the profile does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_profile(conn: &Connection, id: UserId) -> Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM profiles WHERE id = :id", PROFILE_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        Profile::from_row,
    );

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a profile by username.
pub fn get_profile_by_username(conn: &Connection, username: &str) -> Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM profiles WHERE username = :username", PROFILE_COLUMNS),
        rusqlite::named_params! { ":username": username },
        Profile::from_row,
    );

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all profiles ordered by username.
pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM profiles ORDER BY username",
            PROFILE_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let profiles = stmt
        .query_map([], Profile::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(profiles)
}

/// Overwrite the editable columns of an existing profile.
///
/// The update only applies while the stored `avatar_name` still equals
/// `expected_avatar` (`None` matching a NULL column). This is the optimistic
/// guard against two mutations racing on the same avatar.
///
/// `cigarettes_smoked` is left alone; it only moves through
/// [`add_cigarettes`], so the returned row carries the live counter.
///
/// # Returns
///
/// * `Ok(Some(Profile))` - The row as stored after the update
/// * `Ok(None)` - The row is gone or its avatar no longer matches
/// * `Err(Error)` - If a database error occurs
pub fn update_profile(
    conn: &Connection,
    profile: &Profile,
    expected_avatar: Option<&str>,
) -> Result<Option<Profile>> {
    let result = conn.query_row(
        &format!(
            "UPDATE profiles SET
                username = :username,
                email = :email,
                first_name = :first_name,
                last_name = :last_name,
                birth_date = :birth_date,
                phone = :phone,
                role = :role,
                group_id = :group_id,
                avatar_name = :avatar_name,
                avatar_content_type = :avatar_content_type
             WHERE id = :id AND avatar_name IS :expected_avatar
             RETURNING {}",
            PROFILE_COLUMNS
        ),
        rusqlite::named_params! {
            ":id": profile.id.to_string(),
            ":username": profile.username,
            ":email": profile.email,
            ":first_name": profile.first_name,
            ":last_name": profile.last_name,
            ":birth_date": profile.birth_date.map(|d| d.to_string()),
            ":phone": profile.phone,
            ":role": profile.role.to_string(),
            ":group_id": profile.group_id,
            ":avatar_name": profile.avatar.as_ref().map(|a| a.name.as_str()),
            ":avatar_content_type": profile.avatar.as_ref().map(|a| a.content_type.as_str()),
            ":expected_avatar": expected_avatar,
        },
        Profile::from_row,
    );

    match result {
        Ok(updated) => Ok(Some(updated)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_write_error(e, &profile.username)),
    }
}

/// Delete a profile, returning the row as it was at deletion time.
///
/// # Returns
///
/// * `Ok(Some(Profile))` - The deleted profile
/// * `Ok(None)` - If the profile did not exist
/// * `Err(Error)` - If a database error occurs
pub fn delete_profile(conn: &Connection, id: UserId) -> Result<Option<Profile>> {
    let result = conn.query_row(
        &format!("DELETE FROM profiles WHERE id = :id RETURNING {}", PROFILE_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        Profile::from_row,
    );

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Add `count` to a profile's cigarette counter and return the new total.
///
/// # Returns
///
/// * `Ok(Some(total))` - The updated counter
/// * `Ok(None)` - If the profile does not exist
/// * `Err(Error)` - If a database error occurs
pub fn add_cigarettes(conn: &Connection, id: UserId, count: u32) -> Result<Option<i64>> {
    let result = conn.query_row(
        "UPDATE profiles SET cigarettes_smoked = cigarettes_smoked + :count
         WHERE id = :id RETURNING cigarettes_smoked",
        rusqlite::named_params! { ":id": id.to_string(), ":count": count },
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(total) => Ok(Some(total)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Names of every avatar asset currently referenced by a profile.
pub fn list_avatar_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT avatar_name FROM profiles WHERE avatar_name IS NOT NULL")
        .map_err(|e| Error::database(e.to_string()))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(names)
}
