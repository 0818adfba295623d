#![forbid(unsafe_code)]

use super::is_constraint_violation;
use crate::StoreError;
use cms_core::ids::SubjectId;
use rusqlite::{Connection, OptionalExtension, params};

pub(crate) fn insert_profile_tx(
    conn: &Connection,
    subject: SubjectId,
    email: &str,
    data_json: &str,
) -> Result<(), StoreError> {
    let insert = conn.execute(
        "INSERT INTO profiles(subject_id, email, data_json) VALUES (?1, ?2, ?3)",
        params![subject.as_i64(), email, data_json],
    );
    match insert {
        Ok(_) => Ok(()),
        Err(err) if is_constraint_violation(&err) => {
            Err(StoreError::InvalidInput("profile already exists"))
        }
        Err(err) => Err(StoreError::Sql(err)),
    }
}

/// `(email, data_json)` for the subject.
pub(crate) fn profile_by_subject(
    conn: &Connection,
    subject: SubjectId,
) -> Result<Option<(String, String)>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT email, data_json FROM profiles WHERE subject_id=?1",
            params![subject.as_i64()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?)
}

pub(crate) fn update_profile_data_tx(
    conn: &Connection,
    subject: SubjectId,
    data_json: &str,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE profiles SET data_json=?1 WHERE subject_id=?2",
        params![data_json, subject.as_i64()],
    )?)
}
