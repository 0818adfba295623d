#![forbid(unsafe_code)]

use super::now_ms;
use crate::StoreError;
use cms_core::model::ObjectKind;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

const SCHEMA_VERSION: i64 = 1;

const REQUIRED_TABLES: [&str; 7] = [
    "store_state",
    "resources",
    "attachments",
    "resource_attachment_links",
    "object_types",
    "objects",
    "profiles",
];

/// Refuses to open a database written by a different schema generation.
pub(super) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    for table in REQUIRED_TABLES {
        if !tables.contains(table) {
            return Err(StoreError::InvalidInput(
                "RESET_REQUIRED: required table is missing",
            ));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

pub(super) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resources (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          uuid TEXT NOT NULL UNIQUE,
          owner_subject INTEGER NOT NULL,
          domain_id INTEGER NOT NULL,
          title TEXT NOT NULL,
          primary_filename TEXT,
          primary_filepath TEXT,
          body TEXT NOT NULL,
          tags_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          CHECK((primary_filename IS NULL) = (primary_filepath IS NULL)),
          CHECK(updated_at_ms >= created_at_ms)
        );

        CREATE INDEX IF NOT EXISTS idx_resources_owner_created
          ON resources(owner_subject, created_at_ms, id);

        CREATE TABLE IF NOT EXISTS attachments (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          filename TEXT NOT NULL,
          filepath TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resource_attachment_links (
          resource_id INTEGER NOT NULL,
          attachment_id INTEGER NOT NULL UNIQUE,
          idx INTEGER NOT NULL,
          PRIMARY KEY(resource_id, idx),
          FOREIGN KEY(resource_id) REFERENCES resources(id) ON DELETE RESTRICT,
          FOREIGN KEY(attachment_id) REFERENCES attachments(id) ON DELETE RESTRICT,
          CHECK(idx >= 0)
        );

        CREATE TABLE IF NOT EXISTS object_types (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          value TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS objects (
          value TEXT PRIMARY KEY,
          type_id INTEGER NOT NULL,
          FOREIGN KEY(type_id) REFERENCES object_types(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS profiles (
          subject_id INTEGER PRIMARY KEY,
          email TEXT NOT NULL UNIQUE,
          data_json TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO object_types(value) VALUES (?1)",
        params![ObjectKind::Article.as_str()],
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
