#![forbid(unsafe_code)]

use super::{PolicyError, PolicyStore, PolicyTuple};
use cms_core::model::Action;
use rusqlite::{Connection, params};
use std::path::Path;
use std::time::Duration;

/// Rule table in its own database file. It never joins a transaction of the
/// relational store.
#[derive(Debug)]
pub struct SqlitePolicyStore {
    conn: Connection,
}

impl SqlitePolicyStore {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, PolicyError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS policy_rules (
              ptype TEXT NOT NULL DEFAULT 'p',
              subject TEXT NOT NULL,
              domain TEXT NOT NULL,
              resource TEXT NOT NULL,
              action TEXT NOT NULL,
              PRIMARY KEY (ptype, subject, domain, resource, action)
            );

            CREATE INDEX IF NOT EXISTS idx_policy_rules_resource
              ON policy_rules(resource);
            "#,
        )?;
        Ok(Self { conn })
    }
}

impl PolicyStore for SqlitePolicyStore {
    fn add_policies(&mut self, tuples: &[PolicyTuple]) -> Result<(), PolicyError> {
        let tx = self.conn.transaction()?;
        for tuple in tuples {
            tx.execute(
                "INSERT OR IGNORE INTO policy_rules(ptype, subject, domain, resource, action) \
                 VALUES ('p', ?1, ?2, ?3, ?4)",
                params![
                    tuple.subject,
                    tuple.domain,
                    tuple.resource,
                    tuple.action.as_str()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_policies(&mut self, tuples: &[PolicyTuple]) -> Result<usize, PolicyError> {
        let tx = self.conn.transaction()?;
        let mut removed = 0usize;
        for tuple in tuples {
            removed += tx.execute(
                "DELETE FROM policy_rules \
                 WHERE ptype='p' AND subject=?1 AND domain=?2 AND resource=?3 AND action=?4",
                params![
                    tuple.subject,
                    tuple.domain,
                    tuple.resource,
                    tuple.action.as_str()
                ],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn remove_resource_policies(&mut self, resource: &str) -> Result<usize, PolicyError> {
        Ok(self.conn.execute(
            "DELETE FROM policy_rules WHERE ptype='p' AND resource=?1",
            params![resource],
        )?)
    }

    fn has_policy(&self, tuple: &PolicyTuple) -> Result<bool, PolicyError> {
        let count = self.conn.query_row(
            "SELECT COUNT(1) FROM policy_rules \
             WHERE ptype='p' AND subject=?1 AND domain=?2 AND resource=?3 AND action=?4",
            params![
                tuple.subject,
                tuple.domain,
                tuple.resource,
                tuple.action.as_str()
            ],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count > 0)
    }

    fn resource_policies(&self, resource: &str) -> Result<Vec<PolicyTuple>, PolicyError> {
        let mut stmt = self.conn.prepare(
            "SELECT subject, domain, resource, action FROM policy_rules \
             WHERE ptype='p' AND resource=?1 \
             ORDER BY subject ASC, domain ASC, action ASC",
        )?;
        let mut rows = stmt.query(params![resource])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let action_raw = row.get::<_, String>(3)?;
            let Some(action) = Action::parse(&action_raw) else {
                return Err(PolicyError::UnknownAction(action_raw));
            };
            out.push(PolicyTuple {
                subject: row.get(0)?,
                domain: row.get(1)?,
                resource: row.get(2)?,
                action,
            });
        }
        Ok(out)
    }

    fn resources(&self) -> Result<Vec<String>, PolicyError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT resource FROM policy_rules WHERE ptype='p' ORDER BY resource ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }
}
