#![forbid(unsafe_code)]

use crate::StoreError;
use cms_core::ids::SubjectId;
use rusqlite::Connection;
use rusqlite::types::Value;

/// Columns of `resources` an update may assign. Anything else is not
/// expressible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResourceColumn {
    Title,
    Body,
    TagsJson,
    PrimaryFilename,
    PrimaryFilepath,
    UpdatedAtMs,
}

impl ResourceColumn {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::TagsJson => "tags_json",
            Self::PrimaryFilename => "primary_filename",
            Self::PrimaryFilepath => "primary_filepath",
            Self::UpdatedAtMs => "updated_at_ms",
        }
    }
}

/// One UPDATE over a single owned resource row, built from typed assignments
/// bound as positional parameters.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResourcePatch {
    assignments: Vec<(ResourceColumn, Value)>,
}

impl ResourcePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later assignment to the same column replaces the earlier one.
    pub fn set(mut self, column: ResourceColumn, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.assignments.push((column, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn to_sql(&self) -> String {
        let set_clause = self
            .assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{}=?{}", column.as_sql(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = self.assignments.len() + 1;
        format!(
            "UPDATE resources SET {set_clause} WHERE id=?{id_param} AND owner_subject=?{}",
            id_param + 1
        )
    }

    /// Returns the number of rows changed (0 when the row vanished or belongs
    /// to someone else).
    pub fn apply(
        self,
        conn: &Connection,
        resource_id: i64,
        owner: SubjectId,
    ) -> Result<usize, StoreError> {
        if self.is_empty() {
            return Err(StoreError::InvalidInput("resource patch has no assignments"));
        }
        let sql = self.to_sql();
        let params = self
            .assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain([Value::Integer(resource_id), Value::Integer(owner.as_i64())]);
        Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?)
    }
}
