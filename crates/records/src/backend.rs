//! The table-generic capability every store implements.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::ServiceResult;
use crate::models::EntityKind;

/// One row as the backend returns it.
pub type Record = Map<String, Value>;

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

/// Row storage for the six entity tables.
///
/// Implementations enforce the foreign keys declared by
/// [`EntityKind::foreign_key`]: inserts and updates that reference a missing
/// parent fail, and so do deletes of a parent that is still referenced.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows ordered by id ascending, optionally filtered.
    async fn select(&self, kind: EntityKind, filter: Option<&Filter>) -> ServiceResult<Vec<Record>>;

    /// Bulk insert. The returned rows correspond positionally to `rows`.
    async fn insert(&self, kind: EntityKind, rows: Vec<Value>) -> ServiceResult<Vec<Record>>;

    async fn update(&self, kind: EntityKind, id: i64, patch: Record) -> ServiceResult<Record>;

    async fn delete(&self, kind: EntityKind, id: i64) -> ServiceResult<()>;

    /// Deletes every row of the table in one statement.
    async fn clear(&self, kind: EntityKind) -> ServiceResult<()>;

    async fn count(&self, kind: EntityKind) -> ServiceResult<usize>;
}
