//! Per-table row counts.

use std::fmt;

use tracing::error;

use crate::backend::Backend;
use crate::models::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCount {
    Rows(usize),
    /// The count query failed; the message is kept for logs.
    Error(String),
}

impl fmt::Display for TableCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableCount::Rows(n) => write!(f, "{n}"),
            TableCount::Error(_) => f.write_str("Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStatus {
    pub tables: Vec<(EntityKind, TableCount)>,
}

impl DatabaseStatus {
    pub fn get(&self, kind: EntityKind) -> Option<&TableCount> {
        self.tables.iter().find(|(k, _)| *k == kind).map(|(_, c)| c)
    }

    pub fn total_rows(&self) -> usize {
        self.tables
            .iter()
            .filter_map(|(_, count)| match count {
                TableCount::Rows(n) => Some(*n),
                TableCount::Error(_) => None,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables
            .iter()
            .all(|(_, count)| *count == TableCount::Rows(0))
    }
}

/// Counts every table in insert order. A failing table is reported as
/// [`TableCount::Error`] and does not stop the others.
pub async fn check_status(backend: &dyn Backend) -> DatabaseStatus {
    let mut tables = Vec::with_capacity(EntityKind::INSERT_ORDER.len());
    for kind in EntityKind::INSERT_ORDER {
        let count = match backend.count(kind).await {
            Ok(n) => TableCount::Rows(n),
            Err(e) => {
                error!("Error checking {kind}: {e}");
                TableCount::Error(e.to_string())
            }
        };
        tables.push((kind, count));
    }
    DatabaseStatus { tables }
}
