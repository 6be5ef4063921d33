//! In-process backend with the hosted schema's referential rules.
//!
//! Ids come from a per-table sequence and are never reused, matching a
//! Postgres `bigserial`. Every statement validates before it writes, so a
//! rejected bulk insert leaves the table untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::backend::{Backend, Filter, Record};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{EntityKind, ForeignKey};

/// Columns the store owns; callers cannot set them.
const MANAGED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<EntityKind, BTreeMap<i64, Record>>,
    sequences: HashMap<EntityKind, i64>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> impl Iterator<Item = (&i64, &Record)> {
        self.rows.get(&kind).into_iter().flat_map(|t| t.iter())
    }

    fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.rows.get(&kind).is_some_and(|t| t.contains_key(&id))
    }

    fn next_id(&mut self, kind: EntityKind) -> i64 {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        *seq
    }

    fn check_reference(&self, kind: EntityKind, fk: ForeignKey, row: &Record) -> ServiceResult<()> {
        let Some(value) = row.get(fk.field) else {
            return Err(ServiceError::Backend {
                status: 400,
                message: format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    fk.field, kind
                ),
            });
        };
        let parent_id = value.as_i64();
        if parent_id.is_some_and(|id| self.contains(fk.parent, id)) {
            return Ok(());
        }
        Err(ServiceError::conflict(format!(
            "insert or update on table \"{kind}\" violates foreign key constraint \"{kind}_{}_fkey\": \
             Key ({})=({value}) is not present in table \"{}\"",
            fk.field, fk.field, fk.parent
        )))
    }

    /// Fails if any child row still references one of `ids` in `kind`.
    fn check_unreferenced(&self, kind: EntityKind, ids: &[i64]) -> ServiceResult<()> {
        for child in kind.children() {
            let Some(fk) = child.foreign_key() else {
                continue;
            };
            let referenced = self.table(child).any(|(_, row)| {
                row.get(fk.field)
                    .and_then(Value::as_i64)
                    .is_some_and(|id| ids.contains(&id))
            });
            if referenced {
                return Err(ServiceError::conflict(format!(
                    "update or delete on table \"{kind}\" violates foreign key constraint \
                     \"{child}_{}_fkey\" on table \"{child}\"",
                    fk.field
                )));
            }
        }
        Ok(())
    }
}

/// In-memory [`Backend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now() -> Value {
    Value::String(OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default())
}

fn into_record(value: Value) -> ServiceResult<Record> {
    match value {
        Value::Object(mut map) => {
            for column in MANAGED_COLUMNS {
                map.remove(column);
            }
            Ok(map)
        }
        other => Err(ServiceError::InvalidInput(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, kind: EntityKind, filter: Option<&Filter>) -> ServiceResult<Vec<Record>> {
        let tables = self.lock();
        Ok(tables
            .table(kind)
            .filter(|(_, row)| filter.is_none_or(|f| f.matches(row)))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn insert(&self, kind: EntityKind, rows: Vec<Value>) -> ServiceResult<Vec<Record>> {
        let mut tables = self.lock();

        let rows = rows
            .into_iter()
            .map(into_record)
            .collect::<ServiceResult<Vec<_>>>()?;
        if let Some(fk) = kind.foreign_key() {
            for row in &rows {
                tables.check_reference(kind, fk, row)?;
            }
        }

        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = tables.next_id(kind);
            row.insert("id".into(), Value::from(id));
            row.insert("created_at".into(), now());
            row.insert("updated_at".into(), now());
            tables.rows.entry(kind).or_default().insert(id, row.clone());
            inserted.push(row);
        }

        debug!("Inserted {} rows into {}", inserted.len(), kind);
        Ok(inserted)
    }

    async fn update(&self, kind: EntityKind, id: i64, patch: Record) -> ServiceResult<Record> {
        let mut tables = self.lock();
        if !tables.contains(kind, id) {
            return Err(ServiceError::not_found(kind, id));
        }

        let patch = into_record(Value::Object(patch))?;
        if let Some(fk) = kind.foreign_key() {
            if patch.contains_key(fk.field) {
                tables.check_reference(kind, fk, &patch)?;
            }
        }

        let row = tables
            .rows
            .get_mut(&kind)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| ServiceError::not_found(kind, id))?;
        row.extend(patch);
        row.insert("updated_at".into(), now());
        Ok(row.clone())
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> ServiceResult<()> {
        let mut tables = self.lock();
        if !tables.contains(kind, id) {
            return Err(ServiceError::not_found(kind, id));
        }
        tables.check_unreferenced(kind, &[id])?;
        if let Some(t) = tables.rows.get_mut(&kind) {
            t.remove(&id);
        }
        Ok(())
    }

    async fn clear(&self, kind: EntityKind) -> ServiceResult<()> {
        let mut tables = self.lock();
        let ids: Vec<i64> = tables.table(kind).map(|(id, _)| *id).collect();
        tables.check_unreferenced(kind, &ids)?;
        tables.rows.remove(&kind);
        Ok(())
    }

    async fn count(&self, kind: EntityKind) -> ServiceResult<usize> {
        Ok(self.lock().table(kind).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .insert(
                EntityKind::Users,
                vec![
                    json!({"name": "Ann", "username": "ann", "email": "ann@example.com"}),
                    json!({"name": "Bob", "username": "bob", "email": "bob@example.com"}),
                ],
            )
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids_and_timestamps() {
        let backend = seeded().await;
        let users = backend.select(EntityKind::Users, None).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["id"], json!(1));
        assert_eq!(users[1]["id"], json!(2));
        assert!(users[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_caller_cannot_choose_id() {
        let backend = seeded().await;
        let rows = backend
            .insert(EntityKind::Posts, vec![json!({"id": 99, "user_id": 1, "title": "t", "body": "b"})])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_parent_atomically() {
        let backend = seeded().await;
        let err = backend
            .insert(
                EntityKind::Posts,
                vec![
                    json!({"user_id": 1, "title": "ok", "body": ""}),
                    json!({"user_id": 42, "title": "bad", "body": ""}),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("posts_user_id_fkey"));
        assert_eq!(backend.count(EntityKind::Posts).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_clear() {
        let backend = seeded().await;
        backend.clear(EntityKind::Users).await.unwrap();
        let rows = backend
            .insert(EntityKind::Users, vec![json!({"name": "C", "username": "c", "email": "c@x"})])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(3));
    }

    #[tokio::test]
    async fn test_delete_restricted_by_children() {
        let backend = seeded().await;
        backend
            .insert(EntityKind::Todos, vec![json!({"user_id": 2, "title": "t", "completed": false})])
            .await
            .unwrap();

        let err = backend.delete(EntityKind::Users, 2).await.unwrap_err();
        assert_matches!(err, ServiceError::Backend { status: 409, .. });
        assert!(backend.clear(EntityKind::Users).await.is_err());

        backend.delete(EntityKind::Users, 1).await.unwrap();
        assert_eq!(backend.count(EntityKind::Users).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_validates() {
        let backend = seeded().await;
        backend
            .insert(EntityKind::Albums, vec![json!({"user_id": 1, "title": "old"})])
            .await
            .unwrap();

        let mut patch = Record::new();
        patch.insert("title".into(), json!("new"));
        let row = backend.update(EntityKind::Albums, 1, patch).await.unwrap();
        assert_eq!(row["title"], json!("new"));
        assert_eq!(row["user_id"], json!(1));

        let mut bad = Record::new();
        bad.insert("user_id".into(), json!(77));
        assert!(backend.update(EntityKind::Albums, 1, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_targets_are_not_found() {
        let backend = seeded().await;
        assert_matches!(
            backend.update(EntityKind::Users, 9, Record::new()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            backend.delete(EntityKind::Users, 9).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_select_with_filter() {
        let backend = seeded().await;
        let rows = backend
            .select(EntityKind::Users, Some(&Filter::eq("username", "bob")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(2));
    }
}
