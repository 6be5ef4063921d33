//! Typed per-entity services over a shared [`Backend`].
//!
//! There is one implementation for all six kinds: [`Service<E>`] serialises
//! drafts and patches, delegates to the backend, and decodes rows back into
//! `E`.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Backend, Filter, Record};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{Album, Comment, Entity, Photo, Post, Todo};

/// The contract the record manager drives.
#[async_trait]
pub trait RecordService<E: Entity>: Send + Sync {
    async fn get_all(&self) -> ServiceResult<Vec<E>>;

    async fn create(&self, draft: &E::Draft) -> ServiceResult<E>;

    async fn update(&self, id: i64, patch: Record) -> ServiceResult<E>;

    async fn delete(&self, id: i64) -> ServiceResult<()>;
}

pub struct Service<E> {
    backend: Arc<dyn Backend>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Service<E> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _entity: PhantomData,
        }
    }
}

fn decode<E: Entity>(record: Record) -> ServiceResult<E> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

impl<E: Entity> Service<E> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<E> {
        let rows = self
            .backend
            .select(E::KIND, Some(&Filter::eq("id", id)))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(E::KIND, id))?;
        decode(row)
    }

    /// Rows whose `field` equals `value`.
    pub async fn get_where(&self, field: &str, value: impl Into<Value>) -> ServiceResult<Vec<E>> {
        let filter = Filter::eq(field, value);
        let rows = self.backend.select(E::KIND, Some(&filter)).await?;
        rows.into_iter().map(decode).collect()
    }

    /// Bulk insert; the result is in the same order as `drafts`.
    pub async fn create_many(&self, drafts: &[E::Draft]) -> ServiceResult<Vec<E>> {
        let payload = drafts
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self.backend.insert(E::KIND, payload).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        self.backend.count(E::KIND).await
    }
}

#[async_trait]
impl<E: Entity> RecordService<E> for Service<E> {
    async fn get_all(&self) -> ServiceResult<Vec<E>> {
        let rows = self.backend.select(E::KIND, None).await?;
        rows.into_iter().map(decode).collect()
    }

    async fn create(&self, draft: &E::Draft) -> ServiceResult<E> {
        let rows = self
            .backend
            .insert(E::KIND, vec![serde_json::to_value(draft)?])
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| ServiceError::Backend {
            status: 500,
            message: format!("insert into {} returned no row", E::KIND),
        })?;
        decode(row)
    }

    async fn update(&self, id: i64, patch: Record) -> ServiceResult<E> {
        decode(self.backend.update(E::KIND, id, patch).await?)
    }

    async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.backend.delete(E::KIND, id).await
    }
}

impl Service<Post> {
    pub async fn get_by_user_id(&self, user_id: i64) -> ServiceResult<Vec<Post>> {
        self.get_where("user_id", user_id).await
    }
}

impl Service<Comment> {
    pub async fn get_by_post_id(&self, post_id: i64) -> ServiceResult<Vec<Comment>> {
        self.get_where("post_id", post_id).await
    }
}

impl Service<Album> {
    pub async fn get_by_user_id(&self, user_id: i64) -> ServiceResult<Vec<Album>> {
        self.get_where("user_id", user_id).await
    }
}

impl Service<Photo> {
    pub async fn get_by_album_id(&self, album_id: i64) -> ServiceResult<Vec<Photo>> {
        self.get_where("album_id", album_id).await
    }
}

impl Service<Todo> {
    pub async fn get_by_user_id(&self, user_id: i64) -> ServiceResult<Vec<Todo>> {
        self.get_where("user_id", user_id).await
    }

    pub async fn get_completed(&self, completed: bool) -> ServiceResult<Vec<Todo>> {
        self.get_where("completed", completed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::models::{NewPost, NewTodo, NewUser, User};
    use assert_matches::assert_matches;

    fn user(name: &str) -> NewUser {
        NewUser {
            name: name.into(),
            username: name.to_lowercase(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_id() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let users = Service::<User>::new(backend);

        let created = users.create(&user("Ann")).await.unwrap();
        let fetched = users.get_by_id(created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_matches!(users.get_by_id(404).await, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_many_preserves_order() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let users = Service::<User>::new(backend);

        let created = users
            .create_many(&[user("Ann"), user("Bob"), user("Cy")])
            .await
            .unwrap();
        let names: Vec<_> = created.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Ann", "Bob", "Cy"]);
    }

    #[tokio::test]
    async fn test_filtered_helpers() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let users = Service::<User>::new(backend.clone());
        let posts = Service::<Post>::new(backend.clone());
        let todos = Service::<Todo>::new(backend);

        let created = users.create_many(&[user("Ann"), user("Bob")]).await.unwrap();
        let (ann, bob) = (created[0].id, created[1].id);
        posts
            .create_many(&[
                NewPost { user_id: ann, title: "a".into(), body: "".into() },
                NewPost { user_id: bob, title: "b".into(), body: "".into() },
                NewPost { user_id: ann, title: "c".into(), body: "".into() },
            ])
            .await
            .unwrap();
        todos
            .create(&NewTodo { user_id: bob, title: "t".into(), completed: true })
            .await
            .unwrap();

        assert_eq!(posts.get_by_user_id(ann).await.unwrap().len(), 2);
        assert_eq!(todos.get_completed(true).await.unwrap().len(), 1);
        assert!(todos.get_completed(false).await.unwrap().is_empty());
    }
}
