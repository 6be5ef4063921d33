//! Integration tests for the seeder against the in-memory backend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use records::models::{Album, Comment, Photo, Post, Todo, User};
use records::{Backend, EntityKind, Filter, MemoryBackend, Record, RecordService, Service, ServiceError, ServiceResult};
use seed_data::prelude::*;
use seed_data::sources::{SourceAlbum, SourceComment, SourcePhoto, SourcePost, SourceTodo, SourceUser};
use serde_json::Value;

/// The shape of the public sample set. Source ids start at `first_id`.
fn sample(first_id: i64) -> SourceData {
    sized(first_id, [10, 100, 500, 100, 5000, 200])
}

fn sized(first_id: i64, sizes: [i64; 6]) -> SourceData {
    let [users, posts, comments, albums, photos, todos] = sizes;
    let id = |i: i64| first_id + i;
    SourceData {
        users: (0..users)
            .map(|i| SourceUser {
                id: id(i),
                name: format!("User {i}"),
                username: format!("user{i}"),
                email: format!("user{i}@example.com"),
                phone: None,
                website: Some("example.org".into()),
                address: None,
                company: None,
            })
            .collect(),
        posts: (0..posts)
            .map(|i| SourcePost {
                id: id(i),
                user_id: id(i % users),
                title: format!("post {i}"),
                body: String::new(),
            })
            .collect(),
        comments: (0..comments)
            .map(|i| SourceComment {
                id: id(i),
                post_id: id(i % posts),
                name: format!("comment {i}"),
                email: "c@example.com".into(),
                body: String::new(),
            })
            .collect(),
        albums: (0..albums)
            .map(|i| SourceAlbum {
                id: id(i),
                user_id: id(i % users),
                title: format!("album {i}"),
            })
            .collect(),
        photos: (0..photos)
            .map(|i| SourcePhoto {
                id: id(i),
                album_id: id(i % albums),
                title: format!("photo {i}"),
                url: format!("https://via.placeholder.com/600/{i}"),
                thumbnail_url: format!("https://via.placeholder.com/150/{i}"),
            })
            .collect(),
        todos: (0..todos)
            .map(|i| SourceTodo {
                id: id(i),
                user_id: id(i % users),
                title: format!("todo {i}"),
                completed: i % 2 == 0,
            })
            .collect(),
    }
}

async fn ids<E: records::Entity>(backend: &Arc<dyn Backend>) -> HashSet<i64> {
    Service::<E>::new(backend.clone())
        .get_all()
        .await
        .unwrap()
        .iter()
        .map(|row| row.id())
        .collect()
}

#[tokio::test]
async fn test_full_sample_counts_and_references() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let counts = Seeder::new(backend.clone()).import(sample(1)).await.unwrap();

    assert_eq!(
        counts,
        SeedCounts {
            users: 10,
            posts: 100,
            comments: 500,
            albums: 100,
            photos: 5000,
            todos: 200,
        }
    );
    for kind in EntityKind::INSERT_ORDER {
        assert_eq!(backend.count(kind).await.unwrap(), counts.get(kind));
    }

    let user_ids = ids::<User>(&backend).await;
    let post_ids = ids::<Post>(&backend).await;
    let album_ids = ids::<Album>(&backend).await;

    let posts = Service::<Post>::new(backend.clone()).get_all().await.unwrap();
    assert!(posts.iter().all(|p| user_ids.contains(&p.user_id)));
    let comments = Service::<Comment>::new(backend.clone()).get_all().await.unwrap();
    assert!(comments.iter().all(|c| post_ids.contains(&c.post_id)));
    let photos = Service::<Photo>::new(backend.clone()).get_all().await.unwrap();
    assert!(photos.iter().all(|p| album_ids.contains(&p.album_id)));
    let todos = Service::<Todo>::new(backend.clone()).get_all().await.unwrap();
    assert!(todos.iter().all(|t| user_ids.contains(&t.user_id)));
}

#[tokio::test]
async fn test_references_follow_backend_ids() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    // Source ids 501.. never coincide with the backend's 1.. sequence.
    let data = sized(501, [3, 6, 0, 0, 0, 0]);
    Seeder::new(backend.clone()).import(data.clone()).await.unwrap();

    let users = Service::<User>::new(backend.clone()).get_all().await.unwrap();
    let posts = Service::<Post>::new(backend.clone()).get_all().await.unwrap();
    for (source, row) in data.posts.iter().zip(&posts) {
        let author = (source.user_id - 501) as usize;
        assert_eq!(row.user_id, users[author].id);
        assert_eq!(row.title, source.title);
    }
}

#[tokio::test]
async fn test_seeding_twice_gives_same_counts() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let seeder = Seeder::new(backend.clone()).with_batch_size(64);

    let first = seeder.import(sample(1)).await.unwrap();
    let second = seeder.import(sample(1)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.count(EntityKind::Photos).await.unwrap(), 5000);

    // Fresh ids on the second run; every reference still resolves.
    let user_ids = ids::<User>(&backend).await;
    assert!(user_ids.iter().all(|id| *id > 10));
    let todos = Service::<Todo>::new(backend.clone()).get_all().await.unwrap();
    assert!(todos.iter().all(|t| user_ids.contains(&t.user_id)));
}

/// Memory backend that records insert batches and can fail on demand.
#[derive(Default)]
struct Recording {
    inner: MemoryBackend,
    inserts: Mutex<Vec<(EntityKind, usize)>>,
    fail_insert: Option<EntityKind>,
    fail_clear: bool,
}

impl Recording {
    fn batches(&self, kind: EntityKind) -> Vec<usize> {
        self.inserts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
            .collect()
    }
}

#[async_trait]
impl Backend for Recording {
    async fn select(&self, kind: EntityKind, filter: Option<&Filter>) -> ServiceResult<Vec<Record>> {
        self.inner.select(kind, filter).await
    }

    async fn insert(&self, kind: EntityKind, rows: Vec<Value>) -> ServiceResult<Vec<Record>> {
        self.inserts.lock().unwrap().push((kind, rows.len()));
        if self.fail_insert == Some(kind) {
            return Err(ServiceError::Backend {
                status: 500,
                message: format!("insert into {kind} failed"),
            });
        }
        self.inner.insert(kind, rows).await
    }

    async fn update(&self, kind: EntityKind, id: i64, patch: Record) -> ServiceResult<Record> {
        self.inner.update(kind, id, patch).await
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> ServiceResult<()> {
        self.inner.delete(kind, id).await
    }

    async fn clear(&self, kind: EntityKind) -> ServiceResult<()> {
        if self.fail_clear {
            return Err(ServiceError::Backend {
                status: 401,
                message: "permission denied".into(),
            });
        }
        self.inner.clear(kind).await
    }

    async fn count(&self, kind: EntityKind) -> ServiceResult<usize> {
        self.inner.count(kind).await
    }
}

#[tokio::test]
async fn test_failed_posts_insert_keeps_users_and_stops() {
    let backend = Arc::new(Recording {
        fail_insert: Some(EntityKind::Posts),
        ..Default::default()
    });
    let err = Seeder::new(backend.clone()).import(sample(1)).await.unwrap_err();

    assert_matches!(err, SeedError::Insert { kind: EntityKind::Posts, .. });
    assert_eq!(backend.count(EntityKind::Users).await.unwrap(), 10);
    for kind in [
        EntityKind::Posts,
        EntityKind::Comments,
        EntityKind::Albums,
        EntityKind::Photos,
        EntityKind::Todos,
    ] {
        assert_eq!(backend.count(kind).await.unwrap(), 0);
    }
    for kind in [EntityKind::Comments, EntityKind::Albums, EntityKind::Photos, EntityKind::Todos] {
        assert!(backend.batches(kind).is_empty(), "{kind} insert was attempted");
    }
}

#[tokio::test]
async fn test_unmapped_reference_aborts_before_insert() {
    let backend = Arc::new(Recording::default());
    let mut data = sized(1, [2, 3, 0, 0, 0, 0]);
    data.posts[1].user_id = 99;

    let err = Seeder::new(backend.clone()).import(data).await.unwrap_err();
    assert_matches!(
        err,
        SeedError::UnmappedReference {
            kind: EntityKind::Posts,
            parent: EntityKind::Users,
            source_id: 99
        }
    );
    assert_eq!(backend.batches(EntityKind::Users), vec![2]);
    assert!(backend.batches(EntityKind::Posts).is_empty());
}

#[tokio::test]
async fn test_inserts_are_batched_in_order() {
    let backend = Arc::new(Recording::default());
    let counts = Seeder::new(backend.clone())
        .with_batch_size(7)
        .import(sized(1, [20, 15, 0, 0, 0, 0]))
        .await
        .unwrap();

    assert_eq!(counts.users, 20);
    assert_eq!(backend.batches(EntityKind::Users), vec![7, 7, 6]);
    assert_eq!(backend.batches(EntityKind::Posts), vec![7, 7, 1]);
    // Empty collections send nothing.
    assert!(backend.batches(EntityKind::Photos).is_empty());
}

#[tokio::test]
async fn test_clear_failures_do_not_abort() {
    let backend = Arc::new(Recording {
        fail_clear: true,
        ..Default::default()
    });
    let counts = Seeder::new(backend.clone())
        .import(sized(1, [2, 2, 2, 2, 2, 2]))
        .await
        .unwrap();
    assert_eq!(counts.total(), 12);
}
