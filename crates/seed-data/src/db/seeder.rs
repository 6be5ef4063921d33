//! Backend seeding with foreign-key remapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use records::models::{
    Album, Comment, NewAlbum, NewComment, NewPhoto, NewPost, NewTodo, NewUser, Photo, Post, Todo,
    User,
};
use records::{Backend, Entity, EntityKind, Service, ServiceError};
use thiserror::Error;
use tracing::{error, info};

use crate::sources::{PlaceholderClient, SourceData, SourceError};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to fetch sample data: {0}")]
    Source(#[from] SourceError),
    #[error("Failed to insert {kind}: {source}")]
    Insert {
        kind: EntityKind,
        #[source]
        source: ServiceError,
    },
    #[error("Inserting {kind} returned {returned} rows for {sent} sent")]
    InsertMismatch {
        kind: EntityKind,
        sent: usize,
        returned: usize,
    },
    #[error("Source {kind} id {source_id} appears more than once")]
    DuplicateSourceId { kind: EntityKind, source_id: i64 },
    #[error("{kind} references {parent} {source_id}, which was not imported")]
    UnmappedReference {
        kind: EntityKind,
        parent: EntityKind,
        source_id: i64,
    },
}

/// Source id to backend id for one imported table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap {
    kind: EntityKind,
    ids: HashMap<i64, i64>,
}

impl IdMap {
    /// Pairs source ids with the ids the backend returned, position by position.
    ///
    /// Source ids must be unique within the table.
    pub fn build(kind: EntityKind, source_ids: &[i64], backend_ids: &[i64]) -> Result<Self, SeedError> {
        if source_ids.len() != backend_ids.len() {
            return Err(SeedError::InsertMismatch {
                kind,
                sent: source_ids.len(),
                returned: backend_ids.len(),
            });
        }
        let mut ids = HashMap::with_capacity(source_ids.len());
        for (source_id, backend_id) in source_ids.iter().zip(backend_ids) {
            if ids.insert(*source_id, *backend_id).is_some() {
                return Err(SeedError::DuplicateSourceId {
                    kind,
                    source_id: *source_id,
                });
            }
        }
        Ok(Self { kind, ids })
    }

    /// Backend id for a reference from a `child` row; never falls back to the source id.
    pub fn resolve(&self, child: EntityKind, source_id: i64) -> Result<i64, SeedError> {
        self.ids
            .get(&source_id)
            .copied()
            .ok_or(SeedError::UnmappedReference {
                kind: child,
                parent: self.kind,
                source_id,
            })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Rows inserted per table by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub albums: usize,
    pub photos: usize,
    pub todos: usize,
}

impl SeedCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Users => self.users,
            EntityKind::Posts => self.posts,
            EntityKind::Comments => self.comments,
            EntityKind::Albums => self.albums,
            EntityKind::Photos => self.photos,
            EntityKind::Todos => self.todos,
        }
    }

    pub fn total(&self) -> usize {
        EntityKind::INSERT_ORDER.iter().map(|k| self.get(*k)).sum()
    }
}

impl fmt::Display for SeedCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} posts, {} comments, {} albums, {} photos, {} todos",
            self.users, self.posts, self.comments, self.albums, self.photos, self.todos
        )
    }
}

/// Replaces the backend's contents with sample data.
pub struct Seeder {
    backend: Arc<dyn Backend>,
    batch_size: usize,
}

impl Seeder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the number of rows sent per insert request.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Fetches from `source`, then runs [`Seeder::import`].
    pub async fn seed_from(&self, source: &PlaceholderClient) -> Result<SeedCounts, SeedError> {
        info!("Fetching sample data from {}", source.endpoint());
        let data = source.fetch_all().await?;
        self.import(data).await
    }

    /// Deletes every row, children first. Failures are logged and skipped.
    pub async fn clear(&self) {
        for kind in EntityKind::DELETE_ORDER {
            match self.backend.clear(kind).await {
                Ok(()) => info!("Cleared {kind}"),
                Err(e) => error!("Error clearing {kind}: {e}"),
            }
        }
    }

    /// Clears the backend and inserts `data` in dependency order.
    ///
    /// An insert failure stops the run; tables inserted before it stay
    /// populated.
    pub async fn import(&self, data: SourceData) -> Result<SeedCounts, SeedError> {
        self.clear().await;

        let (users, user_count) = self
            .insert_phase::<User>(
                data.users.iter().map(|u| u.id).collect(),
                data.users
                    .into_iter()
                    .map(|u| NewUser {
                        name: u.name,
                        username: u.username,
                        email: u.email,
                        phone: u.phone,
                        website: u.website,
                        address: u.address,
                        company: u.company,
                    })
                    .collect(),
            )
            .await?;

        let post_drafts = data
            .posts
            .iter()
            .map(|p| {
                Ok(NewPost {
                    user_id: users.resolve(EntityKind::Posts, p.user_id)?,
                    title: p.title.clone(),
                    body: p.body.clone(),
                })
            })
            .collect::<Result<Vec<_>, SeedError>>()?;
        let (posts, post_count) = self
            .insert_phase::<Post>(data.posts.iter().map(|p| p.id).collect(), post_drafts)
            .await?;

        let comment_drafts = data
            .comments
            .iter()
            .map(|c| {
                Ok(NewComment {
                    post_id: posts.resolve(EntityKind::Comments, c.post_id)?,
                    name: c.name.clone(),
                    email: c.email.clone(),
                    body: c.body.clone(),
                })
            })
            .collect::<Result<Vec<_>, SeedError>>()?;
        let (_, comment_count) = self
            .insert_phase::<Comment>(data.comments.iter().map(|c| c.id).collect(), comment_drafts)
            .await?;

        let album_drafts = data
            .albums
            .iter()
            .map(|a| {
                Ok(NewAlbum {
                    user_id: users.resolve(EntityKind::Albums, a.user_id)?,
                    title: a.title.clone(),
                })
            })
            .collect::<Result<Vec<_>, SeedError>>()?;
        let (albums, album_count) = self
            .insert_phase::<Album>(data.albums.iter().map(|a| a.id).collect(), album_drafts)
            .await?;

        let photo_drafts = data
            .photos
            .iter()
            .map(|p| {
                Ok(NewPhoto {
                    album_id: albums.resolve(EntityKind::Photos, p.album_id)?,
                    title: p.title.clone(),
                    url: p.url.clone(),
                    thumbnail_url: p.thumbnail_url.clone(),
                })
            })
            .collect::<Result<Vec<_>, SeedError>>()?;
        let (_, photo_count) = self
            .insert_phase::<Photo>(data.photos.iter().map(|p| p.id).collect(), photo_drafts)
            .await?;

        let todo_drafts = data
            .todos
            .iter()
            .map(|t| {
                Ok(NewTodo {
                    user_id: users.resolve(EntityKind::Todos, t.user_id)?,
                    title: t.title.clone(),
                    completed: t.completed,
                })
            })
            .collect::<Result<Vec<_>, SeedError>>()?;
        let (_, todo_count) = self
            .insert_phase::<Todo>(data.todos.iter().map(|t| t.id).collect(), todo_drafts)
            .await?;

        let counts = SeedCounts {
            users: user_count,
            posts: post_count,
            comments: comment_count,
            albums: album_count,
            photos: photo_count,
            todos: todo_count,
        };
        info!("Seeded {counts}");
        Ok(counts)
    }

    /// Inserts `drafts` in batches and maps `source_ids` onto the returned rows.
    async fn insert_phase<E: Entity>(
        &self,
        source_ids: Vec<i64>,
        drafts: Vec<E::Draft>,
    ) -> Result<(IdMap, usize), SeedError> {
        let service = Service::<E>::new(Arc::clone(&self.backend));
        info!("Seeding {} {}...", drafts.len(), E::KIND);

        let mut backend_ids = Vec::with_capacity(drafts.len());
        for chunk in drafts.chunks(self.batch_size) {
            let rows = service
                .create_many(chunk)
                .await
                .map_err(|source| SeedError::Insert {
                    kind: E::KIND,
                    source,
                })?;
            if rows.len() != chunk.len() {
                return Err(SeedError::InsertMismatch {
                    kind: E::KIND,
                    sent: chunk.len(),
                    returned: rows.len(),
                });
            }
            backend_ids.extend(rows.iter().map(Entity::id));
            info!("  Inserted {}/{} {}", backend_ids.len(), drafts.len(), E::KIND);
        }

        let map = IdMap::build(E::KIND, &source_ids, &backend_ids)?;
        Ok((map, backend_ids.len()))
    }
}
