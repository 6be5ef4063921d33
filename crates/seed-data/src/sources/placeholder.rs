//! JSONPlaceholder client for fetching the sample collections.

use records::EntityKind;
use records::models::{Address, Company};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub company: Option<Company>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePost {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceComment {
    pub id: i64,
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAlbum {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePhoto {
    pub id: i64,
    pub album_id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTodo {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub completed: bool,
}

/// The six collections as the source serves them; ids are source-assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceData {
    pub users: Vec<SourceUser>,
    pub posts: Vec<SourcePost>,
    pub comments: Vec<SourceComment>,
    pub albums: Vec<SourceAlbum>,
    pub photos: Vec<SourcePhoto>,
    pub todos: Vec<SourceTodo>,
}

/// Client for the JSONPlaceholder REST API.
pub struct PlaceholderClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for PlaceholderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderClient {
    /// Creates a client for the public endpoint.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Sets a custom endpoint (a mirror, or a mock server in tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches one collection, e.g. `GET /posts`.
    async fn fetch<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>, SourceError> {
        let url = format!("{}/{}", self.endpoint, kind.table());
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let items: Vec<T> = serde_json::from_str(&text)?;
        debug!("Fetched {} {} from {}", items.len(), kind, url);
        Ok(items)
    }

    /// Fetches all six collections concurrently; the first failure wins.
    pub async fn fetch_all(&self) -> Result<SourceData, SourceError> {
        let (users, posts, comments, albums, photos, todos) = tokio::try_join!(
            self.fetch::<SourceUser>(EntityKind::Users),
            self.fetch::<SourcePost>(EntityKind::Posts),
            self.fetch::<SourceComment>(EntityKind::Comments),
            self.fetch::<SourceAlbum>(EntityKind::Albums),
            self.fetch::<SourcePhoto>(EntityKind::Photos),
            self.fetch::<SourceTodo>(EntityKind::Todos),
        )?;

        Ok(SourceData {
            users,
            posts,
            comments,
            albums,
            photos,
            todos,
        })
    }
}
