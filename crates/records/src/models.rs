use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

/// The six tables managed by the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Users,
    Posts,
    Comments,
    Albums,
    Photos,
    Todos,
}

/// A many-to-one reference from a child table to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub parent: EntityKind,
}

impl EntityKind {
    /// Parents before children, the only order inserts can succeed in.
    pub const INSERT_ORDER: [EntityKind; 6] = [
        EntityKind::Users,
        EntityKind::Posts,
        EntityKind::Comments,
        EntityKind::Albums,
        EntityKind::Photos,
        EntityKind::Todos,
    ];

    /// Every child table before the table it references.
    pub const DELETE_ORDER: [EntityKind; 6] = [
        EntityKind::Todos,
        EntityKind::Photos,
        EntityKind::Comments,
        EntityKind::Albums,
        EntityKind::Posts,
        EntityKind::Users,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Posts => "posts",
            EntityKind::Comments => "comments",
            EntityKind::Albums => "albums",
            EntityKind::Photos => "photos",
            EntityKind::Todos => "todos",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            EntityKind::Users => "user",
            EntityKind::Posts => "post",
            EntityKind::Comments => "comment",
            EntityKind::Albums => "album",
            EntityKind::Photos => "photo",
            EntityKind::Todos => "todo",
        }
    }

    pub fn foreign_key(self) -> Option<ForeignKey> {
        let (field, parent) = match self {
            EntityKind::Users => return None,
            EntityKind::Posts => ("user_id", EntityKind::Users),
            EntityKind::Comments => ("post_id", EntityKind::Posts),
            EntityKind::Albums => ("user_id", EntityKind::Users),
            EntityKind::Photos => ("album_id", EntityKind::Albums),
            EntityKind::Todos => ("user_id", EntityKind::Users),
        };
        Some(ForeignKey { field, parent })
    }

    /// Kinds whose foreign key points at `self`.
    pub fn children(self) -> impl Iterator<Item = EntityKind> {
        Self::INSERT_ORDER
            .into_iter()
            .filter(move |kind| kind.foreign_key().is_some_and(|fk| fk.parent == self))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::INSERT_ORDER
            .into_iter()
            .find(|kind| {
                kind.table().eq_ignore_ascii_case(s) || kind.singular().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

/// Ties a row type to its insert payload and table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Fields accepted on insert: everything except id and timestamps.
    type Draft: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> i64;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geo {
    pub lat: String,
    pub lng: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub geo: Geo,
}

/// Stored with the source's camel-case keys, as the JSON column has always held them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub catch_phrase: String,
    pub bs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
    pub company: Option<Company>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
    pub company: Option<Company>,
}

impl Entity for User {
    type Draft = NewUser;
    const KIND: EntityKind = EntityKind::Users;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

impl Entity for Post {
    type Draft = NewPost;
    const KIND: EntityKind = EntityKind::Posts;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

impl Entity for Comment {
    type Draft = NewComment;
    const KIND: EntityKind = EntityKind::Comments;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlbum {
    pub user_id: i64,
    pub title: String,
}

impl Entity for Album {
    type Draft = NewAlbum;
    const KIND: EntityKind = EntityKind::Albums;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub album_id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub album_id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}

impl Entity for Photo {
    type Draft = NewPhoto;
    const KIND: EntityKind = EntityKind::Photos;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTodo {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl Entity for Todo {
    type Draft = NewTodo;
    const KIND: EntityKind = EntityKind::Todos;

    fn id(&self) -> i64 {
        self.id
    }
}
