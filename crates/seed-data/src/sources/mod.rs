//! Where sample data comes from.
//!
//! [`PlaceholderClient`] fetches the six JSONPlaceholder collections. Their
//! items carry source-assigned ids and camel-case reference fields.

mod placeholder;

pub use placeholder::{
    DEFAULT_ENDPOINT, PlaceholderClient, SourceAlbum, SourceComment, SourceData, SourceError,
    SourcePhoto, SourcePost, SourceTodo, SourceUser,
};
