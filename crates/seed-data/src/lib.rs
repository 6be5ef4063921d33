//! Sample data import for the records backend.
//!
//! Fetches the JSONPlaceholder collections and loads them into any
//! [`records::Backend`], translating source ids into backend ids.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use seed_data::prelude::*;
//!
//! let backend = BackendTarget::from_env()?.connect();
//! let counts = Seeder::new(backend)
//!     .with_batch_size(500)
//!     .seed_from(&PlaceholderClient::new())
//!     .await?;
//! ```

pub mod config;
pub mod db;
pub mod sources;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::SeedConfig;
    pub use crate::db::{IdMap, SeedCounts, SeedError, Seeder};
    pub use crate::sources::{PlaceholderClient, SourceData, SourceError};
    pub use records::BackendTarget;
}
