//! Loading fetched sample data into the backend.
//!
//! The [`Seeder`] clears the tables, inserts in dependency order, and remaps
//! every foreign key from source ids to the ids the backend assigned.

mod seeder;

pub use seeder::{DEFAULT_BATCH_SIZE, IdMap, SeedCounts, SeedError, Seeder};
