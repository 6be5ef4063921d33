pub mod backend;
pub mod cache;
pub mod config;
pub mod errors;
pub mod manager;
pub mod memory;
pub mod models;
pub mod query;
pub mod rest;
pub mod service;
pub mod status;
pub mod views;

pub use backend::{Backend, Filter, Record};
pub use cache::QueryCache;
pub use config::{BackendConfig, BackendTarget, ConfigError};
pub use errors::{ServiceError, ServiceResult};
pub use manager::RecordManager;
pub use memory::MemoryBackend;
pub use models::{Entity, EntityKind};
pub use rest::RestBackend;
pub use service::{RecordService, Service};
