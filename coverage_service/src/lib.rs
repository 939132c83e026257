//! Coverage tracking service: records CI coverage reports per commit and
//! serves a coverage badge per project.

#[cfg(feature = "web")]
mod api;
pub mod badge;
mod config;
pub mod error;
pub mod identity;
pub mod ingestion;
pub mod models;
pub mod repository;
pub mod store;
pub mod validation;

pub use badge::BadgeService;
pub use config::Config;
pub use error::{CoverageError, Result};
pub use ingestion::JobIngestion;
pub use repository::Repositories;
pub use store::{DocumentStore, MemoryStore, SqliteStore};

#[cfg(feature = "web")]
pub use api::{routes, AppState};
