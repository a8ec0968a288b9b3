// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use api::*;
pub use error::{ConfigError, FailureKind, FetchError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
