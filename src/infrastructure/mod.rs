//! Infrastructure layer - external adapters (database, filesystem, HTTP).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod http_api;
pub mod token_store;

pub use config::{config_file_path, ensure_config_exists, load_config, load_config_from_file, save_config};
pub use http_api::HttpApi;
pub use token_store::{MemoryTokenStore, SqliteTokenStore};
