// Public modules
pub mod archive;
pub mod clean;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod process;
pub mod release;
pub mod target;
pub mod version;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
