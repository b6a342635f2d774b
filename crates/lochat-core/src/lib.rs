pub mod config;
pub mod error;
pub mod session;
pub mod transcript;

// Re-export common error type
pub use error::{ChatError, Result};
