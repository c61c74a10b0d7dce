// Core modules
pub mod broker;
pub mod db;
pub mod engine;
pub mod models;
pub mod notify;
pub mod quotes;

// Re-export commonly used types
pub use engine::*;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
