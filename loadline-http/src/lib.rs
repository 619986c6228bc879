//! Request executors for loadline
//!
//! [`HttpExecutor`] sends journey requests to the target with reqwest;
//! [`OfflineExecutor`] answers them from canned responses so profiles can be
//! exercised without a target.

pub mod client;
pub mod config;
pub mod errors;
pub mod mock;

// Re-export main types for convenience
pub use client::HttpExecutor;
pub use config::{HttpConfig, DEFAULT_MAX_REDIRECTS};
pub use errors::{HttpError, HttpResult};
pub use mock::OfflineExecutor;
