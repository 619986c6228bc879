//! CLI command implementations

pub mod config;
pub mod profiles;
pub mod run;

pub use config::*;
pub use profiles::*;
pub use run::*;
