//! tablecat-configs
//!
//! Catalog configuration types and loader for tablecat.

pub mod config;

pub use config::*;
pub use config::defaults;
