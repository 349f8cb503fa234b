//! # TSI Common Library
//!
//! Shared code for the TikTok Sound Identifier service:
//! - Error type shared by configuration and startup code
//! - Service configuration model (TOML) and its resolution rules

pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::{Error, Result};
