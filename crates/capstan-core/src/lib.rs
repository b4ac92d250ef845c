//! Capstan Core - Shared types, update merging, configuration, and error handling

pub mod config;
pub mod constants;
pub mod error;
pub mod patch;
pub mod types;

pub use config::*;
pub use constants::*;
pub use error::{Error, Result, StatusCode};
pub use patch::{merge, AppDefinitionPatch, AppDefinitionUpdate, ChangeImpact};
pub use types::*;
