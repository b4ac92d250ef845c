//! Command implementations

pub mod apps;
pub mod delete;
pub mod deploy;
pub mod health;
pub mod logs;
pub mod patch;
pub mod projects;
pub mod register;
pub mod show;

use anyhow::Result;

use crate::client::ApiClient;

/// Connection settings shared by every command
pub struct Context {
    pub url: String,
    pub api_key: Option<String>,
}

impl Context {
    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.url, self.api_key.clone())
    }
}
