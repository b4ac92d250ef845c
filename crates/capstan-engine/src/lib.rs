//! Capstan Engine - Deployment scheduling and app definition orchestration

pub mod cmd;
pub mod deployer;
pub mod handler;
pub mod locks;
#[cfg(test)]
mod mock;
pub mod trigger;

pub use cmd::CmdDeployer;
pub use deployer::{Deployer, ImageSource};
pub use handler::{Ack, AppData, AppDefinitionHandler, AppDefinitionsView, HandlerConfig};
pub use locks::{AppGuard, AppLocks};
pub use trigger::{DeploymentHandle, DeploymentTrigger};
