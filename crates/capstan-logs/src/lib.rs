//! Capstan Logs - Rolling per-app build logs and incremental polling

mod buffer;
mod follower;
mod registry;

pub use buffer::{BuildLog, LogChunk};
pub use follower::LogFollower;
pub use registry::{BuildLogRegistry, BuildLogWriter, SharedBuildLog};
