//! CLI argument definitions

use capstan_core::constants::DEFAULT_API_URL;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "capstan")]
#[command(version, about = "Manage app definitions and deployments on a Capstan server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL
    #[arg(long, env = "CAPSTAN_URL", default_value = DEFAULT_API_URL, global = true)]
    pub url: String,

    /// API key sent as X-API-Key
    #[arg(long, env = "CAPSTAN_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check server health
    Health,

    /// List app definitions
    Apps,

    /// Show one app definition
    Show {
        /// App name
        app: String,
    },

    /// Register a new app and deploy the placeholder image
    Register(RegisterArgs),

    /// Change settings of an app
    Patch(PatchArgs),

    /// Deploy an image or a Dockerfile
    Deploy(DeployArgs),

    /// Show the build log of an app
    Logs(LogsArgs),

    /// Delete an app and its service
    Delete {
        /// App name
        app: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage projects
    Projects(ProjectsArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    /// App name (lowercase letters, digits and dashes)
    pub app: String,

    /// Project the app belongs to
    #[arg(long)]
    pub project: Option<String>,

    /// App keeps data in volumes
    #[arg(long)]
    pub persistent: bool,

    /// Return before the placeholder deploy finishes
    #[arg(short, long)]
    pub detached: bool,
}

#[derive(Args)]
pub struct PatchArgs {
    /// App name
    pub app: String,

    /// Fields as a JSON object, e.g. '{"instanceCount": 2}'
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,

    /// Read the JSON object from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Replace every mutable field instead of merging
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct DeployArgs {
    /// App name
    pub app: String,

    /// Image to deploy
    #[arg(long, conflicts_with = "dockerfile", required_unless_present = "dockerfile")]
    pub image: Option<String>,

    /// Dockerfile to build and deploy
    #[arg(long)]
    pub dockerfile: Option<PathBuf>,

    /// Commit the image was built from
    #[arg(long)]
    pub git_hash: Option<String>,

    /// Return right after the deploy is scheduled
    #[arg(short, long)]
    pub detached: bool,

    /// Stream the build log until the deploy ends
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args)]
pub struct LogsArgs {
    /// App name
    pub app: String,

    /// Keep polling until the build ends
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    pub command: Option<ProjectsCommand>,
}

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List projects
    List,

    /// Create a project
    Create {
        /// Project name
        name: String,

        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,

        /// Parent project id
        #[arg(long)]
        parent: Option<String>,
    },
}
