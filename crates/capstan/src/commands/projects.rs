//! Projects command implementation

use anyhow::Result;

use crate::cli::{ProjectsArgs, ProjectsCommand};
use crate::output::{is_json_mode, print_json, print_projects_table, print_success};

pub async fn execute(ctx: &super::Context, args: ProjectsArgs) -> Result<()> {
    let client = ctx.client()?;

    match args.command.unwrap_or(ProjectsCommand::List) {
        ProjectsCommand::List => {
            let projects = client.projects().await?;
            print_projects_table(&projects);
        }
        ProjectsCommand::Create {
            name,
            description,
            parent,
        } => {
            let project = client
                .create_project(&name, &description, parent.as_deref())
                .await?;
            if is_json_mode() {
                print_json(&project);
            } else {
                print_success(&format!("Created project {} ({})", project.name, project.id));
            }
        }
    }
    Ok(())
}
