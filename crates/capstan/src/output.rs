//! Table and detail output formatting

use capstan_core::{AppDefinitionInfo, Project};
use colored::Colorize;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

/// Print any value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

#[derive(Tabled, Serialize)]
pub struct AppRow {
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "project")]
    pub project: String,
    #[tabled(rename = "×")]
    pub instances: u32,
    #[tabled(rename = "version")]
    pub version: String,
    #[tabled(rename = "status")]
    pub status: String,
    #[tabled(rename = "url")]
    pub url: String,
}

impl AppRow {
    pub fn new(info: &AppDefinitionInfo, root_domain: &str) -> Self {
        let app = &info.definition;
        let status = if info.is_app_building {
            "building".cyan().to_string()
        } else if app.instance_count == 0 {
            "stopped".red().to_string()
        } else {
            "ready".green().to_string()
        };

        AppRow {
            name: app.app_name.clone(),
            project: app.project_id.clone().unwrap_or_else(|| "-".to_string()),
            instances: app.instance_count,
            version: app
                .deployed_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status,
            url: app_url(info, root_domain),
        }
    }
}

/// Public URL of an app, `-` when it is not exposed
pub fn app_url(info: &AppDefinitionInfo, root_domain: &str) -> String {
    let app = &info.definition;
    if app.not_expose_as_web_app {
        return "-".to_string();
    }
    let scheme = if app.force_ssl { "https" } else { "http" };
    match app.custom_domain.first() {
        Some(domain) => format!("{}://{}", scheme, domain.public_domain),
        None => format!("{}://{}.{}", scheme, app.app_name, root_domain),
    }
}

pub fn print_apps_table(apps: &[AppDefinitionInfo], root_domain: &str) {
    if is_json_mode() {
        print_json(apps);
        return;
    }

    if apps.is_empty() {
        println!("No apps registered");
        return;
    }

    let rows: Vec<AppRow> = apps.iter().map(|a| AppRow::new(a, root_domain)).collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();

    println!("{}", table);
}

pub fn print_app_detail(info: &AppDefinitionInfo, root_domain: &str) {
    if is_json_mode() {
        print_json(info);
        return;
    }

    let app = &info.definition;
    println!("{}", "─".repeat(50));
    println!("  {} │ {}", "Name".bold(), app.app_name);
    if !app.description.is_empty() {
        println!("  {} │ {}", "Description".bold(), app.description);
    }
    if let Some(project) = &app.project_id {
        println!("  {} │ {}", "Project".bold(), project);
    }
    println!("  {} │ {}", "URL".bold(), app_url(info, root_domain));
    println!("  {} │ {}", "Instances".bold(), app.instance_count);
    println!(
        "  {} │ {}",
        "Building".bold(),
        if info.is_app_building { "yes".cyan() } else { "no".normal() }
    );
    println!("  {} │ {}", "HTTP Port".bold(), app.container_http_port);
    if app.has_persistent_data {
        println!("  {} │ yes", "Persistent".bold());
    }
    println!("{}", "─".repeat(50));

    if !app.env_vars.is_empty() {
        println!("  {}", "Environment".bold());
        for env in &app.env_vars {
            println!("    {}={}", env.key, env.value);
        }
    }
    if !app.volumes.is_empty() {
        println!("  {}", "Volumes".bold());
        for volume in &app.volumes {
            let source = volume
                .volume_name
                .as_deref()
                .or(volume.host_path.as_deref())
                .unwrap_or("-");
            println!("    {} → {}", source, volume.container_path);
        }
    }
    if !app.ports.is_empty() {
        println!("  {}", "Ports".bold());
        for port in &app.ports {
            println!("    {} → {}", port.host_port, port.container_port);
        }
    }
    if !app.tags.is_empty() {
        let tags: Vec<&str> = app.tags.iter().map(|t| t.tag_name.as_str()).collect();
        println!("  {} │ {}", "Tags".bold(), tags.join(", "));
    }

    if !app.versions.is_empty() {
        println!("  {}", "Versions".bold());
        for version in app.versions.iter().rev() {
            let marker = if app.deployed_version == Some(version.version) {
                "*".green().to_string()
            } else {
                " ".to_string()
            };
            println!(
                "   {} {:>3}  {}  {}",
                marker,
                version.version,
                version.timestamp.format("%Y-%m-%d %H:%M:%S"),
                version.deployed_image_name.as_deref().unwrap_or("-")
            );
        }
    }
    println!("{}", "─".repeat(50));
}

#[derive(Tabled, Serialize)]
pub struct ProjectRow {
    #[tabled(rename = "id")]
    pub id: String,
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "parent")]
    pub parent: String,
    #[tabled(rename = "description")]
    pub description: String,
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        ProjectRow {
            id: project.id.clone(),
            name: project.name.clone(),
            parent: project
                .parent_project_id
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            description: project.description.clone(),
        }
    }
}

pub fn print_projects_table(projects: &[Project]) {
    if is_json_mode() {
        print_json(projects);
        return;
    }

    if projects.is_empty() {
        println!("No projects");
        return;
    }

    let rows: Vec<ProjectRow> = projects.iter().map(ProjectRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_success(message: &str) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "success": true, "message": message }));
    } else {
        println!("{} {}", "✓".green(), message);
    }
}

pub fn print_error(message: &str) {
    if is_json_mode() {
        eprintln!("{}", serde_json::json!({ "success": false, "message": message }));
    } else {
        eprintln!("{} {}", "✗".red(), message);
    }
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

pub fn print_logs(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
