//! Reqforge command line front end
//!
//! Thin wrapper over [`reqforge::Workbench`]: every subcommand runs inside a
//! telemetry session that is always closed on the way out.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reqforge::constants::{APP_NAME, APP_VERSION, LOG_FILE};
use reqforge::{AppConfig, Request, Storage, Workbench};

#[derive(Debug, Parser)]
#[command(name = "reqforge")]
#[command(version, about = "Define, run and export HTTP requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the store and log file
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Telemetry webhook URL
    #[arg(long, global = true)]
    webhook: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List projects
    Projects,
    /// Create a project
    NewProject {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Create a request in a project
    NewRequest {
        project: u64,
        method: String,
        url: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Import a cURL command into a project
    Import { project: u64, curl: String },
    /// Execute a request and print the outcome
    Run { id: u64 },
    /// Render a request as raw, curl, fetch or python
    Format { id: u64, format: String },
    /// Show recent executions of a request
    History { id: u64 },
    /// Show or set the request timeout in seconds
    Timeout { seconds: Option<i64> },
    /// Turn telemetry on or off
    Telemetry {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().with_overrides(cli.data_dir.clone(), cli.webhook.clone());

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(&config.data_dir, LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!(
        version = APP_VERSION,
        data_dir = %config.data_dir.display(),
        "{} starting",
        APP_NAME
    );

    let storage = Storage::open(&config.data_dir)
        .with_context(|| format!("opening store in {}", config.data_dir.display()))?;
    let mut bench = Workbench::new(Arc::new(storage), &config);

    bench.startup().await;
    let result = run(&bench, cli.command).await;
    bench.shutdown().await;
    result
}

async fn run(bench: &Workbench, command: Command) -> Result<()> {
    match command {
        Command::Projects => {
            for project in bench.list_projects()? {
                println!("{:>4}  {}", project.id, project.name);
                for request in bench.list_requests(project.id)? {
                    println!("      {:>4}  {:<7} {}", request.id, request.method, request.url);
                }
            }
        }
        Command::NewProject { name, description } => {
            let project = bench.create_project(&name, &description)?;
            println!("Created project {}", project.id);
        }
        Command::NewRequest {
            project,
            method,
            url,
            name,
        } => {
            bench
                .get_project(project)
                .with_context(|| format!("project {}", project))?;
            let mut request = Request::new(method.to_uppercase(), url);
            request.project_id = project;
            if let Some(name) = name {
                request.name = name;
            }
            let request = bench.create_request(request)?;
            println!("Created request {}", request.id);
        }
        Command::Import { project, curl } => {
            bench
                .get_project(project)
                .with_context(|| format!("project {}", project))?;
            let request = bench.import_curl(project, &curl)?;
            println!("Imported request {} ({} {})", request.id, request.method, request.url);
        }
        Command::Run { id } => {
            let outcome = bench.execute_request(id).await?;
            println!(
                "{} {}  {} ms  {} bytes",
                outcome.status, outcome.status_text, outcome.duration_ms, outcome.size
            );
            for (name, value) in &outcome.headers {
                println!("{}: {}", name, value);
            }
            println!();
            println!("{}", outcome.body);
        }
        Command::Format { id, format } => {
            println!("{}", bench.get_format(id, &format)?);
        }
        Command::History { id } => {
            for entry in bench.list_history(id)? {
                println!(
                    "{:>4}  {}  {} {}  {} ms",
                    entry.id,
                    entry.executed_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.outcome.status,
                    entry.outcome.status_text,
                    entry.outcome.duration_ms
                );
            }
        }
        Command::Timeout { seconds } => {
            let current = match seconds {
                Some(seconds) => bench.set_request_timeout(seconds)?,
                None => bench.request_timeout_seconds(),
            };
            println!("Request timeout: {}s", current);
        }
        Command::Telemetry { state } => {
            bench.set_telemetry_enabled(state == "on");
            println!("Telemetry {}", state);
        }
    }
    Ok(())
}
