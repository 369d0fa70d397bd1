//! `form-flow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the API server.
//! - `migrate`: run pending database migrations.
//! - `validate`: validate a workflow JSON file.
//! - `test`: dry-run a form's workflow with sample or supplied data.
//! - `submit`: submit form data to a running server.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{AppState, MemoryStore, PgStore, ServiceConfig, SubmissionOrchestrator, SubmissionStore, WorkflowClient};
use engine::transports::PgRecordSink;
use engine::{parse_workflow, validate_json, WorkflowEngine, WorkflowTester};
use steps::models::{FormData, FormDefinition};

use crate::config::StepEnvArgs;

#[derive(Parser)]
#[command(name = "form-flow", about = "Form submission workflow engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,

        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// Keep forms and submissions in process memory instead of Postgres.
        #[arg(long)]
        in_memory: bool,

        /// Base URL used when building status links.
        #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
        public_base_url: String,

        #[command(flatten)]
        step_env: StepEnvArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file (a step list or `{ "workflow": [...] }`).
        path: PathBuf,
    },
    /// Dry-run the workflow of a form definition file.
    Test {
        /// Path to the form JSON file.
        form: PathBuf,

        /// Submission data to use instead of generated samples.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Run the workflow this many times and report timings.
        #[arg(long)]
        iterations: Option<usize>,

        #[command(flatten)]
        step_env: StepEnvArgs,
    },
    /// Submit form data to a running server.
    Submit {
        #[arg(long, env = "FORM_FLOW_API_URL", default_value = "http://localhost:8080")]
        api_url: String,

        form_id: String,

        /// Path to a JSON object of field values.
        data: PathBuf,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, in_memory, public_base_url, step_env } => {
            let environment = step_env.environment();
            let mut transports = config::transports(&environment)?;

            let store: Arc<dyn SubmissionStore> = match database_url {
                Some(url) if !in_memory => {
                    let pool = db::pool::create_pool(&url, db::pool::DEFAULT_MAX_CONNECTIONS)
                        .await
                        .context("failed to connect to database")?;
                    db::pool::run_migrations(&pool).await.context("migration failed")?;
                    transports = transports.with_records(Arc::new(PgRecordSink::new(pool.clone())));
                    Arc::new(PgStore::new(pool))
                }
                _ => {
                    warn!("no database configured; forms and submissions are kept in memory");
                    Arc::new(MemoryStore::new())
                }
            };

            let engine = WorkflowEngine::with_transports(transports, Arc::new(environment));
            let orchestrator = SubmissionOrchestrator::new(store, engine, ServiceConfig::new(public_base_url));
            info!("Starting API server on {bind}");
            api::serve(&bind, AppState::new(orchestrator)).await?;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let body: serde_json::Value = read_json(&path)?;
            let workflow = body.get("workflow").unwrap_or(&body);
            print_json(&validate_json(workflow))?;
            let steps = parse_workflow(workflow).context("workflow rejected")?;
            info!(steps = steps.len(), "Workflow is valid");
        }
        Command::Test { form, data, iterations, step_env } => {
            let form: FormDefinition = read_json(&form)?;
            let test_data: Option<FormData> = data.as_deref().map(read_json::<FormData>).transpose()?;

            let environment = step_env.environment();
            let transports = config::transports(&environment)?;
            let tester = WorkflowTester::new(WorkflowEngine::with_transports(transports, Arc::new(environment)));

            match iterations {
                Some(n) => print_json(&tester.run_repeated(&form, n).await)?,
                None => {
                    let report = tester.test_workflow(&form, test_data).await;
                    print_json(&report)?;
                    if !report.success {
                        bail!("{}", report.message);
                    }
                }
            }
        }
        Command::Submit { api_url, form_id, data } => {
            let data: FormData = read_json(&data)?;
            let response = WorkflowClient::new(api_url)
                .submit(&form_id, &data)
                .await
                .context("submission failed")?;
            print_json(&response)?;
        }
    }

    Ok(())
}
