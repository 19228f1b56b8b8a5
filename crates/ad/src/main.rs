mod config;
mod telemetry;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use ad_core::validation::validate_epic_key;
use ad_core::{ChangelogPipeline, JobManager, RunLog};
use ad_events::EventBus;
use ad_serve::AppState;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "ad", version, about = "Generates engineering changelogs for Jira epics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP job service.
    Serve {
        #[arg(long, env = "AUTODOC_PORT", default_value_t = 5000)]
        port: u16,
        #[arg(long, env = "AUTODOC_MAX_JOBS", default_value_t = 4)]
        max_jobs: usize,
        #[command(flatten)]
        config: Config,
    },
    /// Run the pipeline for one epic in the foreground.
    Run {
        epic_key: String,
        /// Skip repository scanning and summarize the archived diffs.
        #[arg(long)]
        no_scan: bool,
        /// Also write the final summary to this file.
        #[arg(long, env = "CHANGELOG_OUTPUT_FILE")]
        output: Option<PathBuf>,
        #[command(flatten)]
        config: Config,
    },
    /// Print the OpenAPI document.
    Openapi,
}

struct ConsoleLog;

impl RunLog for ConsoleLog {
    fn append(&self, message: String) {
        println!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init();

    match cli.command {
        Command::Serve {
            port,
            max_jobs,
            config,
        } => {
            let pipeline = config.build_pipeline(config.settings(true, None))?;
            let jobs = JobManager::new(Arc::new(pipeline), EventBus::new(1024), max_jobs.max(1));
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);

            ad_serve::serve(AppState::new(jobs.clone()), addr, shutdown_signal())
                .await
                .context("http server failed")?;
            info!("waiting for in-flight jobs");
            jobs.shutdown().await;
        }
        Command::Run {
            epic_key,
            no_scan,
            output,
            config,
        } => {
            let epic_key = validate_epic_key(&epic_key)?;
            let pipeline = config.build_pipeline(config.settings(!no_scan, output))?;
            let url = pipeline
                .run(epic_key, &ConsoleLog)
                .await
                .with_context(|| format!("changelog generation failed for {epic_key}"))?;
            match url {
                Some(url) => println!("Confluence page: {url}"),
                None => println!("Completed, but no Confluence URL was returned."),
            }
        }
        Command::Openapi => {
            println!("{}", ad_serve::openapi::generate_spec());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
