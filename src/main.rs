use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Declarative, idempotent orchestration of infrastructure provisioning
/// workflows over REST control planes.
#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Run declarative provisioning workflows", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Shorthand for -v
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate input documents and execute the selected workflow
    Run {
        /// Name of a registered workflow
        #[arg(long, conflicts_with = "script")]
        workflow: Option<String>,

        /// Comma-separated script names to run instead of a workflow
        #[arg(long, value_delimiter = ',')]
        script: Vec<String>,

        /// Input document(s), overlaid in order
        #[arg(short = 'f', long = "file", value_delimiter = ',', required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate input documents against a workflow's schema without executing
    Validate {
        /// Name of a registered workflow
        #[arg(long)]
        workflow: String,

        /// Input document(s), overlaid in order
        #[arg(short = 'f', long = "file", value_delimiter = ',', required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbosity = cli.verbose + u8::from(cli.debug);
    let log_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    init_logging(log_level, verbosity);

    debug!("convoy started with verbosity level: {verbosity}");

    let result = match cli.command {
        Commands::Run {
            workflow,
            script,
            files,
        } => run(workflow, script, files).await,
        Commands::Validate { workflow, files } => validate(workflow, files).await,
    };

    if let Err(e) = result {
        error!("fatal: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Console output at the requested level, plus a per-run log file at debug
/// next to the invocation.
fn init_logging(log_level: &str, verbosity: u8) {
    let console = fmt::layer()
        .with_target(verbosity >= 2)
        .with_filter(EnvFilter::new(log_level));

    let log_path = format!(
        "convoy-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );
    match std::fs::File::create(&log_path) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(EnvFilter::new("debug"));
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .init();
            debug!(path = %log_path, "run log file opened");
        }
        Err(e) => {
            tracing_subscriber::registry().with(console).init();
            warn!("could not open run log file {log_path}: {e}");
        }
    }
}

async fn run(
    workflow: Option<String>,
    script: Vec<String>,
    files: Vec<PathBuf>,
) -> convoy::Result<()> {
    let workflow = select_workflow(workflow, &script)?;
    convoy::workflow::WorkflowDriver::new(workflow, files)
        .run()
        .await
}

async fn validate(workflow: String, files: Vec<PathBuf>) -> convoy::Result<()> {
    let workflow = select_workflow(Some(workflow), &[])?;
    let driver = convoy::workflow::WorkflowDriver::new(workflow, files);
    let report = driver.validate().await?;
    if report.is_valid() {
        println!("Input documents are valid.");
        Ok(())
    } else {
        for error in &report.errors {
            eprintln!("  {error}");
        }
        Err(convoy::Error::Validation(format!(
            "{} problem(s) found",
            report.errors.len()
        )))
    }
}

fn select_workflow(
    workflow: Option<String>,
    script: &[String],
) -> convoy::Result<convoy::workflow::Workflow> {
    match (workflow, script.is_empty()) {
        (Some(name), _) => convoy::workflow::lookup(&name).ok_or_else(|| {
            convoy::Error::Workflow(format!("no workflow named {name:?} is registered"))
        }),
        (None, false) => convoy::workflow::ad_hoc(script),
        (None, true) => Err(convoy::Error::Workflow(
            "either --workflow or --script must be given".to_string(),
        )),
    }
}
