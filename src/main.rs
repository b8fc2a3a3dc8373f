use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reposnap::config::ConfigLoader;
use reposnap::types::{RunResult, RunStatus};
use reposnap::{HttpUploader, JobSpec, Pipeline};

#[derive(Parser)]
#[command(name = "reposnap")]
#[command(
    version,
    about = "Deterministic repository snapshot pipeline with AI-assisted architecture analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Load configuration from a specific file")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the snapshot pipeline against a repository
    Run {
        #[arg(help = "Path to the checked-out repository")]
        repo: PathBuf,

        #[arg(long, short, help = "Root directory for run bundles")]
        output: Option<PathBuf>,

        #[arg(long, help = "Bundle identifier (defaults to the repo directory name)")]
        id: Option<String>,

        #[arg(long = "dry-run", help = "Write to staging only; skip finalization and upload")]
        dry_run: bool,

        #[arg(long, help = "Mirror the finished bundle to the configured remote store")]
        upload: bool,

        #[arg(long, help = "Glob pattern of paths to include (repeatable)")]
        include: Vec<String>,

        #[arg(long, help = "Glob pattern of paths to exclude (repeatable)")]
        exclude: Vec<String>,

        #[arg(long, help = "Concurrent analysis batches override")]
        concurrency: Option<usize>,

        #[arg(long, help = "Max retries per batch override")]
        max_retries: Option<u8>,
    },

    /// Re-check a persisted bundle against its manifest
    Validate {
        #[arg(help = "Bundle directory to validate")]
        bundle: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize project configuration
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n{}", style("━━━ PANIC ━━━").red().bold());
        eprintln!("{}", style("Reposnap encountered an unexpected error:").red());
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "{}",
                style(format!(
                    "Location: {}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                ))
                .dim()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            repo,
            output,
            id,
            dry_run,
            upload,
            include,
            exclude,
            concurrency,
            max_retries,
        } => {
            let mut config = match &cli.config {
                Some(path) => ConfigLoader::load_from_file(path)?,
                None => ConfigLoader::load()?,
            };

            if let Some(n) = concurrency {
                config.analysis.concurrency = n;
            }
            if let Some(n) = max_retries {
                config.analysis.max_retries = n;
            }

            let output_root = output.unwrap_or_else(|| config.output.root.clone());
            let upload_enabled = upload || config.upload.enabled;

            let mut spec = JobSpec::new(&repo, &output_root)
                .with_dry_run(dry_run)
                .with_upload(upload_enabled)
                .with_max_file_bytes(config.scan.max_file_bytes);
            if let Some(id) = id {
                spec = spec.with_identifier(id);
            }

            let mut include_filters = config.scan.include.clone();
            include_filters.extend(include);
            let mut exclude_filters = config.scan.exclude.clone();
            exclude_filters.extend(exclude);
            spec = spec.with_filters(include_filters, exclude_filters);

            let provider = reposnap::create_provider(&config.completion)?;
            let options = reposnap::CompletionOptions::from_config(&config.completion);
            let batch_config =
                reposnap::BatchConfig::from_config(&config.analysis, &config.completion);

            let mut pipeline = Pipeline::new(spec, provider)
                .with_completion_options(options)
                .with_batch_config(batch_config);

            if upload_enabled && !dry_run {
                pipeline = pipeline.with_uploader(std::sync::Arc::new(HttpUploader::new(
                    &config.upload,
                )?));
            }

            let rt = Runtime::new()?;
            let result = rt.block_on(pipeline.run());

            print_run_summary(&result);

            Ok(match result.status {
                RunStatus::Failed => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }

        Commands::Validate { bundle } => {
            let report = reposnap::validate_bundle(&bundle)?;

            for error in report.errors() {
                eprintln!("{} {}", style("✗").red(), error);
            }
            for warning in report.warnings() {
                println!("{} {}", style("⚠").yellow(), warning);
            }

            if report.is_valid() {
                println!("{} bundle is consistent: {}", style("✓").green(), bundle.display());
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show { json } => ConfigLoader::show_config(json)?,
                ConfigAction::Path => ConfigLoader::show_path(),
                ConfigAction::Init { force } => {
                    let dir = ConfigLoader::init_project(force)?;
                    println!("{} initialized {}", style("✓").green(), dir.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_run_summary(result: &RunResult) {
    println!();
    let status_label = match result.status {
        RunStatus::Success => style("success").green().bold(),
        RunStatus::Partial => style("partial").yellow().bold(),
        RunStatus::Failed => style("failed").red().bold(),
    };
    println!("Run {} finished: {}", result.run_id, status_label);

    for stage in &result.per_stage_status {
        let mark = match stage.outcome {
            reposnap::types::StageOutcome::Ok => style("✓").green(),
            reposnap::types::StageOutcome::Partial => style("◐").yellow(),
            reposnap::types::StageOutcome::Skipped => style("-").dim(),
            reposnap::types::StageOutcome::Failed => style("✗").red(),
        };
        println!("  {} {} ({}ms)", mark, stage.stage, stage.duration_ms);
    }

    if let Some(dir) = &result.output_dir {
        println!("  bundle: {}", dir);
    }
    for warning in &result.warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }
    for error in &result.errors {
        eprintln!("  {} {}", style("✗").red(), error);
    }
}
