//! doc-migrate CLI - declarative field migrations for document collections.

use clap::{ArgAction, Parser};
use doc_migrate::{
    JsonFileStore, MigrateError, MigrationConfig, RunOptions, Runner, StoreCredentials,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "doc-migrate")]
#[command(about = "Declarative field migrations for document-database collections")]
#[command(version)]
struct Cli {
    /// Path to YAML migration config
    #[arg(short, long, env = "MIGRATE_CONFIG")]
    config: PathBuf,

    /// Simulate the run without committing writes; pass `--dry-run false`
    /// to apply changes for real
    #[arg(
        long,
        env = "DRY_RUN",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    dry_run: bool,

    /// Maximum buffered writes per atomic batch; overrides the config
    /// value [engine default: 400]
    #[arg(long, env = "BATCH_LIMIT")]
    batch_limit: Option<usize>,

    /// Output JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let config = MigrationConfig::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    // Credentials come from the environment; the engine itself never
    // reads ambient state.
    let credentials = StoreCredentials::from_env()?;
    let store = JsonFileStore::open(&credentials.data_dir)?;

    let options = RunOptions {
        dry_run: cli.dry_run,
        batch_limit: cli.batch_limit,
    };
    let report = Runner::new(&store, options).run(&config).await?;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        let status = if report.dry_run {
            "Dry run completed!"
        } else {
            "Migration completed!"
        };
        println!("\n{}", status);
        println!("  Name: {}", report.name);
        println!("  Duration: {:.2}s", report.duration_seconds);
        println!("  Batch limit: {}", report.batch_limit);
        println!("  Batch commits: {}", report.batch_commits);
        for (collection, stats) in &report.collections {
            println!(
                "  {}: scanned {} (updated {}, unchanged {})",
                collection, stats.scanned, stats.updated, stats.unchanged
            );
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
