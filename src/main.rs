use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use patient_loader::config::{ConfigOverrides, MigrationConfig};
use patient_loader::logging;
use patient_loader::pipeline::{MigrationReport, Pipeline, RunState};
use patient_loader::storage::{open_store, wait_until_ready};

#[derive(Parser)]
#[command(name = "patient_loader")]
#[command(about = "Load the healthcare patient dataset into a document store")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (defaults to $PATIENT_LOADER_CONFIG when set)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the JSON log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Store URI, e.g. sqlite://data or memory://
    #[arg(long)]
    store_uri: Option<String>,
    /// Database name
    #[arg(long)]
    db_name: Option<String>,
    /// Collection name
    #[arg(long)]
    collection: Option<String>,
    /// Seconds to wait for the store before giving up
    #[arg(long)]
    wait_timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the collection and load the input file into it
    Migrate {
        /// Input CSV file
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
        /// Skip waiting for the store to come up
        #[arg(long)]
        no_wait: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Only wait until the store is reachable
    Wait {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn overrides(
    store: StoreArgs,
    input: Option<PathBuf>,
    log_dir: Option<PathBuf>,
) -> ConfigOverrides {
    ConfigOverrides {
        input_path: input,
        store_uri: store.store_uri,
        database: store.db_name,
        collection: store.collection,
        wait_timeout_secs: store.wait_timeout_secs,
        log_dir,
    }
}

fn print_report(report: &MigrationReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\n📊 Migration Results:");
    println!("   Rows read: {}", report.rows_read);
    println!(
        "   Skipped at normalization: {}",
        report.skipped_at_normalization
    );
    println!("   Duplicates removed: {}", report.duplicates_removed);
    println!("   Skipped at conversion: {}", report.skipped_at_conversion);
    println!("   Inserted: {}", report.inserted);

    if !report.skips.is_empty() {
        println!("\n⚠️  Skipped rows:");
        for skip in &report.skips {
            println!("   - line {} ({}): {}", skip.line, skip.stage, skip.reason);
        }
    }
    if report.is_empty() && report.states.last() == Some(&RunState::Closed) {
        println!("\n⚠️  No data to insert");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = MigrationConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Migrate {
            input,
            store,
            no_wait,
            json,
        } => {
            config.apply_overrides(overrides(store, input, cli.log_dir));
            let _guard = logging::init_logging(&config.log_dir, "patient_loader.log");

            println!(
                "🚀 Migrating {} into {}/{}",
                config.input_path.display(),
                config.store.database,
                config.store.collection
            );
            let store = open_store(&config.store)?;

            if !no_wait {
                if let Err(e) = wait_until_ready(
                    store.as_ref(),
                    config.wait_timeout(),
                    config.wait_interval(),
                )
                .await
                {
                    store.close();
                    println!("❌ Store did not become available: {}", e);
                    return Err(e.into());
                }
            }

            match Pipeline::new(&config.input_path).run(store.as_ref()).await {
                Ok(report) => {
                    print_report(&report, json)?;
                    println!("✅ Migration completed");
                }
                Err(failed) => {
                    error!("Migration failed: {}", failed.error);
                    print_report(&failed.report, json)?;
                    println!("❌ Migration failed: {}", failed.error);
                    return Err(failed.into());
                }
            }
        }
        Commands::Wait { store } => {
            config.apply_overrides(overrides(store, None, cli.log_dir));
            let _guard = logging::init_logging(&config.log_dir, "patient_loader.log");

            let store = open_store(&config.store)?;
            let result = wait_until_ready(
                store.as_ref(),
                config.wait_timeout(),
                config.wait_interval(),
            )
            .await;
            store.close();
            match result {
                Ok(()) => println!("✅ Store is ready"),
                Err(e) => {
                    println!("❌ Timed out waiting for the store: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
