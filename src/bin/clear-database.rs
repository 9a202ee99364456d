use clap::Parser;
use std::path::PathBuf;

use patient_loader::config::{ConfigOverrides, MigrationConfig};
use patient_loader::storage::open_store;

#[derive(Parser)]
#[command(name = "clear-database")]
#[command(about = "Delete every document in the patient collection")]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    store_uri: Option<String>,
    #[arg(long)]
    db_name: Option<String>,
    #[arg(long)]
    collection: Option<String>,
    /// Do not ask for confirmation
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = MigrationConfig::load(cli.config.as_deref())?;
    config.apply_overrides(ConfigOverrides {
        store_uri: cli.store_uri,
        database: cli.db_name,
        collection: cli.collection,
        ..Default::default()
    });

    println!(
        "⚠️  WARNING: This will delete ALL documents from {}/{}!",
        config.store.database, config.store.collection
    );
    if !cli.yes {
        println!("Press Enter to continue or Ctrl+C to cancel...");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
    }

    println!("🗑️  Clearing collection...");
    let store = open_store(&config.store)?;
    let result = store.clear().await;
    store.close();

    println!("✅ Removed {} documents", result?);
    Ok(())
}
