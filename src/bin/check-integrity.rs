use clap::Parser;
use std::path::PathBuf;

use patient_loader::config::{ConfigOverrides, MigrationConfig};
use patient_loader::integrity::IntegrityChecker;
use patient_loader::logging;
use patient_loader::storage::open_store;

#[derive(Parser)]
#[command(name = "check-integrity")]
#[command(about = "Verify the loaded patient collection")]
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = MigrationConfig::load(cli.config.as_deref())?;
    config.apply_overrides(ConfigOverrides {
        store_uri: cli.store_uri,
        database: cli.db_name,
        collection: cli.collection,
        ..Default::default()
    });
    let _guard = logging::init_logging(&config.log_dir, "check_integrity.log");

    println!("🔍 Checking data integrity");
    println!("{}", "=".repeat(60));

    let store = open_store(&config.store)?;
    let result = IntegrityChecker::new(store.as_ref()).run().await;
    store.close();
    let report = result?;

    for (i, check) in report.checks.iter().enumerate() {
        let mark = if check.passed { "✅" } else { "❌" };
        println!(
            "   {} Check {}: {} ({})",
            mark,
            i + 1,
            check.name,
            check.detail
        );
    }

    if report.passed() {
        println!("\n✅ All data integrity checks passed!");
        Ok(())
    } else {
        let failed: Vec<&str> = report.failures().map(|c| c.name).collect();
        println!("\n❌ {} check(s) failed", failed.len());
        anyhow::bail!("integrity checks failed: {}", failed.join(", "))
    }
}
