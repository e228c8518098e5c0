//! Imports regions, states, municipalities and districts from the IBGE API.

use arko::config::Config;
use arko::db::Database;
use arko::ibge::IbgeClient;
use arko::{ibge_import, obs};
use clap::Parser;

/// Populate the geography tables from the IBGE localities API.
///
/// Existing rows are kept; the whole import is one transaction.
#[derive(Debug, Parser)]
#[command(name = "populate_ibge", version)]
struct Args {
    /// Override the IBGE API base URL (default: IBGE_API_URL or the public endpoint).
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("arko=info");
    let args = Args::parse();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    let client = match args.api_url {
        Some(url) => IbgeClient::with_base_url(url)?,
        None => IbgeClient::new(&config)?,
    };

    match ibge_import::run(&db.pool, &client).await {
        Ok(summary) => {
            tracing::info!(
                "Created {} regions, {} states, {} municipalities, {} districts.",
                summary.regions_created,
                summary.states_created,
                summary.municipalities_created,
                summary.districts_created
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("An error occurred during import: {}", e);
            tracing::error!("Operation cancelled. No changes were saved to the database.");
            Err(e.into())
        }
    }
}
