//! Imports a Receita Federal "Empresas" ZIP archive.

use arko::company_import::{self, DEFAULT_CHUNK_SIZE};
use arko::config::Config;
use arko::db::Database;
use arko::obs;
use clap::Parser;
use std::path::PathBuf;

/// Upsert the companies of an `EmpresasN.zip` archive.
#[derive(Debug, Parser)]
#[command(name = "populate_companies", version)]
struct Args {
    /// Path to the ZIP archive holding the *.EMPRECSV file.
    zip_file_path: PathBuf,

    /// Rows per batched upsert.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("arko=info");
    let args = Args::parse();

    if !args.zip_file_path.is_file() {
        anyhow::bail!("File not found: {}", args.zip_file_path.display());
    }

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    match company_import::import_archive(&db.pool, &args.zip_file_path, args.chunk_size).await {
        Ok(summary) => {
            tracing::info!(
                "{} rows read in {} chunks.",
                summary.rows_processed,
                summary.chunks
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("An error occurred: {}", e);
            tracing::error!("Operation cancelled. No changes were saved to the database.");
            Err(e.into())
        }
    }
}
