//! Confirms the application is configured and the database is reachable.

use arko::config::Config;
use arko::db::Database;
use arko::obs;
use arko::storage::ListingStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("arko=info");

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    println!("The 'arko' app is correctly configured!");

    let counts = ListingStorage::new(db.pool.clone()).table_counts().await?;
    for (table, count) in counts {
        println!("  {:<16} {:>10}", table, count);
    }

    Ok(())
}
