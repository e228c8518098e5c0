//! Creates a login account for the HTML views.

use anyhow::Context;
use arko::auth::hash_password;
use arko::config::Config;
use arko::db::Database;
use arko::{obs, storage};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "create_user", version)]
struct Args {
    username: String,

    /// Password; falls back to ARKO_PASSWORD.
    #[arg(long, env = "ARKO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Reset the password of an existing account instead of failing.
    #[arg(long)]
    update: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("arko=info");
    let args = Args::parse();

    let username = args.username.trim();
    if username.is_empty() || username.len() > 150 {
        anyhow::bail!("username must be 1-150 characters");
    }
    if args.password.is_empty() {
        anyhow::bail!("password cannot be empty");
    }

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let password_hash = hash_password(&args.password);

    if let Some(id) = storage::create_user(&db.pool, username, &password_hash)
        .await
        .context("creating user")?
    {
        tracing::info!("Created user '{}' (id {})", username, id);
        return Ok(());
    }

    if !args.update {
        anyhow::bail!("user '{}' already exists (use --update to reset its password)", username);
    }

    if storage::set_password(&db.pool, username, &password_hash)
        .await
        .context("updating password")?
    {
        tracing::info!("Password of '{}' updated", username);
        Ok(())
    } else {
        anyhow::bail!("user '{}' could not be updated", username)
    }
}
