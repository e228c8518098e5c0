use serde::Deserialize;

/// Public IBGE localities endpoint.
pub const DEFAULT_IBGE_API_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";

/// Two weeks, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1_209_600;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub ibge_api_url: String,
    pub session_ttl_secs: u64,
    pub session_cookie_secure: bool,
    pub api_require_login: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            ibge_api_url: std::env::var("IBGE_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("IBGE_API_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_IBGE_API_URL.to_string()),
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|ttl| *ttl > 0)
                        .ok_or_else(|| {
                            anyhow::anyhow!("SESSION_TTL_SECS must be a positive number of seconds")
                        })
                })
                .transpose()?
                .unwrap_or(DEFAULT_SESSION_TTL_SECS),
            session_cookie_secure: env_flag("SESSION_COOKIE_SECURE")?,
            api_require_login: env_flag("API_REQUIRE_LOGIN")?,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        tracing::debug!("IBGE API URL: {}", config.ibge_api_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.api_require_login {
            tracing::info!("JSON API requires an authenticated session");
        }

        Ok(config)
    }
}

/// Reads a boolean switch; unset means `false`.
fn env_flag(name: &str) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value)
            .ok_or_else(|| anyhow::anyhow!("{} must be one of true/false/1/0/yes/no", name)),
        Err(_) => Ok(false),
    }
}

/// First 20 characters of a URL, for logs.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_flag, url_prefix};

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" yes "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn logged_url_prefix_respects_char_boundaries() {
        // 'ã' straddles byte 20.
        let url = "postgresql://joão:ãé@db/arko";
        assert!(!url.is_char_boundary(20));
        assert_eq!(url_prefix(url), "postgresql://joão:ãé");
        assert_eq!(url_prefix("pg://x"), "pg://x");
    }
}
