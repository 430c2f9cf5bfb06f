use std::str::FromStr;

use leaseq_core::AppError;

/// Which [`ItemStore`](leaseq_core::ItemStore) the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    /// Process-local and lost on restart. For development and demos.
    Memory,
}

impl FromStr for StoreKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(AppError::ConfigError(format!(
                "Invalid LEASEQ_STORE '{other}': expected 'postgres' or 'memory'"
            ))),
        }
    }
}

/// Listener and access settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token required on `/v1/*`. `None` leaves the API open.
    pub api_key: Option<String>,
    pub store: StoreKind,
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `LEASEQ_SERVER_PORT` (optional, defaults to 3000)
    /// - `LEASEQ_API_KEY` (optional)
    /// - `LEASEQ_STORE` (optional, `postgres` or `memory`, defaults to `postgres`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match lookup("LEASEQ_SERVER_PORT") {
            None => 3000,
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid LEASEQ_SERVER_PORT '{raw}'"))
            })?,
        };
        let api_key = lookup("LEASEQ_API_KEY").filter(|key| !key.trim().is_empty());
        let store = lookup("LEASEQ_STORE")
            .map(|raw| raw.parse::<StoreKind>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            port,
            api_key,
            store,
        })
    }
}
