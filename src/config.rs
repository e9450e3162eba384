use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.db_max_connections);
        let host = std::env::var("APP_HOST").unwrap_or(defaults.host);
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("APP_PORT must be a port number: {e}"))?,
            Err(_) => defaults.port,
        };
        Ok(Self {
            database_url,
            db_max_connections,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_joins_host_and_port() {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..AppConfig::default()
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert!(config.database_url.is_none());
    }
}
