use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::users::{
    memory::MemoryStore,
    repo::{PgStore, TokenStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let Some(url) = config.database_url.clone() else {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data will not persist");
            return Ok(Self::in_memory(config));
        };

        let pool = db::connect(&config, &url).await?;
        db::migrate(&pool).await?;
        let store = PgStore::new(pool);

        Ok(Self {
            config,
            users: Arc::new(store.clone()) as Arc<dyn UserStore>,
            tokens: Arc::new(store) as Arc<dyn TokenStore>,
        })
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let store = MemoryStore::new();
        Self {
            config,
            users: Arc::new(store.clone()) as Arc<dyn UserStore>,
            tokens: Arc::new(store) as Arc<dyn TokenStore>,
        }
    }

    /// In-memory state with default config.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::in_memory(Arc::new(AppConfig::default()))
    }
}
