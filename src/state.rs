use crate::auth::{
    memory::MemoryCredentialStore,
    repo::{CredentialStore, PgCredentialStore},
};
use crate::config::AppConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let pg = PgCredentialStore::connect(url, config.database_max_connections).await?;
                info!("using postgres credential store");
                Arc::new(pg) as Arc<dyn CredentialStore>
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryCredentialStore::new()) as Arc<dyn CredentialStore>
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn CredentialStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory store with a fixed JWT config.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            database_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        });
        Self::from_parts(Arc::new(MemoryCredentialStore::new()), config)
    }
}
