//! Application state wiring the relay together.
//!
//! The relay pump is generic over its transcript store; AppState pins it to
//! the SQLite implementation from relay-infra.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use relay_core::llm::gateway::{ModelGateway, ProviderHealth};
use relay_core::relay::pump::{PumpSettings, RelayPump};
use relay_core::relay::registry::SessionRegistry;
use relay_core::relay::stats::RelayStats;
use relay_infra::config::RuntimeConfig;
use relay_infra::llm::build_gateway;
use relay_infra::sqlite::chat::SqliteTranscriptStore;
use relay_infra::sqlite::pool::DatabasePool;
use relay_types::config::RelayConfig;

/// Relay pump pinned to the SQLite transcript store.
pub type ConcretePump = RelayPump<SqliteTranscriptStore>;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pump: Arc<ConcretePump>,
    pub config: Arc<RelayConfig>,
    pub started_at: Instant,
}

/// Reachability of the database and both providers.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub database: ComponentHealth,
    pub providers: Vec<ProviderHealth>,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// Database reachable and every configured provider answering.
    pub fn healthy(&self) -> bool {
        self.database.healthy
            && self
                .providers
                .iter()
                .filter(|p| p.configured)
                .all(|p| p.healthy)
    }
}

impl AppState {
    /// Open the database, build the gateway and wire the pump.
    pub async fn init(runtime: RuntimeConfig) -> anyhow::Result<Self> {
        let RuntimeConfig {
            config,
            cloud_api_key,
        } = runtime;

        let db_pool = DatabasePool::new(&config.database.url).await?;
        let gateway = build_gateway(&config.providers, cloud_api_key)?;

        Ok(Self::from_parts(config, db_pool, gateway))
    }

    /// Wire the pump from already-built parts.
    pub fn from_parts(config: RelayConfig, db_pool: DatabasePool, gateway: ModelGateway) -> Self {
        let pump = RelayPump::new(
            Arc::new(SqliteTranscriptStore::new(db_pool)),
            Arc::new(gateway),
            Arc::new(SessionRegistry::new(config.relay.channel_capacity)),
            Arc::new(RelayStats::new()),
            PumpSettings::from(&config.relay),
        );

        Self {
            pump: Arc::new(pump),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &SqliteTranscriptStore {
        self.pump.store()
    }

    /// Probe the database and the providers.
    pub async fn health_report(&self) -> HealthReport {
        let database = match self.store().pool().ping().await {
            Ok(()) => ComponentHealth {
                healthy: true,
                error: None,
            },
            Err(e) => ComponentHealth {
                healthy: false,
                error: Some(e.to_string()),
            },
        };
        let providers = self.pump.gateway().health().await;

        HealthReport {
            database,
            providers,
        }
    }
}
