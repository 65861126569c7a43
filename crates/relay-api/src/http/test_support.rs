//! App state over a temp database for router tests.

use relay_core::llm::box_provider::BoxLlmProvider;
use relay_core::llm::gateway::ModelGateway;
use relay_core::testing::ScriptedProvider;
use relay_infra::sqlite::pool::DatabasePool;
use relay_types::config::RelayConfig;
use tempfile::TempDir;

use crate::state::AppState;

/// App state whose only provider is `local`. Keep the `TempDir` alive for the test.
pub async fn test_state(local: ScriptedProvider) -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("relay.db").display());
    let pool = DatabasePool::new(&url).await.unwrap();
    let gateway = ModelGateway::new(BoxLlmProvider::new(local), None, vec!["gpt".into()]);
    let state = AppState::from_parts(RelayConfig::default(), pool, gateway);
    (dir, state)
}
