//! LLM provider implementations.
//!
//! Concrete implementations of the [`LlmProvider`](relay_core::llm::provider::LlmProvider)
//! trait defined in `relay-core`, plus [`build_gateway`], which wires them
//! into a [`ModelGateway`] from configuration.

pub mod ollama;
pub mod openai_compat;

use secrecy::SecretString;
use tracing::info;

use relay_core::llm::box_provider::BoxLlmProvider;
use relay_core::llm::gateway::ModelGateway;
use relay_types::config::ProvidersConfig;
use relay_types::llm::LlmError;

use self::ollama::OllamaProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Build the model gateway.
///
/// The local provider is always present. The cloud provider is only
/// created when an API key is available; without one, cloud-routed models
/// are rejected as input errors.
pub fn build_gateway(
    providers: &ProvidersConfig,
    cloud_api_key: Option<SecretString>,
) -> Result<ModelGateway, LlmError> {
    let local = OllamaProvider::new(&providers.local_base_url)?;
    info!(base_url = %local.base_url(), "local provider configured");

    let cloud = match cloud_api_key {
        Some(key) => {
            let cloud = OpenAiCompatibleProvider::new(&providers.cloud_base_url, key)?;
            info!(base_url = %cloud.base_url(), "cloud provider configured");
            Some(BoxLlmProvider::new(cloud))
        }
        None => {
            info!("no cloud API key set, cloud models disabled");
            None
        }
    };

    Ok(ModelGateway::new(
        BoxLlmProvider::new(local),
        cloud,
        providers.cloud_model_prefixes.clone(),
    ))
}
