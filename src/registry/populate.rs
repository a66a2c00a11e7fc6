use crate::config::Settings;
use crate::die;
use crate::providers::{ApiError, BackendApi};

use super::registry::{Registry, RegistryOptions};

fn build_registry(settings: &Settings) -> Result<Registry, ApiError> {
    let api = BackendApi::with_api_base(settings.backend_url.as_str())?;

    tracing::debug!(
        provider = %settings.provider,
        backend = %api.api_base(),
        "configured backend"
    );

    Ok(Registry::new(
        api,
        RegistryOptions {
            provider: settings.provider,
            pinned_roles: settings.pinned_roles.clone(),
            discovery_timeout: Some(settings.discovery_timeout),
        },
    ))
}

/// Build the registry for the configured backend. Nothing is requested from the backend
/// until a model is first needed.
pub(crate) fn populated_registry(settings: &Settings) -> Registry {
    match build_registry(settings) {
        Ok(registry) => registry,
        Err(err) => die!("backend URL failed to parse: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Role};
    use crate::config::Config;
    use crate::providers::providers::ProviderKind;
    use crate::providers::{ErrorKind, TextGenerator};
    use crate::registry::discovery::DiscoveryPhase;
    use crate::registry::registry::Availability;
    use crate::utils::stream_backend::unreachable_url;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn settings(provider: &str, url: Option<String>) -> Settings {
        let provider = provider.to_string();

        Settings::resolve(&Config::default(), move |key| match key {
            "AI_PROVIDER" => Some(provider.clone()),
            "BACKEND_URL" => url.clone(),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_default_backend_url() {
        let registry = populated_registry(&settings("gateway", None));

        let resolved = registry.model_for_role(Role::Chat).resolve().await;

        assert_eq!(
            resolved.handle.infer_url().unwrap().as_str(),
            "http://localhost:11434/api/models/chat-model/infer"
        );
        assert_eq!(registry.phase(), DiscoveryPhase::Disabled);
    }

    #[test]
    fn test_invalid_backend_url() {
        let settings = settings("gateway", Some("ftp://models.internal".to_string()));

        assert!(build_registry(&settings).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_discovery_backend() {
        let url = unreachable_url().await;
        let registry = populated_registry(&settings("discovery-backend", Some(url.clone())));

        assert_eq!(registry.provider(), ProviderKind::DiscoveryBackend);
        assert_eq!(registry.available_models().await.len(), 4);
        assert_eq!(registry.available_models().await, catalog::list().to_vec());
        assert!(matches!(
            registry.availability().await,
            Availability::Fallback(_)
        ));

        let chat = registry.model_for_role(Role::Chat);

        assert_eq!(
            chat.resolve().await.handle.infer_url().unwrap().as_str(),
            format!("{}/api/models/chat-model/infer", url)
        );

        let err = chat.generate("hi").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_discovery_backend_default_url() {
        let mut settings = settings("discovery-backend", None);

        assert_eq!(settings.backend_url, "http://localhost:11434");

        // Whatever listens on the default port, a listing this slow counts as failed
        settings.discovery_timeout = Duration::from_millis(1);

        let registry = populated_registry(&settings);

        assert_eq!(registry.provider(), ProviderKind::DiscoveryBackend);
        assert_eq!(registry.available_models().await, catalog::list().to_vec());
        assert_eq!(registry.phase(), DiscoveryPhase::Failed);

        let chat = registry.model_for_role(Role::Chat).resolve().await;

        assert_eq!(
            chat.handle.infer_url().unwrap().as_str(),
            "http://localhost:11434/api/models/chat-model/infer"
        );
    }

    #[tokio::test]
    async fn test_discovery_backend_end_to_end() {
        let server = MockServer::start_async().await;

        let listing = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/models");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"[{"name":"llama3"},{"name":"deepseek-r1"}]"#);
            })
            .await;

        let infer = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/models/deepseek-r1/infer");
                then.status(200).json_body(serde_json::json!({"output": "thinking"}));
            })
            .await;

        let registry = populated_registry(&settings("discovery-backend", Some(server.base_url())));

        let reasoning = registry.model_for_role(Role::Reasoning);
        let result = reasoning.generate("why?").await.unwrap();

        assert_eq!(result.text, "thinking");
        assert_eq!(listing.hits_async().await, 1);
        assert_eq!(infer.hits_async().await, 1);
    }
}
