use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::aliases::AliasTable;
use super::discovery::{
    discover, DiscoveryCache, DiscoveryCycle, DiscoveryOutcome, DiscoveryPhase, DiscoveryResult,
};
use crate::catalog::{self, ModelDescriptor, Role};
use crate::providers::{
    providers::ProviderKind, AsyncFragmentIterator, BackendApi, Error, GenerationResult,
    ModelHandle, TextGenerator,
};

/// How a requested identifier was bound to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// The identifier names a role bound in the alias table
    Alias(Role),
    /// The backend claimed the identifier during discovery
    Discovered,
    /// The identifier is in the static catalog
    Catalog,
    /// Nobody knows the identifier. It is used literally; whether the backend serves
    /// it is only known when generating.
    Unrecognized,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Alias(role) => write!(f, "alias for the {} role", role),
            Resolution::Discovered => write!(f, "discovered"),
            Resolution::Catalog => write!(f, "static catalog"),
            Resolution::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Why the static catalog is listed instead of discovered models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FallbackReason {
    DiscoveryDisabled,
    DiscoveryFailed(String),
}

/// Where the listed models come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Availability {
    /// The backend's own listing, which may be empty
    Discovered { models: usize },
    Fallback(FallbackReason),
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Discovered { models } => {
                write!(f, "the backend serves {} model(s)", models)
            }
            Availability::Fallback(FallbackReason::DiscoveryDisabled) => {
                write!(f, "discovery is disabled, using the static catalog")
            }
            Availability::Fallback(FallbackReason::DiscoveryFailed(reason)) => {
                write!(f, "discovery failed ({}), using the static catalog", reason)
            }
        }
    }
}

/// A handle along with how it was obtained.
#[derive(Debug)]
pub(crate) struct ResolvedModel {
    pub requested: String,
    pub resolution: Resolution,
    pub handle: ModelHandle,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RegistryOptions {
    pub provider: ProviderKind,
    /// Roles pinned to specific model ids
    pub pinned_roles: HashMap<Role, String>,
    /// Upper bound on the discovery request. Generation is never bounded.
    pub discovery_timeout: Option<Duration>,
}

struct Inner {
    api: BackendApi,
    options: RegistryOptions,
    discovery: DiscoveryCache,
    handles: Mutex<HashMap<String, Arc<ResolvedModel>>>,
}

/// Resolves model identifiers to handles.
///
/// Discovery is triggered by the first operation which needs it and runs at most once
/// for the lifetime of the registry. Handles are memoized per requested identifier.
/// Cloning the registry is cheap; clones share all state.
#[derive(Clone)]
pub(crate) struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub(crate) fn new(api: BackendApi, options: RegistryOptions) -> Registry {
        Registry {
            inner: Arc::new(Inner {
                api,
                options,
                discovery: DiscoveryCache::new(),
                handles: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn provider(&self) -> ProviderKind {
        self.inner.options.provider
    }

    pub(crate) fn phase(&self) -> DiscoveryPhase {
        self.inner.discovery.phase()
    }

    /// Returns an unresolved reference to `id`. This never fails and never blocks;
    /// the reference is resolved the first time it is used.
    pub(crate) fn model(&self, id: &str) -> ModelRef {
        ModelRef {
            registry: self.clone(),
            requested: id.to_string(),
            resolved: Arc::new(OnceCell::new()),
        }
    }

    /// Returns a reference to whatever model `role` is bound to.
    pub(crate) fn model_for_role(&self, role: Role) -> ModelRef {
        self.model(role.default_model_id())
    }

    async fn cycle(&self) -> &DiscoveryCycle {
        let inner = &self.inner;

        inner
            .discovery
            .get_or_trigger(|| async move {
                let outcome = if inner.options.provider.discovers_models() {
                    DiscoveryOutcome::Completed(
                        discover(&inner.api, inner.options.discovery_timeout).await,
                    )
                } else {
                    tracing::debug!(
                        provider = %inner.options.provider,
                        "discovery is disabled, using the static catalog"
                    );

                    DiscoveryOutcome::Disabled
                };

                let aliases = AliasTable::resolve(
                    match &outcome {
                        DiscoveryOutcome::Completed(result) => result.models(),
                        DiscoveryOutcome::Disabled => &[],
                    },
                    &inner.options.pinned_roles,
                );

                DiscoveryCycle { outcome, aliases }
            })
            .await
    }

    /// The models callers may choose from: the discovered listing if discovery ran
    /// and succeeded, otherwise the static catalog.
    pub(crate) async fn available_models(&self) -> Vec<ModelDescriptor> {
        match &self.cycle().await.outcome {
            DiscoveryOutcome::Completed(DiscoveryResult::Succeeded(models)) => models.clone(),
            _ => catalog::list().to_vec(),
        }
    }

    pub(crate) async fn availability(&self) -> Availability {
        match &self.cycle().await.outcome {
            DiscoveryOutcome::Completed(DiscoveryResult::Succeeded(models)) => {
                Availability::Discovered {
                    models: models.len(),
                }
            }
            DiscoveryOutcome::Completed(DiscoveryResult::Failed(err)) => {
                Availability::Fallback(FallbackReason::DiscoveryFailed(err.to_string()))
            }
            DiscoveryOutcome::Disabled => Availability::Fallback(FallbackReason::DiscoveryDisabled),
        }
    }

    pub(crate) async fn aliases(&self) -> AliasTable {
        self.cycle().await.aliases.clone()
    }

    fn bind(cycle: &DiscoveryCycle, requested: &str) -> (String, Resolution) {
        if let Some(role) = Role::from_model_id(requested) {
            if let Some(binding) = cycle.aliases.binding(role) {
                return (binding.model_id.clone(), Resolution::Alias(role));
            }
        }

        let resolution = if cycle.discovered().iter().any(|m| m.id == requested) {
            Resolution::Discovered
        } else if catalog::find(requested).is_some() {
            Resolution::Catalog
        } else {
            Resolution::Unrecognized
        };

        (requested.to_string(), resolution)
    }

    /// Resolves `requested` to its memoized handle, building it on first use.
    pub(crate) async fn resolve(&self, requested: &str) -> Arc<ResolvedModel> {
        let cycle = self.cycle().await;

        if let Some(resolved) = self.lock_handles().get(requested) {
            return resolved.clone();
        }

        let (model_id, resolution) = Self::bind(cycle, requested);

        tracing::debug!(
            requested,
            model = %model_id,
            %resolution,
            "resolved model"
        );

        let resolved = Arc::new(ResolvedModel {
            requested: requested.to_string(),
            resolution,
            handle: ModelHandle::new(self.inner.api.clone(), model_id),
        });

        // A concurrent caller may have built the same handle in the meantime; the
        // first one inserted is kept.
        self.lock_handles()
            .entry(requested.to_string())
            .or_insert(resolved)
            .clone()
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ResolvedModel>>> {
        self.inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// An unresolved reference to a model, as returned by [`Registry::model`].
#[derive(Clone)]
pub(crate) struct ModelRef {
    registry: Registry,
    requested: String,
    resolved: Arc<OnceCell<Arc<ResolvedModel>>>,
}

impl ModelRef {
    pub(crate) fn requested(&self) -> &str {
        &self.requested
    }

    pub(crate) async fn resolve(&self) -> Arc<ResolvedModel> {
        self.resolved
            .get_or_init(|| self.registry.resolve(&self.requested))
            .await
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ModelRef {
    fn model_id(&self) -> &str {
        &self.requested
    }

    async fn generate(&self, prompt: &str) -> Result<GenerationResult, Error> {
        self.resolve().await.handle.generate(prompt).await
    }

    async fn stream(&self, prompt: &str) -> Result<Box<dyn AsyncFragmentIterator>, Error> {
        self.resolve().await.handle.stream(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ErrorKind;
    use crate::utils::stream_backend::unreachable_url;
    use httpmock::prelude::*;
    use httpmock::Mock;

    const LISTING: &str = r#"[
        {"name":"llama3","description":"Meta Llama 3"},
        {"name":"deepseek-r1"},
        {"name":"gemma:2b"}
    ]"#;

    fn registry(url: &str, provider: ProviderKind) -> Registry {
        Registry::new(
            BackendApi::with_api_base(url).unwrap(),
            RegistryOptions {
                provider,
                ..RegistryOptions::default()
            },
        )
    }

    /// Serves `listing` from `/api/models` after a short delay, so concurrent callers
    /// overlap with the request in flight.
    async fn mock_listing<'a>(server: &'a MockServer, listing: &str) -> Mock<'a> {
        let listing = listing.to_string();

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/models");
                then.status(200)
                    .header("content-type", "application/json")
                    .delay(Duration::from_millis(50))
                    .body(listing);
            })
            .await
    }

    #[tokio::test]
    async fn test_discovery_is_lazy() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server, LISTING).await;
        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let _model = registry.model("llama3");

        assert_eq!(registry.phase(), DiscoveryPhase::Uninitialized);
        assert_eq!(listing.hits_async().await, 0);

        registry.available_models().await;

        assert_eq!(registry.phase(), DiscoveryPhase::Succeeded);
        assert_eq!(listing.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_discovery_and_handles() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server, LISTING).await;
        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let model = registry.model("chat-model");
                tokio::spawn(async move { model.resolve().await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(listing.hits_async().await, 1);

        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }

        let again = registry.model("chat-model").resolve().await;
        assert!(Arc::ptr_eq(&again, &handles[0]));
        assert_eq!(again.handle.model_id(), "llama3");
        assert_eq!(
            again.handle.infer_url().unwrap().as_str(),
            server.url("/api/models/llama3/infer")
        );
        assert_eq!(listing.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_roles_bind_to_discovered_models() {
        let server = MockServer::start_async().await;
        mock_listing(&server, LISTING).await;
        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let chat = registry.model_for_role(Role::Chat).resolve().await;
        let reasoning = registry.model("chat-model-reasoning").resolve().await;
        let title = registry.model_for_role(Role::Title).resolve().await;

        assert_eq!(chat.handle.model_id(), "llama3");
        assert_eq!(chat.resolution, Resolution::Alias(Role::Chat));
        assert_eq!(reasoning.handle.model_id(), "deepseek-r1");
        assert_eq!(title.handle.model_id(), "title-model");
        assert_eq!(title.resolution, Resolution::Unrecognized);

        let gemma = registry.model("gemma:2b").resolve().await;
        assert_eq!(gemma.resolution, Resolution::Discovered);

        let ids: Vec<String> = registry
            .available_models()
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["llama3", "deepseek-r1", "gemma:2b"]);
    }

    #[tokio::test]
    async fn test_repeated_listing_entries() {
        let server = MockServer::start_async().await;
        mock_listing(
            &server,
            r#"[{"name":"llama3"},{"id":"llama3"},{"name":"deepseek-r1"}]"#,
        )
        .await;
        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let ids: Vec<String> = registry
            .available_models()
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["llama3", "deepseek-r1"]);

        let reasoning = registry.model_for_role(Role::Reasoning).resolve().await;
        assert_eq!(reasoning.handle.model_id(), "deepseek-r1");
        assert_eq!(reasoning.resolution, Resolution::Alias(Role::Reasoning));
    }

    #[tokio::test]
    async fn test_generate_through_reference() {
        let server = MockServer::start_async().await;
        mock_listing(&server, LISTING).await;

        let infer = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/models/llama3/infer");
                then.status(200).json_body(serde_json::json!({"output": "ok"}));
            })
            .await;

        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let result = registry.model("chat-model").generate("hi").await.unwrap();

        assert_eq!(result.text, "ok");
        assert_eq!(infer.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_unrecognized_model_fails_at_generation() {
        let server = MockServer::start_async().await;
        mock_listing(&server, r#"[{"name":"llama3"}]"#).await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/models/no-such-model/infer");
                then.status(404).body(r#"{"error":"model not found"}"#);
            })
            .await;

        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        let model = registry.model("no-such-model");
        let resolved = model.resolve().await;

        assert_eq!(resolved.resolution, Resolution::Unrecognized);
        assert_eq!(resolved.handle.model_id(), "no-such-model");

        let err = model.generate("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownModel);
    }

    #[tokio::test]
    async fn test_failed_discovery_falls_back_to_catalog() {
        let url = unreachable_url().await;
        let registry = registry(&url, ProviderKind::DiscoveryBackend);

        assert_eq!(registry.available_models().await, catalog::list());
        assert_eq!(registry.phase(), DiscoveryPhase::Failed);
        assert!(matches!(
            registry.availability().await,
            Availability::Fallback(FallbackReason::DiscoveryFailed(_))
        ));

        let chat = registry.model("chat-model").resolve().await;
        assert_eq!(chat.handle.model_id(), "chat-model");
        assert_eq!(chat.resolution, Resolution::Catalog);
        assert!(registry.aliases().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_a_failure() {
        let server = MockServer::start_async().await;
        mock_listing(&server, "[]").await;
        let registry = registry(&server.base_url(), ProviderKind::DiscoveryBackend);

        assert!(registry.available_models().await.is_empty());
        assert_eq!(
            registry.availability().await,
            Availability::Discovered { models: 0 }
        );
        assert_eq!(registry.phase(), DiscoveryPhase::Succeeded);

        let chat = registry.model("chat-model").resolve().await;
        assert_eq!(chat.handle.model_id(), "chat-model");
    }

    #[tokio::test]
    async fn test_gateway_never_discovers() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server, LISTING).await;
        let registry = registry(&server.base_url(), ProviderKind::Gateway);

        assert_eq!(registry.available_models().await, catalog::list());
        assert_eq!(registry.phase(), DiscoveryPhase::Disabled);
        assert_eq!(
            registry.availability().await,
            Availability::Fallback(FallbackReason::DiscoveryDisabled)
        );
        assert_eq!(listing.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_pinned_roles() {
        let server = MockServer::start_async().await;
        mock_listing(&server, LISTING).await;
        let registry = Registry::new(
            BackendApi::with_api_base(server.base_url()).unwrap(),
            RegistryOptions {
                provider: ProviderKind::DiscoveryBackend,
                pinned_roles: HashMap::from([(Role::Chat, "gemma:2b".to_string())]),
                discovery_timeout: None,
            },
        );

        let chat = registry.model_for_role(Role::Chat).resolve().await;
        let reasoning = registry.model_for_role(Role::Reasoning).resolve().await;

        assert_eq!(chat.handle.model_id(), "gemma:2b");
        assert_eq!(reasoning.handle.model_id(), "deepseek-r1");
    }
}
