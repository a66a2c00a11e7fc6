//! Discovery asks a backend which models it currently serves.
//!
//! Discovery is best-effort. Every failure is folded into [`DiscoveryResult::Failed`],
//! logged, and never raised, so an absent backend cannot break model resolution. A
//! single attempt is made per cycle; there are no retries.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::OnceCell;

use super::aliases::AliasTable;
use crate::catalog::ModelDescriptor;
use crate::providers::{ApiError, BackendApi, ModelRecord, ReqwestErrorKind};

/// The outcome of one discovery request.
#[derive(Debug)]
pub(crate) enum DiscoveryResult {
    /// The backend answered with a listing. The listing may legitimately be empty.
    Succeeded(Vec<ModelDescriptor>),
    /// The backend could not be queried. Callers must fall back to the static catalog.
    Failed(ApiError),
}

impl DiscoveryResult {
    pub(crate) fn succeeded(&self) -> bool {
        matches!(self, DiscoveryResult::Succeeded(_))
    }

    /// The discovered models. Always empty when discovery failed.
    pub(crate) fn models(&self) -> &[ModelDescriptor] {
        match self {
            DiscoveryResult::Succeeded(models) => models,
            DiscoveryResult::Failed(_) => &[],
        }
    }

    pub(crate) fn failure(&self) -> Option<&ApiError> {
        match self {
            DiscoveryResult::Succeeded(_) => None,
            DiscoveryResult::Failed(err) => Some(err),
        }
    }
}

/// Normalizes a listing entry. `name` is preferred over `id` for both the identifier
/// and the display name; an entry carrying neither is unusable.
fn normalize(record: ModelRecord) -> Option<ModelDescriptor> {
    match record {
        ModelRecord::Name(name) if !name.is_empty() => Some(ModelDescriptor {
            id: name.clone(),
            name,
            description: String::new(),
        }),
        ModelRecord::Name(_) => None,
        ModelRecord::Object {
            name,
            id,
            description,
        } => {
            let key = name.filter(|n| !n.is_empty()).or(id.filter(|i| !i.is_empty()))?;

            Some(ModelDescriptor {
                id: key.clone(),
                name: key,
                description: description.unwrap_or_default(),
            })
        }
    }
}

/// Keeps the first listing entry for each id, preserving order.
fn dedup_by_id(models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
    let mut seen = HashSet::new();

    models
        .into_iter()
        .filter(|model| seen.insert(model.id.clone()))
        .collect()
}

/// Queries `<api base>/api/models` once.
pub(crate) async fn discover(api: &BackendApi, timeout: Option<Duration>) -> DiscoveryResult {
    let records = match api.models(timeout).await {
        Ok(records) => records,
        Err(ApiError::RequestFailed(err)) if err.kind() == ReqwestErrorKind::TimedOut => {
            tracing::warn!(
                backend = %api.api_base(),
                timeout = ?timeout,
                "model discovery timed out, falling back to the static catalog"
            );

            return DiscoveryResult::Failed(ApiError::RequestFailed(err));
        }
        Err(err) => {
            tracing::warn!(
                backend = %api.api_base(),
                error = %err,
                "model discovery failed, falling back to the static catalog"
            );

            return DiscoveryResult::Failed(err);
        }
    };

    let total = records.len();

    let named: Vec<ModelDescriptor> = records.into_iter().filter_map(normalize).collect();
    let anonymous = total - named.len();

    let models = dedup_by_id(named);
    let duplicates = total - anonymous - models.len();

    if anonymous + duplicates != 0 {
        tracing::warn!(
            backend = %api.api_base(),
            anonymous,
            duplicates,
            "skipped model listing entries with neither a name nor an id, or with a repeated id"
        );
    }

    if models.is_empty() {
        tracing::warn!(backend = %api.api_base(), "the backend does not serve any models");
    } else {
        tracing::debug!(backend = %api.api_base(), count = models.len(), "discovered models");
    }

    DiscoveryResult::Succeeded(models)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscoveryPhase {
    Uninitialized,
    InFlight,
    Succeeded,
    Failed,
    /// Discovery is not engaged for this provider
    Disabled,
}

#[derive(Debug)]
pub(crate) enum DiscoveryOutcome {
    Disabled,
    Completed(DiscoveryResult),
}

/// Everything derived from one discovery cycle.
#[derive(Debug)]
pub(crate) struct DiscoveryCycle {
    pub outcome: DiscoveryOutcome,
    pub aliases: AliasTable,
}

impl DiscoveryCycle {
    /// The discovered models, or nothing if discovery was disabled or failed.
    pub(crate) fn discovered(&self) -> &[ModelDescriptor] {
        match &self.outcome {
            DiscoveryOutcome::Completed(result) => result.models(),
            DiscoveryOutcome::Disabled => &[],
        }
    }

    pub(crate) fn phase(&self) -> DiscoveryPhase {
        match &self.outcome {
            DiscoveryOutcome::Disabled => DiscoveryPhase::Disabled,
            DiscoveryOutcome::Completed(result) if result.succeeded() => DiscoveryPhase::Succeeded,
            DiscoveryOutcome::Completed(_) => DiscoveryPhase::Failed,
        }
    }
}

/// A single-flight cache for the discovery cycle. The first caller runs the cycle;
/// callers arriving while it is in flight wait for the same outcome. The outcome,
/// including a failure, is kept for the lifetime of the cache.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryCache {
    started: AtomicBool,
    cycle: OnceCell<DiscoveryCycle>,
}

impl DiscoveryCache {
    pub(crate) fn new() -> DiscoveryCache {
        DiscoveryCache::default()
    }

    pub(crate) fn phase(&self) -> DiscoveryPhase {
        match self.cycle.get() {
            Some(cycle) => cycle.phase(),
            None if self.started.load(Ordering::Acquire) => DiscoveryPhase::InFlight,
            None => DiscoveryPhase::Uninitialized,
        }
    }

    /// Returns the cycle, running `run` if no cycle has completed or is in flight.
    pub(crate) async fn get_or_trigger<F, Fut>(&self, run: F) -> &DiscoveryCycle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiscoveryCycle>,
    {
        self.cycle
            .get_or_init(|| {
                self.started.store(true, Ordering::Release);
                run()
            })
            .await
    }
}
