//! The kinds of backend a registry can be configured for

use serde::{Deserialize, Serialize};
use strum_macros;

/// Selects how the registry finds its models.
///
/// The `to_string` and `FromStr` forms are read from `AI_PROVIDER` and the
/// configuration file and should remain stable.
#[derive(
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ProviderKind {
    /// The hosted model gateway. Models come from the static catalog and discovery
    /// is never engaged.
    #[default]
    #[strum(to_string = "gateway")]
    Gateway,
    /// A locally-reachable inference server queried for the models it serves.
    #[serde(alias = "ollama")]
    #[strum(to_string = "discovery-backend", serialize = "ollama")]
    DiscoveryBackend,
}

impl ProviderKind {
    pub(crate) fn discovers_models(self) -> bool {
        matches!(self, ProviderKind::DiscoveryBackend)
    }
}
