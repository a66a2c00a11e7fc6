//! The static model catalog and the logical roles models can be addressed by.
//!
//! The catalog is what the registry lists and resolves against whenever discovery
//! is disabled, has failed, or does not claim a requested identifier.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// The model used when the caller does not name one.
pub(crate) const DEFAULT_CHAT_MODEL: &str = "chat-model";

/// A model as presented to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ModelDescriptor {
    /// Stable, caller-facing identifier. Unique within a resolved set.
    pub id: String,
    /// Display name
    pub name: String,
    pub description: String,
}

impl ModelDescriptor {
    pub(crate) fn new(id: &str, name: &str, description: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

lazy_static! {
    static ref STATIC_MODELS: Vec<ModelDescriptor> = vec![
        ModelDescriptor::new(
            "chat-model",
            "Grok Vision",
            "Advanced multimodal model with vision and text capabilities",
        ),
        ModelDescriptor::new(
            "chat-model-reasoning",
            "Grok Reasoning",
            "Uses advanced chain-of-thought reasoning for complex problems",
        ),
        ModelDescriptor::new(
            "openai-gpt-5-mini",
            "OpenAI GPT-5 Mini",
            "Lightweight version of GPT-5 optimized for fast and efficient text generation",
        ),
        ModelDescriptor::new(
            "openai-gpt-5-nano",
            "OpenAI GPT-5 Nano",
            "Ultra-lightweight version of GPT-5 for minimal resource usage",
        ),
    ];
}

/// Returns the static catalog. The result is constant for the process lifetime.
pub(crate) fn list() -> &'static [ModelDescriptor] {
    &STATIC_MODELS
}

pub(crate) fn find(id: &str) -> Option<&'static ModelDescriptor> {
    STATIC_MODELS.iter().find(|m| m.id == id)
}

/// A logical role, allowing the application to avoid hardcoding a concrete model.
///
/// The `to_string` and `FromStr` forms are used in the configuration file and the
/// CLI and should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Role {
    /// The primary chat model
    Chat,
    /// The model used for chain-of-thought reasoning
    Reasoning,
    /// Generates conversation titles
    Title,
    /// Generates artifacts (documents, code)
    Artifact,
}

impl Role {
    /// The identifier under which the application addresses this role. When the
    /// role is not bound to a discovered model, it is also the id that gets used.
    pub(crate) fn default_model_id(self) -> &'static str {
        match self {
            Role::Chat => DEFAULT_CHAT_MODEL,
            Role::Reasoning => "chat-model-reasoning",
            Role::Title => "title-model",
            Role::Artifact => "artifact-model",
        }
    }

    /// Maps a logical model identifier back onto its role.
    pub(crate) fn from_model_id(id: &str) -> Option<Role> {
        use strum::IntoEnumIterator;

        Role::iter().find(|role| role.default_model_id() == id)
    }
}
