//! Binds logical roles onto concrete model identifiers.
//!
//! Without an explicit mapping, roles are bound by position: the first discovered model
//! becomes the chat model, and the second, if any, the reasoning model. This assumes the
//! backend lists suitable stand-ins first. It is a heuristic, not a semantic match.
//! A repeated id only counts once.

use std::collections::{HashMap, HashSet};

use crate::catalog::{ModelDescriptor, Role};

/// Roles bound positionally, in the order of the discovered listing.
const POSITIONAL_ROLES: [Role; 2] = [Role::Chat, Role::Reasoning];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindingOrigin {
    /// Pinned by configuration
    Explicit,
    /// Bound by position in the discovered listing
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    pub model_id: String,
    pub origin: BindingOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AliasTable {
    bindings: HashMap<Role, Binding>,
}

impl AliasTable {
    pub(crate) fn resolve(
        discovered: &[ModelDescriptor],
        explicit: &HashMap<Role, String>,
    ) -> AliasTable {
        let mut bindings = HashMap::new();

        let mut seen = HashSet::new();
        let distinct = discovered
            .iter()
            .filter(|model| seen.insert(model.id.as_str()));

        for (role, model) in POSITIONAL_ROLES.iter().zip(distinct) {
            bindings.insert(
                *role,
                Binding {
                    model_id: model.id.clone(),
                    origin: BindingOrigin::Positional,
                },
            );
        }

        for (role, model_id) in explicit {
            bindings.insert(
                *role,
                Binding {
                    model_id: model_id.clone(),
                    origin: BindingOrigin::Explicit,
                },
            );
        }

        AliasTable { bindings }
    }

    pub(crate) fn binding(&self, role: Role) -> Option<&Binding> {
        self.bindings.get(&role)
    }

    /// The model id for `role`, falling through to the role's static default.
    pub(crate) fn lookup(&self, role: Role) -> &str {
        match self.bindings.get(&role) {
            Some(binding) => &binding.model_id,
            None => role.default_model_id(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
