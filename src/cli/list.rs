use strum::IntoEnumIterator;
use table::{IntoTable, Table};
mod table;

use crate::catalog::{ModelDescriptor, Role};
use crate::registry::aliases::BindingOrigin;
use crate::registry::registry::{Availability, FallbackReason, Registry};
use crate::{die, warn, ListArgs, ListObject, ListingFormat};

/// Descriptions are free text and may be arbitrarily long
const DESCRIPTION_WIDTH: usize = 60;

#[derive(serde::Serialize)]
struct Model {
    model_id: String,
    name: String,
    description: String,
}

impl From<ModelDescriptor> for Model {
    fn from(value: ModelDescriptor) -> Self {
        Model {
            model_id: value.id,
            name: value.name,
            description: value.description,
        }
    }
}

impl From<Vec<Model>> for Table {
    fn from(value: Vec<Model>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "NAME", "DESCRIPTION"]);
        tab.limit_width(2, DESCRIPTION_WIDTH);

        for model in value {
            tab.add_row(vec![model.model_id, model.name, model.description]);
        }

        tab
    }
}

/// Where a role's model comes from
#[derive(serde::Serialize, Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
enum BindingSource {
    Explicit,
    Discovered,
    Default,
}

#[derive(serde::Serialize)]
struct RoleBinding {
    role: Role,
    model_id: String,
    binding: BindingSource,
}

impl From<Vec<RoleBinding>> for Table {
    fn from(value: Vec<RoleBinding>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["ROLE", "MODEL", "BINDING"]);

        for binding in value {
            tab.add_row(vec![
                binding.role.to_string(),
                binding.model_id,
                binding.binding.to_string(),
            ]);
        }

        tab
    }
}

async fn report_availability(registry: &Registry) {
    let availability = registry.availability().await;

    tracing::debug!(
        provider = %registry.provider(),
        phase = ?registry.phase(),
        %availability,
        "listing"
    );

    match &availability {
        Availability::Discovered { models: 0 } => {
            warn!("the backend does not serve any models")
        }
        Availability::Fallback(FallbackReason::DiscoveryFailed(_)) => warn!("{}", availability),
        _ => {}
    }
}

async fn get_models(registry: &Registry) -> Vec<Model> {
    report_availability(registry).await;

    registry
        .available_models()
        .await
        .into_iter()
        .map(Model::from)
        .collect()
}

async fn get_roles(registry: &Registry) -> Vec<RoleBinding> {
    report_availability(registry).await;

    let aliases = registry.aliases().await;

    Role::iter()
        .map(|role| {
            let binding = match aliases.binding(role).map(|b| b.origin) {
                Some(BindingOrigin::Explicit) => BindingSource::Explicit,
                Some(BindingOrigin::Positional) => BindingSource::Discovered,
                None => BindingSource::Default,
            };

            RoleBinding {
                role,
                model_id: aliases.lookup(role).to_string(),
                binding,
            }
        })
        .collect()
}

fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => {
            let output = match serde_json::to_string_pretty(&object) {
                Ok(output) => output,
                Err(err) => die!("failed to serialize the listing: {}", err),
            };

            println!("{}", output);
        }
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) async fn list_cmd(registry: &Registry, args: &ListArgs) {
    let format = args.format;

    match &args.object {
        ListObject::Models => {
            let models = get_models(registry).await;
            format_output(models, format);
        }
        ListObject::Roles => {
            let roles = get_roles(registry).await;
            format_output(roles, format);
        }
    }
}
