mod api;
mod provider;

pub(crate) use api::{BackendApi, Error as ApiError, ModelRecord};
pub(crate) use provider::ModelHandle;
