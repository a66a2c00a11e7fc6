use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::api::{self, BackendApi};
use crate::providers::apireq::{ReqwestResponseStreamExt, SingleFragment, Url};
use crate::providers::{AsyncFragmentIterator, Error, GenerationResult, TextGenerator};

/// Fields which may carry the generated text, in order of preference.
const TEXT_FIELDS: [&str; 3] = ["output", "response", "text"];

impl Error {
    fn from_api(model: &str, value: api::Error) -> Error {
        match value {
            api::Error::RequestFailed(err) => Error::Transport(err),
            api::Error::Status { status, body } if status == StatusCode::NOT_FOUND => {
                Error::UnknownModel {
                    model: model.to_string(),
                    body,
                }
            }
            api::Error::Status { status, body } => Error::Backend { status, body },
            value @ (api::Error::InvalidApiBase(_)
            | api::Error::UnsupportedApiBase(_)
            | api::Error::MalformedPayload(_)) => Error::InvalidEndpoint(value.to_string()),
        }
    }
}

/// Extracts the generated text from a response body.
///
/// The lookup is best-effort: the first recognized text field is used, a non-string
/// value in that field is serialized, and a payload with no recognized field is
/// returned serialized as a whole. A body which is not JSON is returned as-is.
pub(crate) fn extract_text(body: &[u8]) -> String {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(_) => return String::from_utf8_lossy(body).into_owned(),
    };

    let field = TEXT_FIELDS
        .iter()
        .find_map(|&name| payload.get(name).filter(|value| !value.is_null()));

    match field {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => payload.to_string(),
    }
}

/// A model served by a backend. The handle is bound to one endpoint and one model id
/// for its whole lifetime.
#[derive(Debug)]
pub(crate) struct ModelHandle {
    api: BackendApi,
    model_id: String,
}

impl ModelHandle {
    pub(crate) fn new(api: BackendApi, model_id: String) -> ModelHandle {
        ModelHandle { api, model_id }
    }

    /// The endpoint generation requests are sent to.
    pub(crate) fn infer_url(&self) -> Result<Url, Error> {
        self.api
            .infer_url(&self.model_id)
            .map_err(|e| Error::from_api(&self.model_id, e))
    }
}

#[async_trait]
impl TextGenerator for ModelHandle {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str) -> Result<GenerationResult, Error> {
        let res = self
            .api
            .infer(&self.model_id, prompt, false)
            .await
            .map_err(|e| Error::from_api(&self.model_id, e))?;

        let body = res
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.into()))?;

        Ok(GenerationResult {
            text: extract_text(&body),
        })
    }

    async fn stream(&self, prompt: &str) -> Result<Box<dyn AsyncFragmentIterator>, Error> {
        let res = self
            .api
            .infer(&self.model_id, prompt, true)
            .await
            .map_err(|e| Error::from_api(&self.model_id, e))?;

        if !res.is_incremental() {
            tracing::info!(
                model = %self.model_id,
                "backend answered a streaming request with a complete document, delivering it as a single fragment"
            );

            let body = res
                .bytes()
                .await
                .map_err(|e| Error::Transport(e.into()))?;

            return Ok(Box::new(SingleFragment::new(extract_text(&body))));
        }

        Ok(Box::new(res.stream_fragments()))
    }
}
