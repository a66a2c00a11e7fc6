use std::time::Duration;

use reqwest::{Client, IntoUrl, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::apireq::{self, Url};

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("invalid backend api base: {0}")]
    InvalidApiBase(#[source] reqwest::Error),

    #[error("the backend api base \"{0}\" cannot address backend endpoints")]
    UnsupportedApiBase(String),

    #[error("a request to the backend failed: {0}")]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("the backend responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("the backend returned a malformed model listing: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}

/* === IO === */

// Structures to serialize /api/models/<model>/infer
#[derive(Serialize, Debug)]
struct InferRequest<'p> {
    prompt: &'p str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

// Structures to deserialize /api/models

/// One entry of a model listing. Backends disagree on the shape, so both bare names
/// and objects carrying a `name` and/or an `id` are accepted.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum ModelRecord {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ModelListing {
    Bare(Vec<ModelRecord>),
    Wrapped { models: Vec<ModelRecord> },
}

impl ModelListing {
    fn into_records(self) -> Vec<ModelRecord> {
        match self {
            ModelListing::Bare(models) | ModelListing::Wrapped { models } => models,
        }
    }
}

/// A client for one backend. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub(crate) struct BackendApi {
    client: Client,
    api_base: Url,
}

impl BackendApi {
    pub(crate) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<BackendApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        if !matches!(api_base.scheme(), "http" | "https") || api_base.cannot_be_a_base() {
            return Err(Error::UnsupportedApiBase(api_base.to_string()));
        }

        Ok(BackendApi {
            client: Client::new(),
            api_base,
        })
    }

    pub(crate) fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Appends `segments` to the path of the api base, percent-encoding each of them.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.api_base.clone();

        url.path_segments_mut()
            .map_err(|()| Error::UnsupportedApiBase(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    pub(crate) fn models_url(&self) -> Result<Url, Error> {
        self.endpoint(&["api", "models"])
    }

    pub(crate) fn infer_url(&self, model: &str) -> Result<Url, Error> {
        self.endpoint(&["api", "models", model, "infer"])
    }

    async fn maybe_status_error(res: Response) -> Result<Response, Error> {
        let status = res.status();

        if status.is_success() {
            return Ok(res);
        }

        // A body which cannot be read is reported as empty
        let body = res.text().await.unwrap_or_default();

        Err(Error::Status { status, body })
    }

    /// Lists the models served by the backend.
    pub(crate) async fn models(&self, timeout: Option<Duration>) -> Result<Vec<ModelRecord>, Error> {
        let url = self.models_url()?;

        let mut req = self.client.get(url);

        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let res = req
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_status_error(res).await?;

        let body = res
            .bytes()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let listing: ModelListing =
            serde_json::from_slice(&body).map_err(Error::MalformedPayload)?;

        Ok(listing.into_records())
    }

    /// Issues an inference request. The response is returned once its status is known
    /// to be successful; the body is left unread.
    pub(crate) async fn infer(
        &self,
        model: &str,
        prompt: &str,
        stream: bool,
    ) -> Result<Response, Error> {
        let url = self.infer_url(model)?;

        let res = self
            .client
            .post(url)
            .json(&InferRequest {
                prompt,
                stream: stream.then_some(true),
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Self::maybe_status_error(res).await
    }
}
