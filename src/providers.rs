//! Traits and type definitions for text generation against a backend.
//!
//! The interface for all generation is the [`TextGenerator`] trait. It is implemented by
//! [`ModelHandle`], which is bound to exactly one backend endpoint and one model id, and by
//! the registry's unresolved model references, which resolve to a handle on first use.
//!
//! A generator supports two operations:
//! - Generate: a single request returning the complete text.
//! - Stream: a request returning an [`AsyncFragmentIterator`] which yields the text
//!   incrementally, one [`TextFragment`] per transport read.
//!
//! ## Error Handling
//!
//! All generators share the same [`Error`] contract. Connection-level failures are
//! [`Error::Transport`] and are the only retryable errors. Non-success responses are
//! surfaced verbatim as [`Error::Backend`], except for a missing model which becomes
//! [`Error::UnknownModel`]. Nothing in this module retries.

mod apireq;
mod backend;

pub(crate) mod providers;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

pub(crate) use self::apireq::{ReqwestError, ReqwestErrorKind};
pub(crate) use self::backend::{ApiError, BackendApi, ModelHandle, ModelRecord};

/// General categories of errors returned by a [`TextGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// The backend could not be reached, or the connection failed mid-response.
    Transport,
    /// The backend answered with a non-success status.
    Backend,
    /// The backend does not serve the requested model.
    UnknownModel,
    /// The backend's base URL cannot address the generation endpoint.
    InvalidEndpoint,
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("failed to reach the backend: {0}")]
    Transport(#[source] ReqwestError),

    #[error("the backend responded with {status}: {body}")]
    Backend { status: StatusCode, body: String },

    #[error("model \"{model}\" is not served by the backend: {body}")]
    UnknownModel { model: String, body: String },

    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(String),
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::UnknownModel { .. } => ErrorKind::UnknownModel,
            Error::InvalidEndpoint(_) => ErrorKind::InvalidEndpoint,
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }
}

/// The complete result of a single-shot generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenerationResult {
    pub text: String,
}

/// One incremental unit of streamed text. Fragments are not framed: a fragment may
/// split a word, a line, or a JSON object emitted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextFragment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Fragment(TextFragment),
    /// The backend closed the stream cleanly. Every call after this yields `End` again.
    End,
}

/// How a stream terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The backend signaled the end of the response.
    Clean,
    /// The connection failed before the end of the response was reached.
    Failed,
}

/// A streamed generation.
///
/// Dropping the iterator before it is exhausted releases the underlying connection.
/// The sequence cannot be restarted; a fresh [`TextGenerator::stream`] call issues a
/// fresh request.
#[async_trait]
pub(crate) trait AsyncFragmentIterator: Send {
    /// The next event. A transport failure is returned once as an error, after which
    /// the iterator is terminated and yields [`StreamEvent::End`].
    async fn next(&mut self) -> Result<StreamEvent, Error>;

    /// How the stream ended, or `None` while it is still open.
    fn termination(&self) -> Option<Termination>;
}

/// A model which can generate text.
#[async_trait]
pub(crate) trait TextGenerator: Send + Sync {
    /// The model identifier requests are made for.
    fn model_id(&self) -> &str;

    /// Generates the complete response to `prompt`.
    async fn generate(&self, prompt: &str) -> Result<GenerationResult, Error>;

    /// Opens a streamed response to `prompt`. Errors returned here happen before any
    /// text is delivered; errors during delivery are returned by the iterator.
    async fn stream(&self, prompt: &str) -> Result<Box<dyn AsyncFragmentIterator>, Error>;
}

/// Drains a stream into a single string, failing if the stream did not end cleanly.
pub(crate) async fn collect_text(stream: &mut dyn AsyncFragmentIterator) -> Result<String, Error> {
    let mut text = String::new();

    while let StreamEvent::Fragment(fragment) = stream.next().await? {
        text.push_str(&fragment.text);
    }

    Ok(text)
}
