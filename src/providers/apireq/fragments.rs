//! Turns a response body into a sequence of text fragments. It expects a byte stream,
//! as produced by the [`reqwest::Response::bytes_stream`] method, and yields exactly one
//! fragment per chunk read from it. No line or message framing is performed.

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::stream::Stream;
use futures_util::StreamExt;
use std::marker::Unpin;

use super::ReqwestError;
use crate::providers::{AsyncFragmentIterator, Error, StreamEvent, Termination, TextFragment};

#[derive(Debug)]
pub(crate) struct FragmentStream<S>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    stream: S,
    /// The incomplete UTF-8 sequence at the end of the last chunk
    pending: Vec<u8>,
    exhausted: bool,
    termination: Option<Termination>,
}

impl<S: Stream<Item = reqwest::Result<Bytes>> + Unpin> FragmentStream<S> {
    pub(crate) fn new(stream: S) -> FragmentStream<S> {
        FragmentStream {
            stream,
            pending: Vec::new(),
            exhausted: false,
            termination: None,
        }
    }

    /// Decodes as much of `pending` + `chunk` as possible. A character split across
    /// two chunks is held back until the rest of it arrives; invalid bytes are replaced.
    fn decode(&mut self, chunk: &[u8]) -> TextFragment {
        self.pending.extend_from_slice(chunk);

        let mut text = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &rest[rest.len()..];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;

        TextFragment { text }
    }
}

#[async_trait]
impl<S: Stream<Item = reqwest::Result<Bytes>> + Unpin + Send> AsyncFragmentIterator
    for FragmentStream<S>
{
    async fn next(&mut self) -> Result<StreamEvent, Error> {
        if self.termination.is_some() {
            return Ok(StreamEvent::End);
        }

        if !self.exhausted {
            match self.stream.next().await {
                Some(Ok(chunk)) => return Ok(StreamEvent::Fragment(self.decode(&chunk))),
                Some(Err(err)) => {
                    self.termination = Some(Termination::Failed);
                    self.pending.clear();

                    tracing::warn!(error = %err, "streamed response terminated abnormally");

                    return Err(Error::Transport(ReqwestError::new(err)));
                }
                None => self.exhausted = true,
            }
        }

        // The body ended inside a multi-byte character
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();

            return Ok(StreamEvent::Fragment(TextFragment { text }));
        }

        self.termination = Some(Termination::Clean);

        Ok(StreamEvent::End)
    }

    fn termination(&self) -> Option<Termination> {
        self.termination
    }
}

/// A stream consisting of one fragment carrying a complete response. Used when the
/// backend cannot deliver a response incrementally.
#[derive(Debug)]
pub(crate) struct SingleFragment {
    text: Option<String>,
}

impl SingleFragment {
    pub(crate) fn new(text: String) -> SingleFragment {
        SingleFragment { text: Some(text) }
    }
}

#[async_trait]
impl AsyncFragmentIterator for SingleFragment {
    async fn next(&mut self) -> Result<StreamEvent, Error> {
        match self.text.take() {
            Some(text) => Ok(StreamEvent::Fragment(TextFragment { text })),
            None => Ok(StreamEvent::End),
        }
    }

    fn termination(&self) -> Option<Termination> {
        match self.text {
            Some(_) => None,
            None => Some(Termination::Clean),
        }
    }
}
