//! Wrapper around Reqwest's error type to facilitate exclusive matching

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    ConnectFailed,
    TimedOut,
    /// The connection failed while the response body was being read.
    BodyInterrupted,
    DecodingFailed,
    RedirectPolicyViolated,
    UnknownReqwestError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::new(err)
    }
}

impl Error {
    pub(crate) fn new(err: reqwest::Error) -> Error {
        // Timeouts are checked first: a timed out connect is reported as both.
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_connect() {
            ErrorKind::ConnectFailed
        } else if err.is_body() {
            ErrorKind::BodyInterrupted
        } else if err.is_decode() {
            ErrorKind::DecodingFailed
        } else if err.is_redirect() {
            ErrorKind::RedirectPolicyViolated
        } else {
            ErrorKind::UnknownReqwestError
        };

        Error { kind, source: err }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match &self.kind {
            ErrorKind::ConnectFailed => "connection failed",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::BodyInterrupted => "the response was interrupted",
            ErrorKind::DecodingFailed => "decoding failed",
            ErrorKind::RedirectPolicyViolated => "redirect policy violated",
            ErrorKind::UnknownReqwestError => "unknown reqwest error",
        };

        write!(f, "{} ({})", what, self.source)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
