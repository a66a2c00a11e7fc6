//! A utility module with helpers for making requests and reading streamed responses.

mod error;
mod fragments;
mod stream_ext;

pub(crate) use error::Error as ReqwestError;
pub(crate) use error::ErrorKind as ReqwestErrorKind;
pub(crate) use url::Url;

pub(crate) use fragments::{FragmentStream, SingleFragment};
pub(crate) use stream_ext::ReqwestResponseStreamExt;
