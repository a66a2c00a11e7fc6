use super::FragmentStream;
use futures_util::Stream;
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use std::marker::Unpin;

pub(crate) trait ReqwestResponseStreamExt {
    /// Yields one text fragment per read of the response body.
    fn stream_fragments(
        self,
    ) -> FragmentStream<impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin + Send>;

    /// Whether the response is delivered incrementally. Only a complete `application/json`
    /// document, sized by `Content-Length` and not chunked, is not.
    fn is_incremental(&self) -> bool;
}

impl ReqwestResponseStreamExt for reqwest::Response {
    fn stream_fragments(
        self,
    ) -> FragmentStream<impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin + Send>
    {
        FragmentStream::new(self.bytes_stream())
    }

    fn is_incremental(&self) -> bool {
        let headers = self.headers();

        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase()
        };

        let content_type = header(CONTENT_TYPE);
        let essence = content_type.split(';').next().unwrap_or_default().trim();

        let chunked = header(TRANSFER_ENCODING).contains("chunked");
        let sized = headers.contains_key(CONTENT_LENGTH);

        !(essence == "application/json" && sized && !chunked)
    }
}
