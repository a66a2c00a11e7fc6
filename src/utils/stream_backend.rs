//! A bare HTTP/1.1 listener for tests which need control over how a response body is
//! framed on the wire: one chunk per write, or a connection dropped before the
//! terminating chunk. Everything else is mocked with `httpmock`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Delay between two chunks, so the client reads them separately.
const CHUNK_INTERVAL: Duration = Duration::from_millis(25);

pub(crate) struct StreamBackend {
    url: String,
    task: JoinHandle<()>,
}

impl StreamBackend {
    /// Answers every request with a chunked `200 OK` carrying `chunks`.
    pub(crate) async fn chunked(content_type: &'static str, chunks: &[&str]) -> StreamBackend {
        Self::start(content_type, chunks, false).await
    }

    /// Like [`StreamBackend::chunked`], but closes the connection before the body ends.
    pub(crate) async fn truncated(content_type: &'static str, chunks: &[&str]) -> StreamBackend {
        Self::start(content_type, chunks, true).await
    }

    async fn start(content_type: &'static str, chunks: &[&str], truncate: bool) -> StreamBackend {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();

        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let chunks = chunks.clone();

                tokio::spawn(async move {
                    let _ = serve(socket, content_type, chunks, truncate).await;
                });
            }
        });

        StreamBackend { url, task }
    }

    pub(crate) fn url(&self) -> String {
        self.url.clone()
    }
}

impl Drop for StreamBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A URL on which nothing is listening.
pub(crate) async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    drop(listener);

    format!("http://{}", addr)
}

/// Consumes the request so closing the socket does not reset the connection.
async fn discard_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await?;

        if n == 0 {
            return Ok(());
        }

        buf.extend_from_slice(&chunk[..n]);

        let head = String::from_utf8_lossy(&buf);

        if let Some(head_end) = head.find("\r\n\r\n") {
            let content_length = head[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            if buf.len() >= head_end + 4 + content_length {
                return Ok(());
            }
        }
    }
}

async fn serve(
    mut socket: TcpStream,
    content_type: &'static str,
    chunks: Vec<String>,
    truncate: bool,
) -> std::io::Result<()> {
    discard_request(&mut socket).await?;

    let head = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: {}\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
        content_type
    );

    socket.write_all(head.as_bytes()).await?;
    socket.flush().await?;

    for chunk in chunks {
        tokio::time::sleep(CHUNK_INTERVAL).await;

        socket
            .write_all(format!("{:x}\r\n{}\r\n", chunk.len(), chunk).as_bytes())
            .await?;
        socket.flush().await?;
    }

    if !truncate {
        socket.write_all(b"0\r\n\r\n").await?;
    }

    socket.flush().await?;
    socket.shutdown().await
}
