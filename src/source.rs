use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, WaitError};
use crate::stats;

/// Trait for stats endpoints (the real socket or a mock)
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch one complete stats document
    async fn fetch(&self) -> Result<Value>;
}

/// Production implementation of StatsSource backed by a uWSGI stats socket
#[derive(Debug, Clone)]
pub struct UnixSocketSource {
    path: PathBuf,
}

impl UnixSocketSource {
    /// Create a source reading from the socket at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatsSource for UnixSocketSource {
    async fn fetch(&self) -> Result<Value> {
        let mut stream = UnixStream::connect(&self.path)
            .await
            .map_err(|source| WaitError::Connect {
                path: self.path.clone(),
                source,
            })?;

        // The server writes the whole document and then closes its end
        let mut buf = Vec::with_capacity(4096);
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(|source| WaitError::Read {
                path: self.path.clone(),
                source,
            })?;
        drop(stream);

        debug!("Read {} bytes from {}", buf.len(), self.path.display());
        stats::decode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;

    /// Serve `payload` to a single client, then close the connection
    fn serve_once(listener: UnixListener, payload: Vec<u8>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.write_all(&payload).await.unwrap();
            conn.shutdown().await.unwrap();
        })
    }

    #[tokio::test]
    async fn test_fetch_reads_until_peer_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.sock");
        let listener = UnixListener::bind(&path).unwrap();

        // Large enough to need several reads
        let workers: Vec<Value> = (0..500)
            .map(|id| serde_json::json!({"id": id, "status": "idle", "pid": 4000 + id}))
            .collect();
        let payload = serde_json::to_vec(&serde_json::json!({ "workers": workers })).unwrap();
        let server = serve_once(listener, payload);

        let source = UnixSocketSource::new(&path);
        let doc = source.fetch().await.unwrap();
        server.await.unwrap();

        assert_eq!(doc["workers"].as_array().map(Vec::len), Some(500));
    }

    #[tokio::test]
    async fn test_fetch_opens_a_new_connection_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            for status in ["busy", "idle"] {
                let (mut conn, _) = listener.accept().await.unwrap();
                let body = format!(r#"{{"workers":[{{"status":"{}"}}]}}"#, status);
                conn.write_all(body.as_bytes()).await.unwrap();
                conn.shutdown().await.unwrap();
            }
        });

        let source = UnixSocketSource::new(&path);
        let first = source.fetch().await.unwrap();
        let second = source.fetch().await.unwrap();
        server.await.unwrap();

        assert_eq!(first["workers"][0]["status"], "busy");
        assert_eq!(second["workers"][0]["status"], "idle");
    }

    #[tokio::test]
    async fn test_fetch_missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        let result = UnixSocketSource::new(&path).fetch().await;
        match result {
            Err(WaitError::Connect { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected connect error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve_once(listener, b"uWSGI is starting".to_vec());

        let result = UnixSocketSource::new(&path).fetch().await;
        server.await.unwrap();

        assert!(matches!(result, Err(WaitError::InvalidJson(_))));
    }
}
