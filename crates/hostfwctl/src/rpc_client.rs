//! RPC Client - Unix socket client for hostfwd

use anyhow::{Context, Result};
use hostfw_shared::rpc::{RpcMethod, RpcRequest, RpcResponse, SOCKET_PATH};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Error reported by the daemon, with its JSON-RPC code.
#[derive(Debug)]
pub struct DaemonError {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for DaemonError {}

impl RpcClient {
    /// Socket path priority: explicit flag, then $HOSTFWD_SOCKET, then the default.
    pub fn discover_socket_path(explicit_path: Option<&str>) -> String {
        if let Some(path) = explicit_path {
            return path.to_string();
        }
        std::env::var("HOSTFWD_SOCKET").unwrap_or_else(|_| SOCKET_PATH.to_string())
    }

    pub async fn connect(socket_path: Option<&str>) -> Result<Self> {
        let path = Self::discover_socket_path(socket_path);

        match tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&path)).await {
            Ok(Ok(stream)) => {
                let (reader, writer) = stream.into_split();
                Ok(Self {
                    reader: BufReader::new(reader),
                    writer,
                })
            }
            Ok(Err(e)) => Err(Self::socket_error_with_hint(&path, e)),
            Err(_) => anyhow::bail!("Timed out connecting to hostfwd at {}", path),
        }
    }

    fn socket_error_with_hint(path: &str, error: std::io::Error) -> anyhow::Error {
        let hint = match error.kind() {
            ErrorKind::NotFound => format!(
                "Socket not found at {}. Is hostfwd running?\n\
                 Try: sudo systemctl status hostfwd",
                path
            ),
            ErrorKind::PermissionDenied => {
                format!("Permission denied on {}. Run as root or a member of the socket group", path)
            }
            _ => format!("Failed to connect to hostfwd at {}", path),
        };
        anyhow::Error::new(error).context(hint)
    }

    /// Send one request and wait for its response.
    pub async fn call(
        &mut self,
        method: RpcMethod,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        tokio::time::timeout(CALL_TIMEOUT, self.call_inner(method, params))
            .await
            .map_err(|_| anyhow::anyhow!("RPC call timed out after {:?}", CALL_TIMEOUT))?
    }

    async fn call_inner(
        &mut self,
        method: RpcMethod,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let request = RpcRequest::new(method, params);

        let request_json = serde_json::to_string(&request)? + "\n";
        self.writer
            .write_all(request_json.as_bytes())
            .await
            .context("Failed to send request")?;

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .context("Failed to read response")?;
        if read == 0 {
            anyhow::bail!("hostfwd closed the connection");
        }

        let response: RpcResponse =
            serde_json::from_str(&line).context("Failed to parse response")?;
        if response.id != request.id {
            anyhow::bail!("Response ID mismatch");
        }

        if let Some(error) = response.error {
            return Err(DaemonError {
                code: error.code,
                message: error.message,
            }
            .into());
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}
