//! RPC Server - Unix socket control endpoint
//!
//! Connections never touch the registry. Each request is forwarded to the
//! event loop as a [`ControlRequest`] and answered from its reply.

use anyhow::{Context, Result};
use hostfw_shared::rpc::{ImageParams, RpcMethod, RpcRequest, RpcResponse};
use hostfw_shared::HostFwError;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

const PARSE_ERROR: i32 = -32700;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Status,
    Activate(String),
    Delete(String),
}

pub type ControlReply = Result<serde_json::Value, HostFwError>;

#[derive(Debug)]
pub struct ControlRequest {
    pub command: Control,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Bind the control socket, replacing a stale one.
pub async fn bind(socket_path: &Path) -> Result<UnixListener> {
    if let Some(dir) = socket_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .context("Failed to create socket directory")?;
    }

    let _ = tokio::fs::remove_file(socket_path).await;

    let listener = UnixListener::bind(socket_path).context("Failed to bind Unix socket")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o660))?;
    }

    info!("RPC server listening on {}", socket_path.display());
    Ok(listener)
}

/// Accept connections until the loop side goes away.
pub async fn serve(listener: UnixListener, tx: mpsc::Sender<ControlRequest>) {
    loop {
        let accepted = tokio::select! {
            _ = tx.closed() => {
                info!("Control loop stopped, closing RPC server");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, tx).await {
                        error!("Connection handler error: {:#}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<ControlRequest>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from socket")?;

        if bytes_read == 0 {
            break;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => handle_request(request, &tx).await,
            Err(e) => {
                warn!("Invalid request JSON: {}", e);
                RpcResponse::error(String::new(), PARSE_ERROR, e.to_string())
            }
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
    }

    Ok(())
}

fn image_params(request: &RpcRequest) -> Result<ImageParams, String> {
    let params = request
        .params
        .clone()
        .ok_or_else(|| "missing params".to_string())?;
    serde_json::from_value(params).map_err(|e| e.to_string())
}

pub async fn handle_request(request: RpcRequest, tx: &mpsc::Sender<ControlRequest>) -> RpcResponse {
    let command = match request.method {
        RpcMethod::Ping => {
            return RpcResponse::success(request.id, serde_json::json!({"pong": true}));
        }
        RpcMethod::Status => Control::Status,
        RpcMethod::Activate | RpcMethod::Delete => match image_params(&request) {
            Ok(params) if request.method == RpcMethod::Activate => Control::Activate(params.id),
            Ok(params) => Control::Delete(params.id),
            Err(e) => return RpcResponse::error(request.id, INVALID_PARAMS, e),
        },
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = tx
        .send(ControlRequest {
            command,
            reply: reply_tx,
        })
        .await;
    if sent.is_err() {
        return RpcResponse::error(request.id, INTERNAL_ERROR, "daemon is shutting down".into());
    }

    match reply_rx.await {
        Ok(Ok(value)) => RpcResponse::success(request.id, value),
        Ok(Err(e)) => RpcResponse::error(request.id, e.code(), e.to_string()),
        Err(_) => RpcResponse::error(request.id, INTERNAL_ERROR, "request dropped".into()),
    }
}
