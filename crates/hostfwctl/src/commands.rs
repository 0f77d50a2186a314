//! Command implementations

use crate::rpc_client::RpcClient;
use anyhow::{Context, Result};
use hostfw_shared::rpc::{ImageParams, RpcMethod};
use hostfw_shared::StatusSnapshot;

fn image_params(id: &str) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(ImageParams { id: id.to_string() })?)
}

/// Fetch and render the daemon's status.
pub async fn status(socket: Option<&str>, json: bool) -> Result<String> {
    let mut client = RpcClient::connect(socket).await?;
    let value = client.call(RpcMethod::Status, None).await?;
    if json {
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    let snapshot: StatusSnapshot =
        serde_json::from_value(value).context("Unexpected status payload")?;
    Ok(snapshot.format_text())
}

pub async fn activate(socket: Option<&str>, id: &str) -> Result<String> {
    let mut client = RpcClient::connect(socket).await?;
    let value = client
        .call(RpcMethod::Activate, Some(image_params(id)?))
        .await?;
    let state = value["state"].as_str().unwrap_or("unknown");
    Ok(format!("{}: {}", id, state))
}

pub async fn delete(socket: Option<&str>, id: &str) -> Result<String> {
    let mut client = RpcClient::connect(socket).await?;
    client.call(RpcMethod::Delete, Some(image_params(id)?)).await?;
    Ok(format!("{}: deleted", id))
}
