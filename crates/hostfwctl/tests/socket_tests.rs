//! Client against the daemon's real control socket, with a stub event loop.

use hostfw_shared::{HostFwError, StatusSnapshot};
use hostfwctl::commands;
use hostfwctl::rpc_client::{DaemonError, RpcClient};
use hostfwd::rpc_server::{self, Control, ControlRequest};
use hostfw_shared::rpc::RpcMethod;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Answers control requests the way an idle daemon with one image would.
async fn stub_loop(mut rx: mpsc::Receiver<ControlRequest>) {
    while let Some(request) = rx.recv().await {
        let reply = match request.command {
            Control::Status => Ok(serde_json::to_value(StatusSnapshot::new(None, vec![], vec![])).unwrap()),
            Control::Activate(id) => Ok(serde_json::json!({"id": id, "state": "activating"})),
            Control::Delete(id) => Err(HostFwError::Busy(id)),
        };
        let _ = request.reply.send(reply);
    }
}

async fn start_server(temp: &TempDir) -> String {
    let socket = temp.path().join("hostfwd.sock");
    let listener = rpc_server::bind(&socket).await.unwrap();
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(rpc_server::serve(listener, tx));
    tokio::spawn(stub_loop(rx));
    socket.display().to_string()
}

#[tokio::test]
async fn test_ping() {
    let temp = TempDir::new().unwrap();
    let socket = start_server(&temp).await;

    let mut client = RpcClient::connect(Some(&socket)).await.unwrap();
    let value = client.call(RpcMethod::Ping, None).await.unwrap();
    assert_eq!(value["pong"], true);
}

#[tokio::test]
async fn test_status_and_activate() {
    let temp = TempDir::new().unwrap();
    let socket = start_server(&temp).await;

    let text = commands::status(Some(&socket), false).await.unwrap();
    assert!(text.contains("no images"));

    let out = commands::activate(Some(&socket), "abc").await.unwrap();
    assert_eq!(out, "abc: activating");
}

#[tokio::test]
async fn test_daemon_error_code_propagates() {
    let temp = TempDir::new().unwrap();
    let socket = start_server(&temp).await;

    let err = commands::delete(Some(&socket), "abc").await.unwrap_err();
    let daemon_err = err.downcast_ref::<DaemonError>().unwrap();
    assert_eq!(daemon_err.code, HostFwError::Busy(String::new()).code());
}
