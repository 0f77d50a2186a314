//! hostfwd library - exposes modules for testing.

pub mod activation;
pub mod capacity;
pub mod completion;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod locator;
pub mod machine;
pub mod registry;
pub mod rpc_server;
pub mod status;
pub mod watcher;
