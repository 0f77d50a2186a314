//! hostfwctl - command line client for hostfwd

pub mod commands;
pub mod rpc_client;
