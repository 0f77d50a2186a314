//! Shared types for the host firmware activation daemon and its client.
//!
//! Everything that crosses the daemon boundary lives here: activation
//! states and views, associations, job naming and completion events, the
//! table-of-contents reader, the status snapshot and the RPC wire types.

pub mod activation;
pub mod association;
pub mod error;
pub mod job;
pub mod rpc;
pub mod status;
pub mod toc;

pub use activation::{ActivationState, ActivationView, VersionPurpose};
pub use association::{Association, AssociationSet};
pub use error::HostFwError;
pub use job::{CompletionEvent, JobName, JobOutcome};
pub use status::StatusSnapshot;

/// Crate version, reported in status snapshots and `hostfwctl --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root of the published software object tree.
pub const SOFTWARE_OBJPATH: &str = "/xyz/openbmc_project/software";

/// Inventory item the resident host firmware is associated with.
pub const HOST_INVENTORY_PATH: &str = "/xyz/openbmc_project/inventory/system/chassis";

/// Object path for an image id.
pub fn object_path(id: &str) -> String {
    format!("{}/{}", SOFTWARE_OBJPATH, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path() {
        assert_eq!(object_path("a1b2c3d4"), "/xyz/openbmc_project/software/a1b2c3d4");
    }
}
