//! servd-network: Networking collaborators for servd
//!
//! This crate provides:
//! - Port allocation planning for multi-process backing servers
//! - Backing-server model configuration clients
//! - Hardware sidecar readiness probing

pub mod backing;
pub mod ports;
pub mod sidecar;

pub use backing::{BackingServer, BackingServerConnector, HttpBackingConnector, HttpBackingServer};
pub use ports::PortAllocationTable;
pub use sidecar::{SidecarProbe, SocketProbe};
