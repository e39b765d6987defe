//! tripwire-server — I/O plumbing around the trigger-dispatch core.
//!
//! Mounts the HTTP surface (health, function listing, WebSocket status
//! channel, dynamic trigger routes), implements the warehouse
//! `VersionSource` over a SQL-statements REST API, and ships the `tripwire`
//! binary that wires everything together.

pub mod api;
pub mod builtins;
pub mod warehouse;

pub use api::{build_router, AppState};
pub use warehouse::{SqlWarehouse, WarehouseConfig, WarehouseConfigError};
