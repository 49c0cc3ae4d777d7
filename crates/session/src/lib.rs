//! Session wiring for a lineage graph client.
//!
//! A [`SessionController`](controller::SessionController) owns the shared
//! graph model and job tracker, keeps them in sync with the server through
//! a [`SyncManager`](lineage_sync::manager::SyncManager), and republishes a
//! freshly computed layout whenever either changes.

pub mod config;
pub mod controller;
