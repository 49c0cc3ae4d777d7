//! WebSocket sync client for one space.
//!
//! Keeps a single live connection to the server of record, applies every
//! server message to the injected [`GraphModel`](lineage_core::model::GraphModel)
//! and [`JobTracker`](lineage_core::jobs::JobTracker) in receipt order,
//! and reconnects with exponential backoff when the connection drops.
//! Each reconnect requests a fresh snapshot.

pub mod client;
pub mod events;
pub mod manager;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod state;
pub mod thumbnails;
