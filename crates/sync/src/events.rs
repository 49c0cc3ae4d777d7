//! Events broadcast by the sync manager.
//!
//! Subscribers (the session controller, UI bridges) use these to know when
//! to re-derive views. The model itself is read through the shared handle.

use serde::Serialize;

use crate::state::ConnectionStatus;

/// What part of the model a message touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelChange {
    /// The whole model was replaced.
    Snapshot,
    Assets,
    Variants,
    Lineage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyncEvent {
    /// A connection opened. `generation` increases with every attempt.
    Connected { generation: u64 },

    /// The connection with this generation closed.
    Disconnected { generation: u64 },

    StatusChanged(ConnectionStatus),

    ModelChanged(ModelChange),

    /// Jobs were registered, acknowledged, updated or resolved.
    JobsChanged,

    /// The server reported an `error` envelope.
    ServerError { code: String, message: String },

    /// Reconnection stopped after `attempts` consecutive failures.
    GaveUp { attempts: u32 },
}
