//! Connection state machine.
//!
//! `Connecting -> Connected -> Disconnected -> Reconnecting -> Connected`,
//! with `Error` entered on transport errors and, terminally, once the
//! reconnect ceiling is exhausted.

use serde::Serialize;

/// Message shown once automatic reconnection has given up.
pub const GAVE_UP_MESSAGE: &str = "Connection lost. Refresh the page to reconnect.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// First connection attempt in progress.
    Connecting,
    Connected,
    Disconnected,
    /// Waiting `delay_ms` before attempt number `attempt`.
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// A transport error. `terminal` means no further attempts will be made.
    Error { message: String, terminal: bool },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the client has stopped trying to connect.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { terminal: true, .. })
    }

    pub(crate) fn gave_up() -> Self {
        Self::Error {
            message: GAVE_UP_MESSAGE.to_string(),
            terminal: true,
        }
    }
}
