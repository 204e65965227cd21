//! Connection state machine (§4.10): the validated progression a node
//! moves through during the master-side `connect` handshake.

use std::fmt;

/// A node's progression through the master-side connect handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Not currently connected; the default starting state.
    Disconnected,
    /// The beacon handshake is in flight.
    Verifying,
    /// The beacon verified; `register_master` is in flight.
    Registering,
    /// Registered and present in the membership map.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Verifying => "verifying",
            ConnectionState::Registering => "registering",
            ConnectionState::Connected => "connected",
        })
    }
}

/// An attempted transition that is not reachable from the state it was
/// tried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    from: ConnectionState,
    to: ConnectionState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid connection state transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

impl ConnectionState {
    /// Attempt to move from this state to `to`.
    ///
    /// # Errors
    /// Returns [`TransitionError`] if `to` is not reachable from `self`.
    pub fn transition(self, to: Self) -> Result<Self, TransitionError> {
        let valid = matches!(
            (self, to),
            (ConnectionState::Disconnected, ConnectionState::Verifying)
                | (ConnectionState::Verifying, ConnectionState::Registering)
                | (ConnectionState::Verifying, ConnectionState::Disconnected)
                | (ConnectionState::Registering, ConnectionState::Connected)
                | (ConnectionState::Registering, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Disconnected)
        );
        if valid {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}
