//! Node identities and roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque network identity: a node name plus the host it runs on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The node's configured name (may be auto-generated).
    pub name: String,
    /// The host the node runs on.
    pub host: String,
}

impl NodeId {
    /// Build a node id.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.host)
    }
}

/// A node's role in the cluster, exchanged during the beacon handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A worker node: hosts component instances.
    Worker,
    /// The master node: coordinates deployment and membership.
    Master,
}

impl Role {
    /// Snake-case wire name, matching the design document's `:worker`/`:master`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Master => "master",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_format() {
        assert_eq!(NodeId::new("w1", "10.0.0.1").to_string(), "w1@10.0.0.1");
    }
}
