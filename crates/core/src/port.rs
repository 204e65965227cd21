//! Port names.
//!
//! A [`Port`] is the atom-like symbolic name the design document describes:
//! scoped to a single component, compared and hashed by name only.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A symbolic port name, scoped to the component (or workflow boundary) that
/// declares it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(String);

impl Port {
    /// Create a port from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the port name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Port {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Port {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Port> for Port {
    fn from(value: &Port) -> Self {
        value.clone()
    }
}
