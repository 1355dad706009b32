//! Capability tags and the set type tools declare them in.
//!
//! Capabilities are closed, tagged variants rather than free-form strings so
//! that the category → capability table in `intent` is checked exhaustively
//! by the compiler.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A tagged function a tool can perform, used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Query the asset inventory (hosts, devices, installed software).
    AssetQuery,
    /// Read time-series metrics.
    Metrics,
    /// Search or tail logs.
    LogQuery,
    /// Inspect the state of a service without changing it.
    ServiceStatus,
    /// Start, stop, or restart a service.
    ServiceControl,
    /// Ping, traceroute, port checks.
    NetworkProbe,
    /// Read files on a target.
    FileRead,
    /// Create, modify, or delete files on a target.
    FileWrite,
    /// Run an arbitrary command or script on a target.
    CommandExec,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 9] = [
        Capability::AssetQuery,
        Capability::Metrics,
        Capability::LogQuery,
        Capability::ServiceStatus,
        Capability::ServiceControl,
        Capability::NetworkProbe,
        Capability::FileRead,
        Capability::FileWrite,
        Capability::CommandExec,
    ];

    /// The snake_case tag used in catalogs and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::AssetQuery => "asset_query",
            Capability::Metrics => "metrics",
            Capability::LogQuery => "log_query",
            Capability::ServiceStatus => "service_status",
            Capability::ServiceControl => "service_control",
            Capability::NetworkProbe => "network_probe",
            Capability::FileRead => "file_read",
            Capability::FileWrite => "file_write",
            Capability::CommandExec => "command_exec",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capabilities a tool declares.
///
/// Ordered so that serialization and iteration are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    inner: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Add a capability to this set.
    pub fn grant(&mut self, capability: Capability) {
        self.inner.insert(capability);
    }

    /// Return true if the set contains the given capability.
    pub fn has(&self, capability: Capability) -> bool {
        self.inner.contains(&capability)
    }

    /// Iterate over all capabilities in tag order.
    pub fn all(&self) -> impl Iterator<Item = Capability> + '_ {
        self.inner.iter().copied()
    }

    /// How many of `required` this set contains.
    pub fn overlap(&self, required: &[Capability]) -> usize {
        required.iter().filter(|c| self.has(**c)).count()
    }

    /// True if at least one of `required` is in this set.
    pub fn intersects(&self, required: &[Capability]) -> bool {
        self.overlap(required) > 0
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}
