//! Interface identity and lifecycle state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one station link on the shared transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(pub u16);

impl InterfaceId {
    /// Get the raw id value
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for InterfaceId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Lifecycle state of an interface as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceState {
    /// No interface with this id is registered
    NotFound,
    /// Registered, link not trained
    Inactive,
    /// Link trained, traffic flows
    Running,
}

impl InterfaceState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Inactive => "inactive",
            Self::Running => "running",
        }
    }
}

/// Per-interface parameters supplied on registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceParams {
    /// Logical channel number on the HUA link
    pub lcn: u8,
    /// Hardware name of the station, `dcp<id>` when absent
    #[serde(default)]
    pub hwname: Option<String>,
}

impl InterfaceParams {
    /// Parameters with the given channel and a default hardware name
    pub fn new(lcn: u8) -> Self {
        Self { lcn, hwname: None }
    }

    /// Set the hardware name
    pub fn with_hwname(mut self, hwname: impl Into<String>) -> Self {
        self.hwname = Some(hwname.into());
        self
    }
}

/// Hardware name used when none is configured
pub fn default_hwname(id: InterfaceId) -> String {
    format!("dcp{}", id.0)
}
