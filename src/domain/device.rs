//! Managed-device registry entries as reported by the management plane.

use serde::{Deserialize, Serialize};

/// Wire value for a device the management plane considers connected.
const CONN_STATUS_CONNECTED: i64 = 1;

/// One endpoint in the management plane's device registry. Read-only
/// for the duration of a collection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "sn", default)]
    pub serial: String,
    #[serde(rename = "conn_status", default)]
    pub conn_status: i64,
}

impl Device {
    /// Whether the management plane currently reports this device as
    /// connected. Not re-verified per command.
    pub fn is_connected(&self) -> bool {
        self.conn_status == CONN_STATUS_CONNECTED
    }
}
