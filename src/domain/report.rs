//! Per-device status reports and the aggregated fleet report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reachability classification for one device in one collection run.
///
/// `Down` means the management plane itself reports the device as
/// disconnected; `Unreachable` means the device looked connected but did
/// not answer direct monitoring queries. Consumers must tolerate values
/// outside `{Up, Down}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Up,
    Down,
    Unreachable,
    Error,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Up => "UP",
            DeviceState::Down => "DOWN",
            DeviceState::Unreachable => "UNREACHABLE",
            DeviceState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The unit of output: exactly one per device per collection run,
/// immutable once composed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    pub name: String,
    pub serial: String,
    pub status: DeviceState,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub switches_total: u32,
    pub switches_up: u32,
    pub aps_total: u32,
    pub aps_up: u32,
    /// Human-readable summary or error text.
    pub details: String,
}

impl DeviceStatusReport {
    /// Zeroed report for a device that produced no monitoring data.
    pub fn degraded(
        name: &str,
        serial: &str,
        status: DeviceState,
        details: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            serial: serial.to_string(),
            status,
            cpu_percent: 0.0,
            mem_percent: 0.0,
            switches_total: 0,
            switches_up: 0,
            aps_total: 0,
            aps_up: 0,
            details: details.into(),
        }
    }
}

/// All reports of one run plus derived aggregate counters.
///
/// `reports` is completion-ordered; consumers key on name/serial, never
/// on position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReport {
    pub collected_at: DateTime<Utc>,
    pub reports: Vec<DeviceStatusReport>,
    pub totals: FleetTotals,
}

impl FleetReport {
    pub fn new(reports: Vec<DeviceStatusReport>) -> Self {
        let totals = FleetTotals::from_reports(&reports);
        Self {
            collected_at: Utc::now(),
            reports,
            totals,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetTotals {
    pub devices: u32,
    pub devices_up: u32,
    pub devices_down: u32,
    pub switches_total: u32,
    pub switches_up: u32,
    pub aps_total: u32,
    pub aps_up: u32,
}

impl FleetTotals {
    /// Summation over all reports. Anything that is not `Up` counts as
    /// down at the fleet level, including `Unreachable` and `Error`.
    fn from_reports(reports: &[DeviceStatusReport]) -> Self {
        let mut totals = Self::default();
        for report in reports {
            totals.devices += 1;
            if report.status == DeviceState::Up {
                totals.devices_up += 1;
            } else {
                totals.devices_down += 1;
            }
            totals.switches_total += report.switches_total;
            totals.switches_up += report.switches_up;
            totals.aps_total += report.aps_total;
            totals.aps_up += report.aps_up;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: DeviceState, sw: (u32, u32), ap: (u32, u32)) -> DeviceStatusReport {
        DeviceStatusReport {
            name: "dev".into(),
            serial: "sn".into(),
            status,
            cpu_percent: 1.0,
            mem_percent: 2.0,
            switches_total: sw.0,
            switches_up: sw.1,
            aps_total: ap.0,
            aps_up: ap.1,
            details: String::new(),
        }
    }

    #[test]
    fn totals_are_column_sums() {
        let fleet = FleetReport::new(vec![
            report(DeviceState::Up, (3, 2), (4, 4)),
            report(DeviceState::Unreachable, (1, 0), (0, 0)),
            report(DeviceState::Down, (0, 0), (0, 0)),
            report(DeviceState::Error, (0, 0), (0, 0)),
        ]);
        assert_eq!(
            fleet.totals,
            FleetTotals {
                devices: 4,
                devices_up: 1,
                devices_down: 3,
                switches_total: 4,
                switches_up: 2,
                aps_total: 4,
                aps_up: 4,
            }
        );
    }

    #[test]
    fn state_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&DeviceState::Unreachable).unwrap(),
            "\"UNREACHABLE\""
        );
        let state: DeviceState = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(state, DeviceState::Error);
        assert_eq!(DeviceState::Up.to_string(), "UP");
    }
}
