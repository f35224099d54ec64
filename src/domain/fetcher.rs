//! Single-device status fetch: three independent monitoring queries,
//! heterogeneous response shapes normalized into one report.

use serde_json::Value;

use crate::client::MgmtClient;
use crate::domain::device::Device;
use crate::domain::report::{DeviceState, DeviceStatusReport};

const SYSTEM_STATUS: &str = "/api/v2/monitor/system/status";
const SWITCH_STATUS: &str = "/api/v2/monitor/switch-controller/managed-switch/status";
const AP_STATUS: &str = "/api/v2/monitor/wifi/managed-ap";

const SWITCH_UP_STATES: &[&str] = &["up", "online", "connected"];
const AP_UP_STATES: &[&str] = &["up", "online", "connected", "running"];

/// Produce exactly one report for one device. Infallible: every failure
/// mode folds into a degraded-but-valid report.
pub async fn fetch_device_status(client: &MgmtClient, device: &Device) -> DeviceStatusReport {
    if !device.is_connected() {
        // Skip the proxy round-trips entirely; the endpoint is already
        // known to be unreachable.
        return DeviceStatusReport::degraded(
            &device.name,
            &device.serial,
            DeviceState::Down,
            "Device disconnected from management plane",
        );
    }

    // The three monitoring endpoints share no state. They run
    // concurrently inside the fleet-level pool slot this device holds,
    // and all three settle before the report is composed.
    let (system, switches, aps) = tokio::join!(
        client.exec_device_command(&device.name, SYSTEM_STATUS),
        client.exec_device_command(&device.name, SWITCH_STATUS),
        client.exec_device_command(&device.name, AP_STATUS),
    );

    compose_report(device, system, switches, aps)
}

/// Fold the three sub-query results into the final report.
fn compose_report(
    device: &Device,
    system: Option<Value>,
    switches: Option<Value>,
    aps: Option<Value>,
) -> DeviceStatusReport {
    // A device can be connected at the management plane yet fail to
    // answer direct monitoring queries: Unreachable, not Down.
    let status = if system.is_some() {
        DeviceState::Up
    } else {
        DeviceState::Unreachable
    };

    let (cpu_percent, mem_percent) = system_usage(system.as_ref());
    let (switches_total, switches_up) =
        count_up(switches.as_ref(), SWITCH_UP_STATES, &["status", "state"]);
    let (aps_total, aps_up) = count_up(aps.as_ref(), AP_UP_STATES, &["status", "connection_state"]);

    DeviceStatusReport {
        name: device.name.clone(),
        serial: device.serial.clone(),
        status,
        cpu_percent,
        mem_percent,
        switches_total,
        switches_up,
        aps_total,
        aps_up,
        details: format!("Switches: {switches_up}/{switches_total} UP, APs: {aps_up}/{aps_total} UP"),
    }
}

/// Remove a `results` wrapper if one survived the proxy unwrap. Applied
/// again here so a wrapper at either RPC layer normalizes identically.
fn unwrap_results(value: &Value) -> &Value {
    value.get("results").unwrap_or(value)
}

/// Extract `cpu`/`mem` from a system-status payload. Absent or
/// malformed fields default to zero rather than failing the fetch.
fn system_usage(system: Option<&Value>) -> (f64, f64) {
    let Some(stats) = system.map(unwrap_results) else {
        return (0.0, 0.0);
    };
    let cpu = stats.get("cpu").and_then(Value::as_f64).unwrap_or(0.0);
    let mem = stats.get("mem").and_then(Value::as_f64).unwrap_or(0.0);
    (cpu, mem)
}

/// Count total vs "up" entries in a sub-device listing.
///
/// An entry is up when any of the recognized fields, case-folded,
/// matches the vocabulary; unrecognized values count as down. A payload
/// that is not a list yields 0/0.
fn count_up(listing: Option<&Value>, vocabulary: &[&str], fields: &[&str]) -> (u32, u32) {
    let Some(items) = listing.map(unwrap_results).and_then(Value::as_array) else {
        return (0, 0);
    };

    let total = items.len() as u32;
    let up = items
        .iter()
        .filter(|item| {
            fields.iter().any(|field| {
                item.get(field)
                    .and_then(Value::as_str)
                    .map(|s| {
                        let folded = s.to_ascii_lowercase();
                        vocabulary.iter().any(|v| *v == folded)
                    })
                    .unwrap_or(false)
            })
        })
        .count() as u32;

    (total, up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use serde_json::json;

    fn device(name: &str, conn_status: i64) -> Device {
        Device {
            name: name.into(),
            serial: format!("SN-{name}"),
            conn_status,
        }
    }

    #[tokio::test]
    async fn disconnected_device_short_circuits() {
        // No proxy call is made for a disconnected device, so a client
        // pointed at nothing is never exercised.
        let client = MgmtClient::new(&ManagerConfig::default()).unwrap();
        let report = fetch_device_status(&client, &device("gw-9", 0)).await;

        assert_eq!(report.status, DeviceState::Down);
        assert_eq!(report.cpu_percent, 0.0);
        assert_eq!(report.mem_percent, 0.0);
        assert_eq!(report.switches_total, 0);
        assert_eq!(report.aps_total, 0);
        assert_eq!(report.details, "Device disconnected from management plane");
    }

    #[test]
    fn no_system_data_means_unreachable() {
        let report = compose_report(&device("gw-1", 1), None, None, None);
        assert_eq!(report.status, DeviceState::Unreachable);
        assert_eq!(report.details, "Switches: 0/0 UP, APs: 0/0 UP");
    }

    #[test]
    fn system_data_means_up() {
        let system = json!({ "cpu": 12, "mem": 34.5 });
        let report = compose_report(&device("gw-1", 1), Some(system), None, None);
        assert_eq!(report.status, DeviceState::Up);
        assert_eq!(report.cpu_percent, 12.0);
        assert_eq!(report.mem_percent, 34.5);
    }

    #[test]
    fn malformed_system_stats_default_to_zero() {
        let system = json!({ "cpu": "busy", "uptime": 5 });
        let (cpu, mem) = system_usage(Some(&system));
        assert_eq!((cpu, mem), (0.0, 0.0));
    }

    #[test]
    fn switch_vocabulary_on_either_field() {
        let listing = json!([
            { "status": "up" },
            { "status": "down" },
            { "state": "online" }
        ]);
        let (total, up) = count_up(Some(&listing), SWITCH_UP_STATES, &["status", "state"]);
        assert_eq!((total, up), (3, 2));
    }

    #[test]
    fn classification_is_case_insensitive() {
        let listing = json!([
            { "status": "UP" },
            { "state": "Connected" },
            { "status": "OFFLINE" }
        ]);
        let (total, up) = count_up(Some(&listing), SWITCH_UP_STATES, &["status", "state"]);
        assert_eq!((total, up), (3, 2));
    }

    #[test]
    fn ap_vocabulary_includes_running() {
        let listing = json!([
            { "status": "running" },
            { "status": "offline" },
            { "connection_state": "connected" }
        ]);
        let (total, up) = count_up(Some(&listing), AP_UP_STATES, &["status", "connection_state"]);
        assert_eq!((total, up), (3, 2));
    }

    #[test]
    fn non_list_payload_counts_zero() {
        assert_eq!(count_up(None, SWITCH_UP_STATES, &["status"]), (0, 0));
        let scalar = json!(42);
        assert_eq!(count_up(Some(&scalar), SWITCH_UP_STATES, &["status"]), (0, 0));
    }

    #[test]
    fn results_wrapper_normalizes_identically() {
        let bare = json!([ { "status": "up" }, { "status": "down" } ]);
        let wrapped = json!({ "results": [ { "status": "up" }, { "status": "down" } ] });
        assert_eq!(
            count_up(Some(&bare), SWITCH_UP_STATES, &["status", "state"]),
            count_up(Some(&wrapped), SWITCH_UP_STATES, &["status", "state"]),
        );

        let bare_sys = json!({ "cpu": 7, "mem": 8 });
        let wrapped_sys = json!({ "results": { "cpu": 7, "mem": 8 } });
        assert_eq!(
            system_usage(Some(&bare_sys)),
            system_usage(Some(&wrapped_sys))
        );
    }

    #[test]
    fn up_counts_never_exceed_totals() {
        let listing = json!([
            { "status": "up", "state": "online" },
            { "status": "connected" },
            { "state": "up" }
        ]);
        let (total, up) = count_up(Some(&listing), SWITCH_UP_STATES, &["status", "state"]);
        assert!(up <= total);
        assert_eq!((total, up), (3, 3));
    }
}
