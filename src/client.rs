//! JSON-RPC session client for the management-plane server.
//!
//! One authenticated session is shared by every collection worker. The
//! management plane is the only endpoint we can reach directly; device-local
//! monitoring queries are relayed through its proxy mechanism and come back
//! double-wrapped — the device's answer inside the server's own RPC envelope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::SET_COOKIE;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::domain::device::Device;

const RPC_PATH: &str = "/jsonrpc";
const LOGIN_URL: &str = "/sys/login/user";
const PROXY_URL: &str = "/sys/proxy/json";
const SESSION_COOKIE: &str = "session_id";

/// Outer × inner peak concurrency: the worker pool fans 10 devices out,
/// each issuing 3 sub-queries, and the connection pool must absorb that
/// without head-of-line blocking.
const POOL_MIN_CONNECTIONS: usize = 30;

/// Why a single RPC call produced no data. Logged at the call site,
/// never propagated past it — a device being unreachable for one
/// sub-resource is an expected outcome, not an exception.
#[derive(Debug, Error)]
pub enum RpcFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("management server rejected the call (code {code})")]
    ProxyLayer { code: i64 },
    #[error("device reported failure through the proxy (code {code})")]
    DeviceLayer { code: i64 },
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Vec<RpcResult>>,
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    #[serde(default)]
    status: Option<RpcStatus>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    code: i64,
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
}

/// Authenticated RPC session against the management plane.
///
/// Safe to share across workers behind an `Arc`: the session id is
/// written only by `login`/`logout` and read everywhere else, and the
/// underlying connection pool handles its own synchronization.
pub struct MgmtClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    session: Mutex<Option<String>>,
}

impl MgmtClient {
    pub fn new(cfg: &ManagerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(cfg.insecure)
            .pool_max_idle_per_host(POOL_MIN_CONNECTIONS)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            http,
            next_id: AtomicU64::new(1),
            session: Mutex::new(None),
        })
    }

    /// Authenticate against the management plane.
    ///
    /// Single-shot by policy: a failed login leaves the client
    /// unauthenticated and whether to retry is the caller's decision.
    /// Success means the response carried a session id, or reported
    /// status code 0 with the id delivered via cookie instead.
    pub async fn login(&self) -> bool {
        let payload = self.envelope(
            "exec",
            LOGIN_URL,
            Some(json!({
                "user": self.username,
                "passwd": self.password,
            })),
        );

        let resp = match self.http.post(self.rpc_url()).json(&payload).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp,
                Err(e) => {
                    error!(error = %e, "login rejected at the HTTP layer");
                    return false;
                }
            },
            Err(e) => {
                error!(error = %e, "login request failed");
                return false;
            }
        };

        // Some deployments set the id as a cookie instead of the body.
        let cookie_session = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_session_cookie);

        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "login response was not valid JSON");
                return false;
            }
        };

        match login_outcome(&body, cookie_session) {
            Some(session) => {
                if session.is_none() {
                    // Tolerated: later requests go out without a session
                    // id and the server is free to reject them.
                    debug!("login succeeded but no session id was surfaced");
                }
                self.set_session(session);
                info!("login successful");
                true
            }
            None => {
                error!(response = %body, "login failed");
                false
            }
        }
    }

    /// Best-effort logout. By this point the caller has no further use
    /// for the session, so failures are only logged.
    pub async fn logout(&self) {
        let payload = self.envelope("exec", LOGIN_URL, Some(json!({})));
        match self.call(payload).await {
            Ok(_) => debug!("logged out"),
            Err(e) => debug!(error = %e, "logout failed"),
        }
        self.set_session(None);
    }

    /// List the managed devices of an administrative domain.
    ///
    /// Failures are logged and yield an empty list; at this layer an
    /// unreachable registry and an empty one look the same.
    pub async fn get_managed_devices(&self, adom: &str) -> Vec<Device> {
        let url = format!("/dvmdb/adom/{adom}/device");
        let payload = self.envelope("get", &url, None);

        match self.call(payload).await {
            Ok(Some(data)) => match serde_json::from_value(data) {
                Ok(devices) => devices,
                Err(e) => {
                    error!(error = %e, adom, "device registry payload had unexpected shape");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, adom, "failed to list managed devices");
                Vec::new()
            }
        }
    }

    /// Execute a read-only monitoring query on one device through the
    /// management server's proxy endpoint.
    ///
    /// Both wrapping layers are removed here. Any failure — proxy layer,
    /// device layer, transport, malformed body — collapses to `None`
    /// with a logged warning naming the failing layer.
    pub async fn exec_device_command(&self, device_name: &str, resource: &str) -> Option<Value> {
        let payload = self.envelope(
            "exec",
            PROXY_URL,
            Some(json!({
                "target": device_name,
                "action": "get",
                "resource": resource,
            })),
        );

        let data = match self.call(payload).await {
            Ok(data) => data,
            Err(failure) => {
                warn!(device = device_name, resource, error = %failure, "proxy command produced no data");
                return None;
            }
        };

        match unwrap_device_payload(data?) {
            Ok(value) => value,
            Err(failure) => {
                warn!(device = device_name, resource, error = %failure, "proxy command produced no data");
                None
            }
        }
    }

    // ── Internal helpers ───────────────────────────────────

    fn rpc_url(&self) -> String {
        format!("{}{}", self.base_url, RPC_PATH)
    }

    fn envelope(&self, method: &str, url: &str, data: Option<Value>) -> Value {
        let mut params = json!({ "url": url });
        if let Some(data) = data {
            params["data"] = data;
        }
        let mut payload = json!({
            "method": method,
            "params": [params],
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });
        if let Some(session) = self.session_id() {
            payload["session"] = Value::String(session);
        }
        payload
    }

    fn session_id(&self) -> Option<String> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    fn set_session(&self, session: Option<String>) {
        *self.session.lock().expect("session lock poisoned") = session;
    }

    /// Send one RPC envelope and unwrap the server layer: the first
    /// `result` entry's status must be zero, and its `data` (possibly
    /// absent) is the payload.
    async fn call(&self, payload: Value) -> Result<Option<Value>, RpcFailure> {
        let resp = self
            .http
            .post(self.rpc_url())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let envelope: RpcEnvelope = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Malformed(e.to_string()))?;

        let first = envelope
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| RpcFailure::Malformed("response carried no result".into()))?;

        match first.status {
            Some(status) if status.code != 0 => Err(RpcFailure::ProxyLayer { code: status.code }),
            _ => Ok(first.data),
        }
    }
}

/// Interpret a login response body. `Some(session)` on success (the id
/// may legitimately be absent), `None` on failure.
fn login_outcome(body: &Value, cookie_session: Option<String>) -> Option<Option<String>> {
    if let Some(session) = body.get("session").and_then(Value::as_str) {
        return Some(Some(session.to_string()));
    }
    if envelope_status_code(body) == Some(0) {
        return Some(cookie_session);
    }
    None
}

fn envelope_status_code(body: &Value) -> Option<i64> {
    body.get("result")?
        .get(0)?
        .get("status")?
        .get("code")?
        .as_i64()
}

/// Strip the device-layer wrapping from a proxied response. Precedence:
/// an embedded `status.code != 0` is a device-layer failure; otherwise a
/// `results` wrapper is removed when present, and a bare value passes
/// through unchanged.
fn unwrap_device_payload(value: Value) -> Result<Option<Value>, RpcFailure> {
    let Value::Object(mut map) = value else {
        return Ok(Some(value));
    };

    if let Some(code) = map
        .get("status")
        .and_then(|s| s.get("code"))
        .and_then(Value::as_i64)
    {
        if code != 0 {
            return Err(RpcFailure::DeviceLayer { code });
        }
    }

    if let Some(results) = map.remove("results") {
        return Ok(Some(results));
    }
    Ok(Some(Value::Object(map)))
}

fn parse_session_cookie(header: &str) -> Option<String> {
    let (name, rest) = header.split_once('=')?;
    if name.trim() != SESSION_COOKIE {
        return None;
    }
    let value = rest.split(';').next()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;

    fn test_client() -> MgmtClient {
        MgmtClient::new(&ManagerConfig::default()).unwrap()
    }

    #[test]
    fn login_body_with_session_succeeds() {
        let body = json!({ "session": "abc123" });
        assert_eq!(login_outcome(&body, None), Some(Some("abc123".to_string())));
    }

    #[test]
    fn login_body_with_nonzero_code_fails() {
        let body = json!({ "result": [ { "status": { "code": -1, "message": "Auth failed" } } ] });
        assert_eq!(login_outcome(&body, None), None);
        // The cookie alone does not rescue a rejected login.
        assert_eq!(login_outcome(&body, Some("cookie".into())), None);
    }

    #[test]
    fn login_body_with_zero_code_uses_cookie_session() {
        let body = json!({ "result": [ { "status": { "code": 0 } } ] });
        assert_eq!(
            login_outcome(&body, Some("from-cookie".into())),
            Some(Some("from-cookie".to_string()))
        );
        // No cookie either: still a success, session stays unset.
        assert_eq!(login_outcome(&body, None), Some(None));
    }

    #[test]
    fn session_cookie_parsing() {
        assert_eq!(
            parse_session_cookie("session_id=s3cr3t; Path=/; HttpOnly"),
            Some("s3cr3t".to_string())
        );
        assert_eq!(parse_session_cookie("other=val"), None);
        assert_eq!(parse_session_cookie("session_id=; Path=/"), None);
        assert_eq!(parse_session_cookie("garbage"), None);
    }

    #[test]
    fn envelope_attaches_session_once_set() {
        let client = test_client();
        let before = client.envelope("get", "/dvmdb/adom/root/device", None);
        assert!(before.get("session").is_none());

        client.set_session(Some("abc123".into()));
        let after = client.envelope("exec", PROXY_URL, Some(json!({ "target": "gw-1" })));
        assert_eq!(after["session"], json!("abc123"));
        assert_eq!(after["method"], json!("exec"));
        assert_eq!(after["params"][0]["url"], json!(PROXY_URL));
        assert_eq!(after["params"][0]["data"]["target"], json!("gw-1"));
    }

    #[test]
    fn envelope_ids_are_monotonic() {
        let client = test_client();
        let first = client.envelope("get", "/a", None)["id"].as_u64().unwrap();
        let second = client.envelope("get", "/b", None)["id"].as_u64().unwrap();
        assert!(second > first);
    }

    #[test]
    fn device_payload_unwraps_results_key() {
        let wrapped = json!({ "results": [ { "status": "up" } ] });
        let bare = json!([ { "status": "up" } ]);
        assert_eq!(
            unwrap_device_payload(wrapped).unwrap(),
            unwrap_device_payload(bare).unwrap()
        );
    }

    #[test]
    fn device_payload_reports_device_layer_failure() {
        let body = json!({ "status": { "code": 7 }, "results": [] });
        match unwrap_device_payload(body) {
            Err(RpcFailure::DeviceLayer { code: 7 }) => {}
            other => panic!("expected device-layer failure, got {:?}", other),
        }
    }

    #[test]
    fn device_payload_tolerates_string_status() {
        // Some firmware reports status as a string; that is not a
        // failure signal.
        let body = json!({ "status": "success", "cpu": 3 });
        let out = unwrap_device_payload(body).unwrap().unwrap();
        assert_eq!(out["cpu"], json!(3));
    }

    #[test]
    fn rpc_envelope_parses_failure_shape() {
        let body = r#"{ "result": [ { "status": { "code": -11, "message": "No permission" } } ] }"#;
        let envelope: RpcEnvelope = serde_json::from_str(body).unwrap();
        let first = envelope.result.unwrap().remove(0);
        assert_eq!(first.status.unwrap().code, -11);
        assert!(first.data.is_none());
    }
}
