//! Status store — one keyed record per site, overwritten on each run.
//!
//! Several producers share this store (this collector plus any external
//! portal scrapers); all of them write the same record contract. The
//! whole document is a single JSON file with an integrity checksum,
//! written atomically.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::report::{DeviceState, DeviceStatusReport};
use crate::scoring::SiteMetrics;

/// The shared producer contract: one row per site/device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: String,
    pub site_name: String,
    pub wan_status: bool,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub jitter_ms: f64,
    pub lan_switch_status: bool,
    pub lan_ap_status: bool,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl SiteRecord {
    /// The raw inputs the scoring function consumes.
    pub fn metrics(&self) -> SiteMetrics {
        SiteMetrics {
            wan_status: self.wan_status,
            lan_switch_status: self.lan_switch_status,
            lan_ap_status: self.lan_ap_status,
            latency_ms: self.latency_ms,
            packet_loss_pct: self.packet_loss_pct,
            jitter_ms: self.jitter_ms,
        }
    }
}

impl From<&DeviceStatusReport> for SiteRecord {
    /// Project a collector report onto the shared contract.
    ///
    /// Latency, loss and jitter stay zero — those come from other
    /// producers. A LAN tier is healthy when every known sub-device is
    /// up (vacuously true when none are managed).
    fn from(report: &DeviceStatusReport) -> Self {
        let site_id = if report.serial.is_empty() {
            report.name.clone()
        } else {
            report.serial.clone()
        };
        Self {
            site_id,
            site_name: report.name.clone(),
            wan_status: report.status == DeviceState::Up,
            latency_ms: 0.0,
            packet_loss_pct: 0.0,
            jitter_ms: 0.0,
            lan_switch_status: report.switches_up == report.switches_total,
            lan_ap_status: report.aps_up == report.aps_total,
            score: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// The on-disk document: records keyed by site id plus integrity
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredStatus {
    /// SHA-256 of the serialized records map: "sha256:<hex>"
    pub checksum: String,
    pub written_at: DateTime<Utc>,
    pub collector_version: String,
    pub records: BTreeMap<String, SiteRecord>,
}

impl StoredStatus {
    pub fn new(records: BTreeMap<String, SiteRecord>) -> Self {
        Self {
            checksum: checksum_of(&records),
            written_at: Utc::now(),
            collector_version: env!("CARGO_PKG_VERSION").to_string(),
            records,
        }
    }

    /// Verify the checksum matches the records. Returns true if valid.
    pub fn verify(&self) -> bool {
        self.checksum == checksum_of(&self.records)
    }

    /// Seconds since the document was written.
    pub fn age_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.written_at)
            .num_seconds()
    }
}

fn checksum_of(records: &BTreeMap<String, SiteRecord>) -> String {
    // BTreeMap keeps serialization deterministic for hashing.
    let serialized = serde_json::to_string(records).unwrap_or_default();
    format!("sha256:{:x}", Sha256::digest(serialized.as_bytes()))
}

pub struct StatusStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StatusStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the whole document with this run's records. No history
    /// is kept; the previous run is overwritten.
    pub async fn replace_all(&self, records: Vec<SiteRecord>) -> Result<()> {
        let map = records
            .into_iter()
            .map(|r| (r.site_id.clone(), r))
            .collect();
        self.write(&StoredStatus::new(map)).await
    }

    /// Atomically write the document: serialize to a `.tmp` sibling,
    /// then rename over the final path so readers never see a torn file.
    pub async fn write(&self, stored: &StoredStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let content =
            serde_json::to_string_pretty(stored).context("failed to serialize status store")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &content)
            .await
            .with_context(|| format!("writing temp file {}", tmp_path.display()))?;

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| {
                format!("renaming {} to {}", tmp_path.display(), self.path.display())
            })?;

        Ok(())
    }

    /// Read the document and verify its checksum.
    pub async fn read(&self) -> Result<StoredStatus> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;

        let stored: StoredStatus = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        if !stored.verify() {
            warn!(path = %self.path.display(), "status store checksum mismatch");
            bail!("checksum verification failed for {}", self.path.display());
        }

        Ok(stored)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
