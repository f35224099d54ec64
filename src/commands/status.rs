//! `fleetscope status` — render the persisted status store with
//! experience scores.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::config;
use crate::domain::store::{SiteRecord, StatusStore};
use crate::scoring::{self, HealthStatus};

pub fn run(config_path: Option<&str>, format: &str) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config_path, format))
}

async fn run_async(config_path: Option<&str>, format: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    let store = StatusStore::new(cfg.store.path.clone());

    if !store.exists() {
        bail!(
            "no status file at {}\n   Run `fleetscope collect --persist` first.",
            cfg.store.path.display()
        );
    }

    let stored = store.read().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    println!("{}", "═══ Site Status ═══".cyan().bold());
    println!();
    println!(
        "  {:<20} {:<6} {:<8} {:<8} {:>8} {:>7} {:>7}  {}",
        "Site".bold(),
        "WAN".bold(),
        "Switch".bold(),
        "AP".bold(),
        "Latency".bold(),
        "Loss%".bold(),
        "Jitter".bold(),
        "Score".bold()
    );

    for record in stored.records.values() {
        println!(
            "  {:<20} {} {} {} {:>6.0}ms {:>7.1} {:>5.0}ms  {}",
            record.site_name,
            updown(record.wan_status, 6),
            updown(record.lan_switch_status, 8),
            updown(record.lan_ap_status, 8),
            record.latency_ms,
            record.packet_loss_pct,
            record.jitter_ms,
            score_cell(record)
        );
    }

    println!();
    println!(
        "  {} {}  {} {}s ago",
        "Checksum:".dimmed(),
        &stored.checksum[..std::cmp::min(stored.checksum.len(), 24)],
        "Written:".dimmed(),
        stored.age_secs()
    );
    Ok(())
}

fn updown(up: bool, width: usize) -> String {
    // Pad before coloring so the ANSI codes don't break the columns.
    if up {
        format!("{:<width$}", "UP").green().to_string()
    } else {
        format!("{:<width$}", "DOWN").red().to_string()
    }
}

fn score_cell(record: &SiteRecord) -> String {
    let label = scoring::health_status(record.score);
    let text = format!("{:>5.1} ({})", record.score, label);
    match label {
        HealthStatus::Excellent => text.green().to_string(),
        HealthStatus::Good => text.green().to_string(),
        HealthStatus::Fair => text.yellow().to_string(),
        HealthStatus::Poor => text.yellow().bold().to_string(),
        HealthStatus::Critical => text.red().bold().to_string(),
    }
}
