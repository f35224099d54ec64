//! `fleetscope collect` — run one fleet collection and render it.

use anyhow::Result;
use colored::Colorize;

use crate::client::MgmtClient;
use crate::config;
use crate::domain::collector::FleetCollector;
use crate::domain::report::{DeviceState, FleetReport};
use crate::domain::store::{SiteRecord, StatusStore};
use crate::scoring;

pub fn run(config_path: Option<&str>, format: &str, persist: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config_path, format, persist))
}

async fn run_async(config_path: Option<&str>, format: &str, persist: bool) -> Result<()> {
    let cfg = config::load(config_path)?;

    let client = MgmtClient::new(&cfg.manager)?;
    let collector = FleetCollector::new(
        client,
        cfg.manager.adom.clone(),
        cfg.collector.max_concurrent_devices,
    );

    let report = collector.fetch_all().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_table(&report),
    }

    if persist {
        let records: Vec<SiteRecord> = report
            .reports
            .iter()
            .map(|r| {
                let mut record = SiteRecord::from(r);
                record.score = scoring::calculate_score(&record.metrics());
                record
            })
            .collect();

        let store = StatusStore::new(cfg.store.path.clone());
        store.replace_all(records).await?;
        println!(
            "\n{} {}",
            "Persisted to".dimmed(),
            cfg.store.path.display()
        );
    }

    Ok(())
}

fn state_cell(state: DeviceState) -> String {
    // Pad before coloring so the ANSI codes don't break the columns.
    let padded = format!("{:<12}", state.to_string());
    match state {
        DeviceState::Up => padded.green().bold().to_string(),
        DeviceState::Down => padded.red().bold().to_string(),
        DeviceState::Unreachable => padded.yellow().bold().to_string(),
        DeviceState::Error => padded.red().bold().to_string(),
    }
}

fn print_table(report: &FleetReport) {
    println!("{}", "═══ Fleet Status ═══".cyan().bold());
    println!();
    println!(
        "  {:<20} {:<16} {:<12} {:>6} {:>6}  {}",
        "Device".bold(),
        "Serial".bold(),
        "Status".bold(),
        "CPU%".bold(),
        "MEM%".bold(),
        "Details".bold()
    );

    for r in &report.reports {
        println!(
            "  {:<20} {:<16} {} {:>6.1} {:>6.1}  {}",
            r.name,
            r.serial,
            state_cell(r.status),
            r.cpu_percent,
            r.mem_percent,
            r.details
        );
    }

    let t = &report.totals;
    println!();
    println!(
        "  Devices: {} ({} up, {} down)   Switches: {}/{} up   APs: {}/{} up",
        t.devices,
        t.devices_up.to_string().green(),
        if t.devices_down > 0 {
            t.devices_down.to_string().red().to_string()
        } else {
            t.devices_down.to_string()
        },
        t.switches_up,
        t.switches_total,
        t.aps_up,
        t.aps_total
    );
    println!(
        "  {} {}",
        "Collected at:".dimmed(),
        report.collected_at.to_rfc3339()
    );
}
