//! `fleetscope devices` — list the management-plane device registry.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::client::MgmtClient;
use crate::config;

pub fn run(config_path: Option<&str>, format: &str) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config_path, format))
}

async fn run_async(config_path: Option<&str>, format: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = MgmtClient::new(&cfg.manager)?;

    if !client.login().await {
        bail!("authentication against the management plane failed");
    }

    let devices = client.get_managed_devices(&cfg.manager.adom).await;
    client.logout().await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!(
        "{} ({}: {})",
        "Managed Devices".cyan().bold(),
        "adom".dimmed(),
        cfg.manager.adom
    );
    println!();

    if devices.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for device in &devices {
        let conn = if device.is_connected() {
            "CONNECTED".green().bold()
        } else {
            "DISCONNECTED".red().bold()
        };
        println!(
            "  {:<20} {:<16} {}",
            device.name.bold(),
            device.serial.dimmed(),
            conn
        );
    }

    println!();
    println!("  {} devices", devices.len());
    Ok(())
}
