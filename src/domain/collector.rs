//! Fleet collection engine: bounded fan-out over the device registry
//! with per-device failure isolation.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::client::MgmtClient;
use crate::domain::device::Device;
use crate::domain::fetcher;
use crate::domain::report::{DeviceState, DeviceStatusReport, FleetReport};

#[derive(Debug, Error)]
pub enum CollectError {
    /// Login did not yield a usable session. Fatal to the run: no
    /// partial collection is attempted without a session, and retrying
    /// is a caller decision.
    #[error("authentication against the management plane failed")]
    AuthenticationFailed,
}

pub struct FleetCollector {
    client: Arc<MgmtClient>,
    adom: String,
    max_concurrent_devices: usize,
}

impl FleetCollector {
    pub fn new(client: MgmtClient, adom: impl Into<String>, max_concurrent_devices: usize) -> Self {
        Self {
            client: Arc::new(client),
            adom: adom.into(),
            max_concurrent_devices: max_concurrent_devices.max(1),
        }
    }

    /// Run one full collection: login, list the registry, fan out one
    /// fetch per device, log out, aggregate.
    ///
    /// Exactly one report per registry device comes back, however many
    /// individual fetches degrade or die.
    pub async fn fetch_all(&self) -> Result<FleetReport, CollectError> {
        if !self.client.login().await {
            return Err(CollectError::AuthenticationFailed);
        }

        let devices = self.client.get_managed_devices(&self.adom).await;
        info!(adom = %self.adom, devices = devices.len(), "collecting fleet status");

        let client = Arc::clone(&self.client);
        let reports = collect_with(devices, self.max_concurrent_devices, move |device| {
            let client = Arc::clone(&client);
            async move { fetcher::fetch_device_status(&client, &device).await }
        })
        .await;

        self.client.logout().await;
        Ok(FleetReport::new(reports))
    }
}

/// Fan `probe` out over `devices` under a bounded pool, draining results
/// in completion order.
///
/// The central invariant lives here: every input device yields exactly
/// one report. Each worker carries its device's identity and converts
/// its own death (the probe is infallible, so that means a panic in the
/// probe task) into an `Error` report, so the fold never has to guess
/// which device a failure belonged to.
pub(crate) async fn collect_with<F, Fut>(
    devices: Vec<Device>,
    max_concurrent: usize,
    probe: F,
) -> Vec<DeviceStatusReport>
where
    F: Fn(Device) -> Fut,
    Fut: Future<Output = DeviceStatusReport> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();
    let expected = devices.len();

    for device in devices {
        let identity = (device.name.clone(), device.serial.clone());
        let fut = probe(device);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            // The probe future is lazy: nothing is sent until the
            // outer tier admits this device.
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");

            match tokio::spawn(fut).await {
                Ok(report) => report,
                Err(join_error) => {
                    let (name, serial) = identity;
                    error!(device = %name, error = %join_error, "device fetch task died");
                    DeviceStatusReport::degraded(
                        &name,
                        &serial,
                        DeviceState::Error,
                        format!("Error: {join_error}"),
                    )
                }
            }
        });
    }

    let mut reports = Vec::with_capacity(expected);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            // The worker body above cannot panic, so this arm is
            // unreachable in practice; losing a slot here would break
            // the one-report-per-device invariant, hence the log.
            Err(join_error) => error!(error = %join_error, "collection worker died"),
        }
    }
    reports
}
