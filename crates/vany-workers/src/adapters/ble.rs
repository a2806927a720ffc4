use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::domain::DiscoveredDevice;
use crate::ports::DeviceScanner;
use crate::ScanError;

/// Bluetooth LE scanner on the first adapter the platform reports.
///
/// Owns a current-thread runtime so the blocking node thread can drive the
/// async platform API.
pub struct BtleplugScanner {
    runtime: Runtime,
}

impl BtleplugScanner {
    pub fn new() -> Result<Self, ScanError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime })
    }
}

impl std::fmt::Debug for BtleplugScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugScanner").finish_non_exhaustive()
    }
}

impl DeviceScanner for BtleplugScanner {
    fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        self.runtime.block_on(scan_once(duration))
    }
}

async fn scan_once(duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
    let adapter_err = |e: btleplug::Error| ScanError::Adapter(e.to_string());

    let manager = Manager::new().await.map_err(adapter_err)?;
    let adapter = manager
        .adapters()
        .await
        .map_err(adapter_err)?
        .into_iter()
        .next()
        .ok_or(ScanError::NoAdapter)?;

    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(adapter_err)?;
    info!(?duration, "BLE scan started");
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await.map_err(adapter_err)?;
    let mut found = Vec::with_capacity(peripherals.len());
    for peripheral in peripherals {
        match peripheral.properties().await {
            Ok(Some(props)) => found.push(DiscoveredDevice::new(
                props.address.to_string(),
                props.rssi,
                props.local_name,
            )),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping peripheral without properties"),
        }
    }

    adapter.stop_scan().await.map_err(adapter_err)?;
    info!(devices = found.len(), "BLE scan finished");
    Ok(found)
}
