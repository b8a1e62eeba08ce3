use std::time::Duration;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::device::link::Radio;
use crate::device::types::DiscoveredDevice;
use crate::error::DiscoveryError;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub duration: Duration,
    /// A device qualifies when its advertised name contains any of these
    pub names: Vec<String>,
}

pub fn filter_matches(devices: Vec<DiscoveredDevice>, names: &[String]) -> Vec<DiscoveredDevice> {
    devices.into_iter().filter(|device| device.matches_any(names)).collect()
}

/// Scans for `options.duration` and returns every qualifying device in discovery order.
/// Finding nothing is reported as `DiscoveryError::NoMatches`.
pub async fn scan_devices<R: Radio>(radio: &R, options: &ScanOptions, cancel: &CancellationToken) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    info!("Scanning for {:?} for {}...", options.names, humantime::format_duration(options.duration));

    let devices = filter_matches(radio.scan(options.duration, cancel).await?, &options.names);

    for device in &devices {
        info!("Found {} [{}]", device, device.id);
    }

    if devices.is_empty() {
        return Err(DiscoveryError::NoMatches);
    }

    Ok(devices)
}
