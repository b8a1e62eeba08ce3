use log::info;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::console::Console;
use crate::device::link::Radio;
use crate::device::scanner::scan_devices;
use crate::device::session::SessionController;
use crate::device::types::DiscoveredDevice;
use crate::error::{AppRunError, DiscoveryError};

/// Picks the device to control among the scan matches.
///
/// `preferred` selects by address or id. Otherwise a single match is used as is and several
/// matches are put to the operator. `Ok(None)` means the operator declined to choose.
pub async fn select_device<I: AsyncBufRead + Unpin, O: AsyncWrite + Unpin>(
    mut devices: Vec<DiscoveredDevice>,
    preferred: Option<&str>,
    console: &mut Console<I, O>,
    cancel: &CancellationToken,
) -> Result<Option<DiscoveredDevice>, AppRunError> {
    if let Some(address) = preferred {
        return match devices.into_iter().find(|device| device.is_identified_by(address)) {
            Some(device) => Ok(Some(device)),
            None => Err(DiscoveryError::NotFound { address: address.to_string() }.into()),
        };
    }

    if devices.len() == 1 {
        return Ok(devices.pop());
    }

    let choice = tokio::select! {
        _ = cancel.cancelled() => return Err(AppRunError::OperatorCancel),
        choice = console.choose_device(&devices) => choice?,
    };

    Ok(choice.map(|index| devices.swap_remove(index)))
}

/// Scan, select, then run one session. Nothing is retried.
pub async fn run_remote<R: Radio, I: AsyncBufRead + Unpin, O: AsyncWrite + Unpin>(
    radio: &R,
    config: &Config,
    console: &mut Console<I, O>,
    cancel: &CancellationToken,
) -> Result<(), AppRunError> {
    let devices = scan_devices(radio, &config.scan_options(), cancel).await?;

    let device = match select_device(devices, config.device.as_deref(), console, cancel).await? {
        Some(device) => device,
        None => {
            info!("No device selected");
            return Ok(());
        },
    };

    let mut session = SessionController::new(console, cancel.clone());
    let outcome = session.run(radio, &device).await?;
    info!("Session finished ({:?})", outcome);

    Ok(())
}
