use std::time::Duration;
use log::{info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::console::Console;
use crate::device::connection::BtleRadio;
use crate::device::constants::{INTERRUPTED_TWICE_EXIT_CODE, SHUTDOWN_DEADLINE};
use crate::error::AppRunError;
use crate::remote::run_remote;

pub mod config;
pub mod console;
pub mod device;
pub mod error;
pub mod remote;

/// Installs the process-wide logger. Call once, before anything logs.
pub fn init_logging(config: &Config) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(config.log_level)
        .chain(std::io::stderr());

    if let Some(log_file) = &config.log_file {
        dispatch = dispatch.chain(fern::log_file(log_file)?);
    }

    dispatch.apply()?;
    Ok(())
}

// The first Ctrl-C cancels `cancel`; a second one exits without teardown.
fn interrupt_task(cancel: CancellationToken) -> JoinHandle<()> {
    spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for interrupt: {:?}", err);
            return;
        }

        info!("Interrupt received, stopping... (press Ctrl-C again to exit immediately)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted twice, exiting without cleanup");
            std::process::exit(INTERRUPTED_TWICE_EXIT_CODE);
        }
    })
}

async fn run_async(config: Config, cancel: CancellationToken) -> Result<(), AppRunError> {
    let interrupt_handle = interrupt_task(cancel.clone());

    let result = match BtleRadio::new().await {
        Ok(radio) => {
            let mut console = Console::stdio();
            run_remote(&radio, &config, &mut console, &cancel).await
        },
        Err(err) => Err(err.into()),
    };

    interrupt_handle.abort();

    result
}

pub fn run(config: Config) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run_async(config, CancellationToken::new()));

    // stdin is read on a blocking thread that cannot be interrupted
    runtime.shutdown_timeout(Duration::from_millis(SHUTDOWN_DEADLINE));

    result.map_err(AppRunError::normalize_cancel)
}
