use std::process::ExitCode;
use clap::Parser;
use log::{error, info};
use braava_remote::{init_logging, run};
use braava_remote::config::types::Config;
use braava_remote::error::AppRunError;

fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(err) = init_logging(&config) {
        eprintln!("Failed to initialize logger: {}", err);
        return ExitCode::FAILURE;
    }
    info!(concat!("Braava Remote ", env!("CARGO_PKG_VERSION")));

    match run(config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(AppRunError::OperatorCancel) => {
            info!("Program stopped by user");
            ExitCode::SUCCESS
        },
        Err(AppRunError::Discovery { source }) if source.is_permission_denied() => {
            error!("Bluetooth permission denied; grant this program access to bluetooth and try again");
            ExitCode::FAILURE
        },
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        },
    }
}
