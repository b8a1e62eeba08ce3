use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use log::LevelFilter;

use crate::device::constants::PRODUCT_NAMES;
use crate::device::scanner::ScanOptions;

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value.parse().map_err(|_| format!("invalid log level: {}", value))
}

#[derive(Parser, Debug, Clone)]
#[command(author, version)]
#[command(about = "Finds a nearby iRobot Braava and sends it commands typed on the console", long_about = None)]
pub struct Config {
    /// How long to listen for advertisements, e.g. "10s" or "1m 30s"
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub scan_duration: Duration,

    /// Accept devices whose advertised name contains NAME. May be repeated.
    #[arg(long = "name", value_name = "NAME", default_values = PRODUCT_NAMES)]
    pub names: Vec<String>,

    /// Hardware address of the device to control when more than one is found
    #[arg(long, value_name = "ADDRESS")]
    pub device: Option<String>,

    /// One of off, error, warn, info, debug, trace
    #[arg(long, value_parser = parse_level, default_value = "info")]
    pub log_level: LevelFilter,

    /// Also append log records to this file
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            duration: self.scan_duration,
            names: self.names.clone(),
        }
    }
}
