use std::io;
use thiserror::Error;
use btleplug;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Error scanning for devices (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("No matching devices found")]
    NoMatches,

    #[error("No matching device has address or id {address}")]
    NotFound { address: String },

    #[error("Scanning was cancelled")]
    Cancelled,
}

impl DiscoveryError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DiscoveryError::Btle { source: btleplug::Error::PermissionDenied })
    }
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Error connecting to device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("Device {address} is no longer available")]
    DeviceGone { address: String },

    #[error("Connection lost")]
    Lost,
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Failed to (un)subscribe to notifications (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write command (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection error: {source}")]
    Connection { #[from] source: ConnectionError },

    #[error("Subscription error: {source}")]
    Subscription { #[from] source: SubscriptionError },

    #[error("Failed to read/write the console: {source}")]
    Console { #[from] source: io::Error },

    #[error("Session was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Discovery failed: {source}")]
    Discovery { #[from] source: DiscoveryError },

    #[error("Session failed: {source}")]
    Session { #[from] source: SessionError },

    #[error("Failed to start runtime or read the console: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Stopped by operator")]
    OperatorCancel,
}

impl AppRunError {
    /// Normalizes the cancellation variants of the nested errors.
    pub fn normalize_cancel(self) -> Self {
        match self {
            AppRunError::Discovery { source: DiscoveryError::Cancelled } => AppRunError::OperatorCancel,
            AppRunError::Session { source: SessionError::Cancelled } => AppRunError::OperatorCancel,
            other => other,
        }
    }
}
