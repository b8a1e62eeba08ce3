#![allow(async_fn_in_trait)]

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::device::command::Opcode;
use crate::device::types::{DiscoveredDevice, NotificationStream};
use crate::error::{ConnectionError, DiscoveryError, SubscriptionError, WriteError};

/// Radio stack able to listen for advertisements and open connections.
pub trait Radio {
    type Link: Link;

    /// Collects advertisements for `duration`, returning every device seen in discovery order.
    /// Returns `DiscoveryError::Cancelled` if `cancel` fires during the window.
    async fn scan(&self, duration: Duration, cancel: &CancellationToken) -> Result<Vec<DiscoveredDevice>, DiscoveryError>;

    /// Connects and resolves the command and notification characteristics.
    async fn connect(&self, device: &DiscoveredDevice) -> Result<Self::Link, ConnectionError>;
}

/// One open connection to a robot.
pub trait Link {
    async fn subscribe(&mut self) -> Result<NotificationStream, SubscriptionError>;

    async fn unsubscribe(&mut self) -> Result<(), SubscriptionError>;

    /// Writes with response: resolves once the link layer confirmed delivery.
    async fn write(&mut self, opcode: &Opcode) -> Result<(), WriteError>;

    async fn is_connected(&self) -> Result<bool, ConnectionError>;

    async fn disconnect(&mut self) -> Result<(), ConnectionError>;
}
