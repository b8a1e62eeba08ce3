use std::time::Duration;
use log::{error, info, warn};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::console::Console;
use crate::device::command::{hex_dump, Command, ConsoleInput};
use crate::device::constants::{CONNECT_SETTLE_DEADLINE, IS_CONNECTED_DEADLINE};
use crate::device::link::{Link, Radio};
use crate::device::notifications::notification_sink_task;
use crate::device::types::{DiscoveredDevice, SessionState};
use crate::error::{ConnectionError, SessionError};

const COMMAND_PROMPT: &str = "Enter command: ";

/// How the operator ended a session that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Quit,
    InputClosed,
}

pub struct SessionController<'c, I, O> {
    console: &'c mut Console<I, O>,
    cancel: CancellationToken,
    state: SessionState,
}

impl<'c, I: AsyncBufRead + Unpin, O: AsyncWrite + Unpin> SessionController<'c, I, O> {
    pub fn new(console: &'c mut Console<I, O>, cancel: CancellationToken) -> Self {
        SessionController {
            console,
            cancel,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        info!("Session {} -> {}", self.state, state);
        self.state = state;
    }

    /// Connects to `device`, enables notifications and runs the command loop.
    ///
    /// Once notifications are enabled every exit path unsubscribes and disconnects exactly once,
    /// including cancellation and fatal link errors.
    pub async fn run<R: Radio>(&mut self, radio: &R, device: &DiscoveredDevice) -> Result<SessionOutcome, SessionError> {
        self.set_state(SessionState::Connecting);
        info!("Connecting to {}...", device);

        let cancel = self.cancel.clone();
        let connect = radio.connect(device);
        tokio::pin!(connect);

        let connected = tokio::select! {
            _ = cancel.cancelled() => None,
            result = &mut connect => Some(result),
        };

        let mut link = match connected {
            Some(Ok(link)) => link,
            Some(Err(err)) => {
                self.set_state(SessionState::Disconnected);
                return Err(err.into());
            },
            None => {
                // BlueZ keeps connecting after this future is dropped
                info!("Waiting for the connection attempt to finish...");
                match timeout(Duration::from_millis(CONNECT_SETTLE_DEADLINE), connect).await {
                    Ok(Ok(mut link)) => {
                        if let Err(err) = link.disconnect().await {
                            warn!("Failed to disconnect: {}", err);
                        }
                    },
                    Ok(Err(err)) => info!("Connection attempt failed: {}", err),
                    Err(_) => warn!("Connection attempt took too long, abandoning it"),
                }
                self.set_state(SessionState::Disconnected);
                return Err(SessionError::Cancelled);
            },
        };

        self.set_state(SessionState::Connected);

        let notifications = match link.subscribe().await {
            Ok(notifications) => notifications,
            Err(err) => {
                self.close(&mut link).await;
                return Err(err.into());
            },
        };
        info!("Notifications enabled");

        let sink_cancel = self.cancel.child_token();
        let sink_handle = notification_sink_task(sink_cancel.clone(), notifications);

        let result = self.command_loop(&mut link).await;

        sink_cancel.cancel();
        if let Err(err) = sink_handle.await {
            warn!("Notification task failed: {:?}", err);
        }

        if let Err(err) = link.unsubscribe().await {
            warn!("Failed to disable notifications: {}", err);
        }
        self.close(&mut link).await;

        result
    }

    async fn close<L: Link>(&mut self, link: &mut L) {
        if let Err(err) = link.disconnect().await {
            warn!("Failed to disconnect: {}", err);
        }
        self.set_state(SessionState::Disconnected);
    }

    /// Fails with `ConnectionError::Lost` when the link is down or does not answer in time.
    async fn ensure_connected<L: Link>(&self, link: &L) -> Result<(), SessionError> {
        let cancel = self.cancel.clone();

        tokio::select! {
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
                // macOS
                warn!("Checking for connection status took too long");
                Err(ConnectionError::Lost.into())
            },
            result = link.is_connected() => match result? {
                true => Ok(()),
                false => {
                    warn!("Connection lost");
                    Err(ConnectionError::Lost.into())
                },
            },
        }
    }

    async fn command_loop<L: Link>(&mut self, link: &mut L) -> Result<SessionOutcome, SessionError> {
        let cancel = self.cancel.clone();

        loop {
            self.ensure_connected(link).await?;

            self.console.print_menu().await?;

            let line = tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                line = self.console.prompt(COMMAND_PROMPT) => line?,
            };

            let line = match line {
                Some(line) => line,
                None => {
                    info!("Console input closed");
                    return Ok(SessionOutcome::InputClosed);
                },
            };

            match ConsoleInput::parse(&line) {
                ConsoleInput::Quit => return Ok(SessionOutcome::Quit),
                ConsoleInput::Invalid(_) => self.console.say("Invalid command").await?,
                ConsoleInput::Command(command) => self.send_command(link, command).await?,
            }
        }
    }

    /// A failed write only aborts this command, unless the link went down with it.
    async fn send_command<L: Link>(&mut self, link: &mut L, command: Command) -> Result<(), SessionError> {
        let opcode = command.opcode();
        info!("Sending command {}: {}", command, hex_dump(&opcode));

        let cancel = self.cancel.clone();
        let written = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            result = link.write(&opcode) => result,
        };

        let err = match written {
            Ok(()) => {
                info!("Command {} delivered", command);
                return Ok(());
            },
            Err(err) => err,
        };

        error!("Command failed: {}", err);

        self.ensure_connected(link).await
    }
}
