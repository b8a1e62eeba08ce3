use futures::StreamExt;
use log::{info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::command::hex_dump;
use crate::device::constants::BRAAVA_NOTIFY_CHARACTERISTIC;
use crate::device::types::{NotificationEvent, NotificationStream};

/// The log line for one status frame, e.g. `Notification: 8b 03 01`.
pub fn describe_notification(event: &NotificationEvent) -> String {
    if event.characteristic == BRAAVA_NOTIFY_CHARACTERISTIC {
        format!("Notification: {}", hex_dump(&event.value))
    } else {
        format!("Notification from {}: {}", event.characteristic, hex_dump(&event.value))
    }
}

fn log_notification(event: &NotificationEvent) {
    info!("{}", describe_notification(event));
}

/// Consumes status frames until `cancel` fires or the stream ends.
/// Runs beside the command loop.
pub fn notification_sink_task(cancel: CancellationToken, mut notifications: NotificationStream) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = notifications.next() => match event {
                    Some(event) => log_notification(&event),
                    None => {
                        warn!("Notification stream ended");
                        break 'mainloop;
                    },
                },
            }
        }
    })
}
