use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use futures::stream::select_all;
use log::{debug, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::device::command::Opcode;
use crate::device::constants::{BRAAVA_COMMAND_CHARACTERISTIC, BRAAVA_NOTIFY_CHARACTERISTIC, BRAAVA_SERVICE};
use crate::device::link::{Link, Radio};
use crate::device::types::{DiscoveredDevice, NotificationEvent, NotificationStream};
use crate::error::{ConnectionError, DiscoveryError, SubscriptionError, WriteError};

/// `Radio` backed by every bluetooth adapter btleplug can find.
pub struct BtleRadio {
    adapters: Vec<Adapter>,
    // DiscoveredDevice::id -> (adapter index, peripheral id) from the latest scan
    discovered: Mutex<HashMap<String, (usize, PeripheralId)>>,
}

fn device_key(index: usize, id: &impl fmt::Debug) -> String {
    format!("{}:{:?}", index, id)
}

impl BtleRadio {
    pub async fn new() -> Result<Self, DiscoveryError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        if adapters.is_empty() {
            return Err(DiscoveryError::NoAdapter);
        }

        Ok(BtleRadio { adapters, discovered: Mutex::new(HashMap::new()) })
    }

    fn discovered(&self) -> MutexGuard<'_, HashMap<String, (usize, PeripheralId)>> {
        self.discovered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn stop_scanning(&self) {
        for adapter in &self.adapters {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scanning: {:?}", err);
            }
        }
    }

    async fn resolve(&self, seen: Vec<(usize, PeripheralId)>) -> Vec<DiscoveredDevice> {
        let mut devices = Vec::new();
        let mut discovered = HashMap::new();

        for (index, id) in seen {
            let peripheral = match self.adapters[index].peripheral(&id).await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripheral: {}", err);
                    continue;
                },
            };

            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    warn!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    let key = device_key(index, &id);
                    debug!(
                        "Saw peripheral {} {} {:?} {}",
                        key,
                        properties.address,
                        properties.address_type,
                        properties.local_name.as_deref().unwrap_or("NONE"),
                    );
                    devices.push(DiscoveredDevice::new(
                        key.clone(),
                        properties.address.to_string(),
                        properties.local_name.as_deref(),
                    ));
                    discovered.insert(key, (index, id));
                },
            }
        }

        *self.discovered() = discovered;
        devices
    }
}

impl Radio for BtleRadio {
    type Link = BtleLink;

    async fn scan(&self, duration: Duration, cancel: &CancellationToken) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let mut streams = Vec::with_capacity(self.adapters.len());

        for (index, adapter) in self.adapters.iter().enumerate() {
            streams.push(adapter.events().await?.map(move |event| (index, event)).boxed());
        }

        for adapter in &self.adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            if let Err(err) = adapter.start_scan(ScanFilter::default()).await {
                // adapters started before this one are still scanning
                self.stop_scanning().await;
                return Err(err.into());
            }
        }

        let mut events = select_all(streams);
        let window = sleep(duration);
        tokio::pin!(window);

        // discovery order; a peripheral seen by two adapters is listed once per adapter
        let mut seen: Vec<(usize, PeripheralId)> = Vec::new();

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break Err(DiscoveryError::Cancelled);
                },
                _ = &mut window => {
                    break Ok(());
                },
                Some((index, event)) = events.next() => {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                        _ => continue,
                    };

                    if !seen.iter().any(|(i, known)| *i == index && known == &id) {
                        seen.push((index, id));
                    }
                },
            }
        };

        self.stop_scanning().await;
        outcome?;

        Ok(self.resolve(seen).await)
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<BtleLink, ConnectionError> {
        let found = self.discovered().get(&device.id).cloned();
        let (index, id) = found.ok_or_else(|| ConnectionError::DeviceGone { address: device.address.clone() })?;
        let peripheral = self.adapters[index].peripheral(&id).await?;

        info!("Connecting to peripheral...");
        peripheral.connect().await?;

        info!("Connected; Discovering services...");
        if let Err(err) = peripheral.discover_services().await {
            disconnect_quietly(&peripheral).await;
            return Err(err.into());
        }

        match find_characteristics(&peripheral) {
            Some((command_char, notify_char)) => Ok(BtleLink { peripheral, command_char, notify_char }),
            None => {
                disconnect_quietly(&peripheral).await;
                Err(ConnectionError::MissingCharacteristic)
            },
        }
    }
}

fn find_characteristics(peripheral: &Peripheral) -> Option<(Characteristic, Characteristic)> {
    let service = peripheral.services().into_iter().find(|service| service.uuid == BRAAVA_SERVICE)?;

    let find = |uuid| service.characteristics.iter().find(|characteristic| characteristic.uuid == uuid).cloned();

    Some((find(BRAAVA_COMMAND_CHARACTERISTIC)?, find(BRAAVA_NOTIFY_CHARACTERISTIC)?))
}

async fn disconnect_quietly(peripheral: &Peripheral) {
    if let Err(err) = peripheral.disconnect().await {
        warn!("Failed to disconnect: {:?}", err);
    }
}

pub struct BtleLink {
    peripheral: Peripheral,
    command_char: Characteristic,
    notify_char: Characteristic,
}

impl Link for BtleLink {
    async fn subscribe(&mut self) -> Result<NotificationStream, SubscriptionError> {
        // open the stream first so that frames sent right after subscribing are not missed
        let notifications = self.peripheral.notifications().await?;

        info!("Subscribing to characteristic {:?}", self.notify_char.uuid);
        self.peripheral.subscribe(&self.notify_char).await?;

        Ok(notifications
            .map(|notification| NotificationEvent {
                characteristic: notification.uuid,
                value: notification.value,
            })
            .boxed())
    }

    async fn unsubscribe(&mut self) -> Result<(), SubscriptionError> {
        self.peripheral.unsubscribe(&self.notify_char).await?;
        Ok(())
    }

    async fn write(&mut self, opcode: &Opcode) -> Result<(), WriteError> {
        self.peripheral.write(&self.command_char, opcode, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, ConnectionError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
