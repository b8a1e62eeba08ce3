use std::fmt;
use std::pin::Pin;
use futures::Stream;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Opaque key the radio uses to find the peripheral again; unique within one scan
    pub id: String,
    /// Hardware address as reported by the platform, e.g. `C0:FF:EE:00:11:22`.
    /// macOS reports `00:00:00:00:00:00` for every peripheral, so this is for display only.
    pub address: String,
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, address: impl Into<String>, name: Option<&str>) -> Self {
        DiscoveredDevice {
            id: id.into(),
            address: address.into(),
            name: name.map(String::from),
        }
    }

    /// `--device` accepts either the hardware address or the opaque id.
    pub fn is_identified_by(&self, wanted: &str) -> bool {
        self.address.eq_ignore_ascii_case(wanted) || self.id == wanted
    }

    pub fn matches_any(&self, names: &[String]) -> bool {
        match &self.name {
            Some(name) => names.iter().any(|wanted| name.contains(wanted.as_str())),
            None => false,
        }
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name.as_deref().unwrap_or("NONE"), self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

pub type NotificationStream = Pin<Box<dyn Stream<Item = NotificationEvent> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
        };

        write!(f, "{}", result)
    }
}
