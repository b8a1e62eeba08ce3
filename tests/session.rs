//! Scanner, session controller and entry point driven against an in-memory radio.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures::stream::{self, StreamExt};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use braava_remote::config::types::Config;
use braava_remote::console::Console;
use braava_remote::device::command::Opcode;
use braava_remote::device::constants::BRAAVA_NOTIFY_CHARACTERISTIC;
use braava_remote::device::link::{Link, Radio};
use braava_remote::device::scanner::{scan_devices, ScanOptions};
use braava_remote::device::session::{SessionController, SessionOutcome};
use braava_remote::device::types::{DiscoveredDevice, NotificationEvent, NotificationStream, SessionState};
use braava_remote::error::{AppRunError, ConnectionError, DiscoveryError, SessionError, SubscriptionError, WriteError};
use braava_remote::remote::run_remote;

#[derive(Debug, Default)]
struct Calls {
    connects: usize,
    subscribes: usize,
    unsubscribes: usize,
    disconnects: usize,
    writes: Vec<Opcode>,
    // DiscoveredDevice::id of every connect call
    connected_ids: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct Behaviour {
    fail_scan: bool,
    fail_connect: bool,
    fail_subscribe: bool,
    fail_writes: bool,
    // the link reports itself disconnected after a failed write
    drop_on_write_failure: bool,
    connect_delay: Option<Duration>,
    // is_connected never resolves
    stall_is_connected: bool,
}

struct FakeRadio {
    advertisements: Vec<DiscoveredDevice>,
    behaviour: Behaviour,
    calls: Arc<Mutex<Calls>>,
}

impl FakeRadio {
    fn with(advertisements: Vec<DiscoveredDevice>, behaviour: Behaviour) -> Self {
        FakeRadio { advertisements, behaviour, calls: Arc::default() }
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

struct FakeLink {
    behaviour: Behaviour,
    calls: Arc<Mutex<Calls>>,
    connected: bool,
}

impl Radio for FakeRadio {
    type Link = FakeLink;

    async fn scan(&self, _duration: Duration, cancel: &CancellationToken) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        if self.behaviour.fail_scan {
            return Err(DiscoveryError::Btle { source: btleplug::Error::PermissionDenied });
        }
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        Ok(self.advertisements.clone())
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<FakeLink, ConnectionError> {
        {
            let mut calls = self.calls();
            calls.connects += 1;
            calls.connected_ids.push(device.id.clone());
        }

        if let Some(delay) = self.behaviour.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if self.behaviour.fail_connect {
            return Err(ConnectionError::Btle { source: btleplug::Error::DeviceNotFound });
        }

        Ok(FakeLink { behaviour: self.behaviour.clone(), calls: self.calls.clone(), connected: true })
    }
}

impl Link for FakeLink {
    async fn subscribe(&mut self) -> Result<NotificationStream, SubscriptionError> {
        if self.behaviour.fail_subscribe {
            return Err(SubscriptionError::Btle { source: btleplug::Error::NotConnected });
        }
        self.calls.lock().unwrap().subscribes += 1;

        let status = NotificationEvent { characteristic: BRAAVA_NOTIFY_CHARACTERISTIC, value: vec![0x8b, 0x03, 0x01] };
        Ok(stream::iter(vec![status]).chain(stream::pending()).boxed())
    }

    async fn unsubscribe(&mut self) -> Result<(), SubscriptionError> {
        self.calls.lock().unwrap().unsubscribes += 1;
        Ok(())
    }

    async fn write(&mut self, opcode: &Opcode) -> Result<(), WriteError> {
        self.calls.lock().unwrap().writes.push(*opcode);

        if self.behaviour.fail_writes {
            if self.behaviour.drop_on_write_failure {
                self.connected = false;
            }
            return Err(WriteError::Btle { source: btleplug::Error::NotConnected });
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, ConnectionError> {
        if self.behaviour.stall_is_connected {
            std::future::pending::<()>().await;
        }
        Ok(self.connected)
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.calls.lock().unwrap().disconnects += 1;
        self.connected = false;
        Ok(())
    }
}

fn robot() -> DiscoveredDevice {
    DiscoveredDevice::new("C0:FF:EE:00:00:01", "C0:FF:EE:00:00:01", Some("Braava Jet m6"))
}

async fn run_session(radio: &FakeRadio, input: &'static [u8]) -> (Result<SessionOutcome, SessionError>, String) {
    run_session_cancelled_after(radio, input, None).await
}

async fn run_session_cancelled_after(
    radio: &FakeRadio,
    input: &'static [u8],
    cancel_after: Option<Duration>,
) -> (Result<SessionOutcome, SessionError>, String) {
    let cancel = CancellationToken::new();
    if let Some(delay) = cancel_after {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            cancel.cancel();
        });
    }

    let mut output: Vec<u8> = Vec::new();
    let mut console = Console::new(input, &mut output);

    let result = {
        let mut session = SessionController::new(&mut console, cancel);
        let result = session.run(radio, &robot()).await;
        assert_eq!(session.state(), SessionState::Disconnected);
        result
    };

    drop(console);
    (result, String::from_utf8(output).unwrap())
}

fn config() -> Config {
    Config {
        scan_duration: Duration::from_millis(10),
        names: vec!["iRobot Braava".to_string(), "Braava Jet m6".to_string(), "Altadena".to_string()],
        device: None,
        log_level: log::LevelFilter::Info,
        log_file: None,
    }
}

#[tokio::test]
async fn start_writes_start_opcode() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, output) = run_session(&radio, b"start\nq\n").await;

    assert_eq!(result.unwrap(), SessionOutcome::Quit);
    assert_eq!(radio.calls().writes, vec![[0x8b, 0x02, 0x00, 0x00]]);
    assert!(!output.contains("Invalid command"));
}

#[tokio::test]
async fn dock_writes_dock_opcode() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, _) = run_session(&radio, b"DOCK\nq\n").await;

    assert!(result.is_ok());
    assert_eq!(radio.calls().writes, vec![[0x8b, 0x02, 0x00, 0x01]]);
}

#[tokio::test]
async fn every_command_reaches_the_wire_in_order() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, _) = run_session(&radio, b"start\nstop\nstatus\ndock\nq\n").await;

    assert!(result.is_ok());
    assert_eq!(radio.calls().writes, vec![
        [0x8b, 0x02, 0x00, 0x00],
        [0x8b, 0x02, 0x00, 0x02],
        [0x8b, 0x02, 0x00, 0x03],
        [0x8b, 0x02, 0x00, 0x01],
    ]);
}

#[tokio::test]
async fn invalid_command_is_reported_without_write() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, output) = run_session(&radio, b"xyz\nq\n").await;

    assert_eq!(result.unwrap(), SessionOutcome::Quit);
    assert!(radio.calls().writes.is_empty());
    assert_eq!(output.matches("Invalid command").count(), 1);
    // re-prompted after the invalid command
    assert_eq!(output.matches("Enter command: ").count(), 2);
}

#[tokio::test]
async fn quit_releases_subscription_and_connection_once() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, _) = run_session(&radio, b"q\n").await;

    assert_eq!(result.unwrap(), SessionOutcome::Quit);
    let calls = radio.calls();
    assert_eq!(calls.subscribes, 1);
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn closed_input_ends_session_cleanly() {
    let radio = FakeRadio::with(vec![], Behaviour::default());

    let (result, _) = run_session(&radio, b"status\n").await;

    assert_eq!(result.unwrap(), SessionOutcome::InputClosed);
    let calls = radio.calls();
    assert_eq!(calls.writes.len(), 1);
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn connection_failure_skips_command_loop() {
    let radio = FakeRadio::with(vec![], Behaviour { fail_connect: true, ..Behaviour::default() });

    let (result, output) = run_session(&radio, b"start\nq\n").await;

    assert!(matches!(result, Err(SessionError::Connection { source: ConnectionError::Btle { .. } })));
    assert!(output.is_empty());
    let calls = radio.calls();
    assert_eq!(calls.subscribes, 0);
    assert!(calls.writes.is_empty());
}

#[tokio::test]
async fn subscribe_failure_closes_connection() {
    let radio = FakeRadio::with(vec![], Behaviour { fail_subscribe: true, ..Behaviour::default() });

    let (result, output) = run_session(&radio, b"start\nq\n").await;

    assert!(matches!(result, Err(SessionError::Subscription { .. })));
    assert!(output.is_empty());
    let calls = radio.calls();
    assert_eq!(calls.unsubscribes, 0);
    assert_eq!(calls.disconnects, 1);
    assert!(calls.writes.is_empty());
}

#[tokio::test]
async fn write_failure_keeps_session_open() {
    let radio = FakeRadio::with(vec![], Behaviour { fail_writes: true, ..Behaviour::default() });

    let (result, _) = run_session(&radio, b"start\nstart\nq\n").await;

    assert_eq!(result.unwrap(), SessionOutcome::Quit);
    let calls = radio.calls();
    assert_eq!(calls.writes.len(), 2);
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn lost_connection_is_fatal_and_still_torn_down() {
    let behaviour = Behaviour { fail_writes: true, drop_on_write_failure: true, ..Behaviour::default() };
    let radio = FakeRadio::with(vec![], behaviour);

    let (result, _) = run_session(&radio, b"start\nstart\nq\n").await;

    assert!(matches!(result, Err(SessionError::Connection { source: ConnectionError::Lost })));
    let calls = radio.calls();
    assert_eq!(calls.writes.len(), 1);
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn cancel_while_waiting_for_input_tears_down() {
    let radio = FakeRadio::with(vec![], Behaviour::default());
    // the writing half stays open, so reading blocks until cancelled
    let (client, _server) = tokio::io::duplex(64);
    let mut console = Console::new(BufReader::new(client), tokio::io::sink());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let mut session = SessionController::new(&mut console, cancel);
    let result = session.run(&radio, &robot()).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(SessionError::Cancelled)));
    assert_eq!(session.state(), SessionState::Disconnected);
    let calls = radio.calls();
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn scan_keeps_only_named_matches_in_order() {
    let radio = FakeRadio::with(vec![
        DiscoveredDevice::new("01", "01", Some("Altadena")),
        DiscoveredDevice::new("02", "02", Some("Headphones")),
        DiscoveredDevice::new("03", "03", None),
        DiscoveredDevice::new("04", "04", Some("iRobot Braava 390t")),
    ], Behaviour::default());
    let options = ScanOptions { duration: Duration::from_millis(10), names: config().names };

    let found = scan_devices(&radio, &options, &CancellationToken::new()).await.unwrap();

    let addresses: Vec<&str> = found.iter().map(|device| device.address.as_str()).collect();
    assert_eq!(addresses, vec!["01", "04"]);
}

#[tokio::test]
async fn no_matches_means_no_connection_attempt() {
    let radio = FakeRadio::with(vec![DiscoveredDevice::new("01", "01", Some("Headphones"))], Behaviour::default());
    let mut console = Console::new(&b"start\nq\n"[..], tokio::io::sink());

    let result = run_remote(&radio, &config(), &mut console, &CancellationToken::new()).await;

    assert!(matches!(result, Err(AppRunError::Discovery { source: DiscoveryError::NoMatches })));
    assert_eq!(radio.calls().connects, 0);
}

#[tokio::test]
async fn failed_scan_means_no_connection_attempt() {
    let radio = FakeRadio::with(vec![robot()], Behaviour { fail_scan: true, ..Behaviour::default() });
    let mut console = Console::new(&b"q\n"[..], tokio::io::sink());

    let result = run_remote(&radio, &config(), &mut console, &CancellationToken::new()).await;

    match result {
        Err(AppRunError::Discovery { source }) => assert!(source.is_permission_denied()),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(radio.calls().connects, 0);
}

#[tokio::test]
async fn cancelled_scan_is_an_operator_cancel() {
    let radio = FakeRadio::with(vec![robot()], Behaviour::default());
    let mut console = Console::new(&b"q\n"[..], tokio::io::sink());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_remote(&radio, &config(), &mut console, &cancel).await;

    assert!(matches!(result.map_err(AppRunError::normalize_cancel), Err(AppRunError::OperatorCancel)));
    assert_eq!(radio.calls().connects, 0);
}

#[tokio::test]
async fn run_connects_to_the_single_match() {
    let radio = FakeRadio::with(vec![DiscoveredDevice::new("01", "01", Some("Headphones")), robot()], Behaviour::default());
    let mut console = Console::new(&b"status\nq\n"[..], tokio::io::sink());

    run_remote(&radio, &config(), &mut console, &CancellationToken::new()).await.unwrap();

    let calls = radio.calls();
    assert_eq!(calls.connects, 1);
    assert_eq!(calls.writes, vec![[0x8b, 0x02, 0x00, 0x03]]);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn declined_selection_connects_to_nothing() {
    let radio = FakeRadio::with(vec![robot(), DiscoveredDevice::new("C0:FF:EE:00:00:02", "C0:FF:EE:00:00:02", Some("Altadena"))], Behaviour::default());
    let mut console = Console::new(&b"q\n"[..], tokio::io::sink());

    run_remote(&radio, &config(), &mut console, &CancellationToken::new()).await.unwrap();

    assert_eq!(radio.calls().connects, 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_connecting_closes_the_late_link() {
    let radio = FakeRadio::with(vec![], Behaviour { connect_delay: Some(Duration::from_millis(100)), ..Behaviour::default() });

    let (result, output) = run_session_cancelled_after(&radio, b"start\nq\n", Some(Duration::from_millis(20))).await;

    assert!(matches!(result, Err(SessionError::Cancelled)));
    assert!(output.is_empty());
    let calls = radio.calls();
    assert_eq!(calls.connects, 1);
    assert_eq!(calls.subscribes, 0);
    assert_eq!(calls.disconnects, 1);
    assert!(calls.writes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_while_link_query_stalls_tears_down() {
    let radio = FakeRadio::with(vec![], Behaviour { stall_is_connected: true, ..Behaviour::default() });

    let session = run_session_cancelled_after(&radio, b"q\n", Some(Duration::from_millis(20)));
    let (result, _) = tokio::time::timeout(Duration::from_secs(1), session).await
        .expect("session did not stop after cancel");

    assert!(matches!(result, Err(SessionError::Cancelled)));
    let calls = radio.calls();
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_link_query_counts_as_lost() {
    let radio = FakeRadio::with(vec![], Behaviour { stall_is_connected: true, ..Behaviour::default() });

    let (result, output) = run_session(&radio, b"start\nq\n").await;

    assert!(matches!(result, Err(SessionError::Connection { source: ConnectionError::Lost })));
    // the link is checked before the menu is shown
    assert!(output.is_empty());
    let calls = radio.calls();
    assert!(calls.writes.is_empty());
    assert_eq!(calls.unsubscribes, 1);
    assert_eq!(calls.disconnects, 1);
}

#[tokio::test]
async fn devices_sharing_an_address_are_told_apart_by_id() {
    // macOS reports the same zero address for every peripheral
    let radio = FakeRadio::with(vec![
        DiscoveredDevice::new("0:first", "00:00:00:00:00:00", Some("iRobot Braava")),
        DiscoveredDevice::new("0:second", "00:00:00:00:00:00", Some("Braava Jet m6")),
    ], Behaviour::default());
    let mut console = Console::new(&b"2\nq\n"[..], tokio::io::sink());

    run_remote(&radio, &config(), &mut console, &CancellationToken::new()).await.unwrap();

    assert_eq!(radio.calls().connected_ids, vec!["0:second"]);
}

#[tokio::test]
async fn preferred_device_by_id() {
    let radio = FakeRadio::with(vec![
        DiscoveredDevice::new("0:first", "00:00:00:00:00:00", Some("iRobot Braava")),
        DiscoveredDevice::new("0:second", "00:00:00:00:00:00", Some("Braava Jet m6")),
    ], Behaviour::default());
    let mut console = Console::new(&b"q\n"[..], tokio::io::sink());
    let config = Config { device: Some("0:first".to_string()), ..config() };

    run_remote(&radio, &config, &mut console, &CancellationToken::new()).await.unwrap();

    assert_eq!(radio.calls().connected_ids, vec!["0:first"]);
}
