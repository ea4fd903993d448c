//! # Transport Session Module
//!
//! Owns a live byte source (radio/Bluetooth bridge, serial port, anything
//! `AsyncRead`), feeds it to the frame decoder, optionally tees the raw
//! bytes to a session log, and tracks connection state.
//!
//! State machine:
//!
//! ```text
//! Idle -> Connecting -> Connected -> {Disconnected, ConnectionFailed}
//!                   \-> ConnectionFailed
//! ```
//!
//! `Disconnected` and `ConnectionFailed` return to `Idle` via
//! [`TelemetrySession::reset`]. The terminal [`ConnectionStatus`] event is
//! emitted to the listener exactly once per session.

pub mod log;

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::event::{ConnectionStatus, EventListener, TelemetryEvent};
use crate::protocol::decoder::StreamDecoder;

pub use log::SessionLog;

/// Read buffer size for the transport reader
const READ_BUF_SIZE: usize = 1024;

/// Lifecycle state of a [`TelemetrySession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    ConnectionFailed,
}

/// Single replaceable listener slot shared with the reader worker
///
/// The listener is taken out of the slot while its callback runs, so the
/// slot lock is never held across `on_event`. The epoch distinguishes a
/// replacement installed during the callback from no change.
#[derive(Default)]
struct ListenerCell {
    listener: Option<Box<dyn EventListener>>,
    epoch: u64,
}

type ListenerSlot = Arc<Mutex<ListenerCell>>;

/// Live telemetry session
///
/// One session drives one transport on one dedicated reader task; the
/// frame decoder is created for the session and dropped with it. Exactly
/// one listener is registered at a time, replaceable at will; events
/// produced while no listener is registered are lost, not buffered.
pub struct TelemetrySession {
    state: Arc<Mutex<SessionState>>,
    listener: ListenerSlot,
    shutdown: Arc<Notify>,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TelemetrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for TelemetrySession {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySession {
    /// Create an idle session
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
            listener: Arc::new(Mutex::new(ListenerCell::default())),
            shutdown: Arc::new(Notify::new()),
            reader: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Whether the session is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Register (or replace, or clear) the event listener
    ///
    /// Allowed in any state, including from inside a listener callback;
    /// the replacement takes effect from the next event. Events delivered
    /// before a listener registers are lost.
    pub fn set_listener(&self, listener: Option<Box<dyn EventListener>>) {
        store(&self.listener, listener);
    }

    /// Start a session over a transport that is still being established
    ///
    /// `establish` resolves to the byte source once the low-level link is
    /// up; until then the session is `Connecting`. On resolution the
    /// session turns `Connected` and emits
    /// [`ConnectionStatus::Connected`]; on establishment failure or
    /// cancellation it turns `ConnectionFailed`. When `log` is given, the
    /// raw received bytes are teed to it best-effort.
    ///
    /// Returns immediately; reading happens on a dedicated worker task.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::SessionBusy`] unless the session is idle.
    pub fn connect<F, R>(&mut self, establish: F, log: Option<SessionLog>) -> Result<()>
    where
        F: Future<Output = std::io::Result<R>> + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        {
            let mut state = self.state.lock().unwrap();
            if *state != SessionState::Idle {
                return Err(TelemetryError::SessionBusy);
            }
            *state = SessionState::Connecting;
        }

        // Fresh shutdown signal so a stale disconnect cannot cancel us
        self.shutdown = Arc::new(Notify::new());

        let state = Arc::clone(&self.state);
        let listener = Arc::clone(&self.listener);
        let shutdown = Arc::clone(&self.shutdown);
        self.reader = Some(tokio::spawn(run_session(
            establish, log, state, listener, shutdown,
        )));
        Ok(())
    }

    /// Tear the session down immediately
    ///
    /// In-flight reads are abandoned, not drained. A session still
    /// `Connecting` ends as `ConnectionFailed`, a connected one as
    /// `Disconnected`. No-op when idle.
    pub fn disconnect(&self) {
        self.shutdown.notify_one();
    }

    /// Wait for the reader worker to finish
    pub async fn wait_closed(&mut self) {
        if let Some(handle) = self.reader.take() {
            let _ = handle.await;
        }
    }

    /// Return a finished session to `Idle`
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::SessionBusy`] while connecting or
    /// connected.
    pub fn reset(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            SessionState::Idle => Ok(()),
            SessionState::Disconnected | SessionState::ConnectionFailed => {
                *state = SessionState::Idle;
                Ok(())
            }
            SessionState::Connecting | SessionState::Connected => Err(TelemetryError::SessionBusy),
        }
    }
}

/// Reader worker: establish the link, then pump bytes into the decoder
async fn run_session<F, R>(
    establish: F,
    mut log: Option<SessionLog>,
    state: Arc<Mutex<SessionState>>,
    listener: ListenerSlot,
    shutdown: Arc<Notify>,
) where
    F: Future<Output = std::io::Result<R>> + Send,
    R: AsyncRead + Unpin + Send,
{
    let mut transport = tokio::select! {
        result = establish => match result {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Link establishment failed: {}", e);
                finish(&state, &listener, log.take(), ConnectionStatus::ConnectionFailed);
                return;
            }
        },
        _ = shutdown.notified() => {
            info!("Connection attempt cancelled");
            finish(&state, &listener, log.take(), ConnectionStatus::ConnectionFailed);
            return;
        }
    };

    *state.lock().unwrap() = SessionState::Connected;
    info!("Telemetry link connected");
    dispatch(&listener, TelemetryEvent::ConnectionStatus(ConnectionStatus::Connected));

    let mut decoder = StreamDecoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Disconnect requested");
                break;
            }
            result = transport.read(&mut buf) => match result {
                Ok(0) => {
                    info!("Transport closed by peer");
                    break;
                }
                Ok(n) => {
                    debug!("Received {} bytes", n);
                    if let Some(log) = log.as_mut() {
                        log.append(&buf[..n]);
                    }
                    let mut sink = |event: TelemetryEvent| dispatch(&listener, event);
                    decoder.feed(&buf[..n], &mut sink);
                }
                Err(e) => {
                    warn!("Transport read failed: {}", e);
                    break;
                }
            }
        }
    }

    finish(&state, &listener, log.take(), ConnectionStatus::Disconnected);
}

/// Install, replace or clear the listener held by a slot
fn store(slot: &ListenerSlot, listener: Option<Box<dyn EventListener>>) {
    let mut cell = slot.lock().unwrap();
    cell.listener = listener;
    cell.epoch += 1;
}

/// Deliver one event to the registered listener, if any
///
/// The listener leaves the slot while its callback runs, so the callback
/// may itself replace or clear the listener. A restore only happens when
/// the slot was not touched in the meantime.
fn dispatch(slot: &ListenerSlot, event: TelemetryEvent) {
    let (mut listener, epoch) = {
        let mut cell = slot.lock().unwrap();
        match cell.listener.take() {
            Some(listener) => (listener, cell.epoch),
            None => return,
        }
    };

    listener.on_event(event);

    let mut cell = slot.lock().unwrap();
    if cell.epoch == epoch {
        cell.listener = Some(listener);
    }
}

/// Close the log, record the terminal state and emit its status once
fn finish(
    state: &Arc<Mutex<SessionState>>,
    listener: &ListenerSlot,
    log: Option<SessionLog>,
    status: ConnectionStatus,
) {
    if let Some(log) = log {
        log.finish();
    }

    *state.lock().unwrap() = match status {
        ConnectionStatus::Disconnected => SessionState::Disconnected,
        _ => SessionState::ConnectionFailed,
    };
    dispatch(listener, TelemetryEvent::ConnectionStatus(status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder;
    use std::io;
    use tokio::io::AsyncWriteExt;
    use tokio_test::assert_ok;

    /// Listener that records every event into a shared vector
    fn recording_listener() -> (Box<dyn EventListener>, Arc<Mutex<Vec<TelemetryEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |event: TelemetryEvent| sink.lock().unwrap().push(event);
        (Box::new(listener), seen)
    }

    #[tokio::test]
    async fn test_events_flow_to_listener_in_order() {
        let (mut client, server) = tokio::io::duplex(256);
        let (listener, seen) = recording_listener();

        let mut session = TelemetrySession::new();
        session.set_listener(Some(listener));
        assert_ok!(session.connect(async move { Ok(server) }, None));

        client.write_all(&encoder::altitude(50.0)).await.unwrap();
        client.write_all(&encoder::fuel(90)).await.unwrap();
        drop(client); // EOF ends the session

        session.wait_closed().await;

        let events = seen.lock().unwrap();
        assert_eq!(
            events[0],
            TelemetryEvent::ConnectionStatus(ConnectionStatus::Connected)
        );
        assert!(matches!(events[1], TelemetryEvent::Altitude(_)));
        assert_eq!(events[2], TelemetryEvent::Fuel(90));
        assert_eq!(
            events[3],
            TelemetryEvent::ConnectionStatus(ConnectionStatus::Disconnected)
        );
        assert_eq!(events.len(), 4, "Terminal status is emitted exactly once");
    }

    #[tokio::test]
    async fn test_establishment_failure_ends_as_connection_failed() {
        let (listener, seen) = recording_listener();

        let mut session = TelemetrySession::new();
        session.set_listener(Some(listener));
        session
            .connect(
                async move {
                    Err::<tokio::io::DuplexStream, _>(io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        "no route to radio",
                    ))
                },
                None,
            )
            .unwrap();

        session.wait_closed().await;

        assert_eq!(session.state(), SessionState::ConnectionFailed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TelemetryEvent::ConnectionStatus(
                ConnectionStatus::ConnectionFailed
            )]
        );
    }

    #[tokio::test]
    async fn test_cancel_during_connecting() {
        let mut session = TelemetrySession::new();
        session
            .connect(
                std::future::pending::<io::Result<tokio::io::Empty>>(),
                None,
            )
            .unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        session.disconnect();
        session.wait_closed().await;
        assert_eq!(session.state(), SessionState::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_disconnect_abandons_open_transport() {
        let (_client, server) = tokio::io::duplex(256);
        let mut session = TelemetrySession::new();
        assert_ok!(session.connect(async move { Ok(server) }, None));

        // Give the reader a chance to reach Connected, then cut it off
        // while a read is in flight
        tokio::task::yield_now().await;
        session.disconnect();
        session.wait_closed().await;

        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_while_active_is_rejected() {
        let (_client, server) = tokio::io::duplex(256);
        let mut session = TelemetrySession::new();
        session.connect(async move { Ok(server) }, None).unwrap();

        let (_client2, server2) = tokio::io::duplex(256);
        assert!(matches!(
            session.connect(async move { Ok(server2) }, None),
            Err(TelemetryError::SessionBusy)
        ));

        session.disconnect();
        session.wait_closed().await;
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let (client, server) = tokio::io::duplex(256);
        let mut session = TelemetrySession::new();
        session.connect(async move { Ok(server) }, None).unwrap();
        drop(client);
        session.wait_closed().await;

        assert_eq!(session.state(), SessionState::Disconnected);
        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        // An idle session accepts a new connection
        let (_client2, server2) = tokio::io::duplex(256);
        session.connect(async move { Ok(server2) }, None).unwrap();
        session.disconnect();
        session.wait_closed().await;
    }

    #[tokio::test]
    async fn test_session_log_records_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");

        let (mut client, server) = tokio::io::duplex(256);
        let mut session = TelemetrySession::new();
        session
            .connect(async move { Ok(server) }, Some(SessionLog::create(&path).unwrap()))
            .unwrap();

        // Valid frame plus noise: the log must carry the stream verbatim
        let mut stream = encoder::fuel(17);
        stream.extend_from_slice(&[0xDE, 0xAD]);
        client.write_all(&stream).await.unwrap();
        drop(client);

        session.wait_closed().await;
        assert_eq!(std::fs::read(&path).unwrap(), stream);
    }

    #[tokio::test]
    async fn test_listener_replacement_mid_session() {
        let (mut client, server) = tokio::io::duplex(256);
        let (first, seen_first) = recording_listener();
        let (second, seen_second) = recording_listener();

        let mut session = TelemetrySession::new();
        session.set_listener(Some(first));
        session.connect(async move { Ok(server) }, None).unwrap();

        client.write_all(&encoder::fuel(1)).await.unwrap();
        // Wait until the first listener saw the event before swapping
        while !seen_first
            .lock()
            .unwrap()
            .contains(&TelemetryEvent::Fuel(1))
        {
            tokio::task::yield_now().await;
        }

        session.set_listener(Some(second));
        client.write_all(&encoder::fuel(2)).await.unwrap();
        drop(client);
        session.wait_closed().await;

        assert!(!seen_first.lock().unwrap().contains(&TelemetryEvent::Fuel(2)));
        assert!(seen_second.lock().unwrap().contains(&TelemetryEvent::Fuel(2)));
    }

    #[test]
    fn test_listener_may_replace_itself_from_its_callback() {
        let slot: ListenerSlot = Arc::new(Mutex::new(ListenerCell::default()));
        let seen_second = Arc::new(Mutex::new(Vec::new()));

        // The first listener installs its replacement from inside its own
        // callback; the slot lock must not be held across on_event
        let inner_slot = Arc::clone(&slot);
        let sink = Arc::clone(&seen_second);
        let first = move |_: TelemetryEvent| {
            let sink = Arc::clone(&sink);
            store(
                &inner_slot,
                Some(Box::new(move |event: TelemetryEvent| {
                    sink.lock().unwrap().push(event)
                })),
            );
        };
        store(&slot, Some(Box::new(first)));

        dispatch(&slot, TelemetryEvent::Fuel(1));
        dispatch(&slot, TelemetryEvent::Fuel(2));

        // The replacement won over the restore of the first listener
        assert_eq!(*seen_second.lock().unwrap(), vec![TelemetryEvent::Fuel(2)]);
    }

    #[test]
    fn test_listener_may_clear_itself_from_its_callback() {
        let slot: ListenerSlot = Arc::new(Mutex::new(ListenerCell::default()));
        let calls = Arc::new(Mutex::new(0u32));

        let inner_slot = Arc::clone(&slot);
        let counter = Arc::clone(&calls);
        store(
            &slot,
            Some(Box::new(move |_: TelemetryEvent| {
                *counter.lock().unwrap() += 1;
                store(&inner_slot, None);
            })),
        );

        dispatch(&slot, TelemetryEvent::Fuel(1));
        dispatch(&slot, TelemetryEvent::Fuel(2));

        // The cleared listener must not be restored after its callback
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
