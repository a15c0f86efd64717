//! The session facade: connect/disconnect, the background reader
//! thread, listener fan-out, and the `wait_for_*` synchronization
//! primitives (spec §4.6, §5).

pub mod config;
pub mod stream;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use regex::Regex;

pub use config::{SessionConfig, TlsMode};
use stream::StreamType;

use crate::error::{ConnectionError, Error, FieldError, Result, TimeoutError};
use crate::keyboard::{Key, Keyboard, KeyOutcome};
use crate::protocol::decoder::Decoder;
use crate::protocol::encoder::Encoder;
use crate::screen::{Field, Oia};
use crate::screen::cursor::Cursor;
use crate::screen::Screen;
use crate::telnet::{TelnetCodec, TelnetFramer};

/// Session lifecycle (spec §3 "Session").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected { cause: Option<String> },
    Connecting,
    Negotiating,
    Bound,
    Active,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    ScreenChanged,
    OiaChanged,
    Connected,
    Disconnected,
}

pub type ListenerFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

struct ListenerEntry {
    id: u64,
    kind: ListenerKind,
    callback: ListenerFn,
}

/// A read-only copy of the screen taken under the screen lock, safe to
/// hold across an I/O call without contending with the reader thread.
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub text: String,
    pub cursor: Cursor,
    pub fields: Vec<Field>,
}

impl ScreenSnapshot {
    pub fn char_at(&self, row: usize, col: usize) -> char {
        self.text.lines().nth(row).and_then(|line| line.chars().nth(col)).unwrap_or(' ')
    }

    pub fn field_at(&self, pos: usize) -> Option<&Field> {
        self.fields.iter().find(|f| f.contains(pos))
    }
}

/// Generation counter + cached `keyboard_locked` flag: lightweight
/// "is the keyboard available" polls check this instead of taking the
/// full screen lock (spec §5, OIA behind its own lock).
struct EventGate {
    state: Mutex<EventState>,
    condvar: Condvar,
}

#[derive(Clone, Copy)]
struct EventState {
    generation: u64,
    keyboard_locked: bool,
}

impl EventGate {
    fn new() -> Self {
        EventGate {
            state: Mutex::new(EventState { generation: 0, keyboard_locked: true }),
            condvar: Condvar::new(),
        }
    }

    fn publish(&self, keyboard_locked: bool) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.keyboard_locked = keyboard_locked;
        self.condvar.notify_all();
    }

    fn keyboard_locked(&self) -> bool {
        self.state.lock().unwrap().keyboard_locked
    }

    /// Waits until `predicate` holds or `timeout` elapses, re-checking
    /// after every wake (guards against spurious wakeups, spec §5).
    fn wait_for<F: FnMut() -> bool>(&self, what: &str, timeout: Duration, mut predicate: F) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate() {
                return Ok(());
            }
            let state = self.state.lock().unwrap();
            let generation = state.generation;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(TimeoutError {
                    waited_for: what.to_string(),
                    elapsed_ms: timeout.as_millis() as u64,
                }));
            }
            let (_guard, result) = self
                .condvar
                .wait_timeout_while(state, remaining, |s| s.generation == generation)
                .unwrap();
            if result.timed_out() && !predicate() {
                return Err(Error::Timeout(TimeoutError {
                    waited_for: what.to_string(),
                    elapsed_ms: timeout.as_millis() as u64,
                }));
            }
        }
    }
}

struct Writer {
    stream: Mutex<Option<StreamType>>,
}

impl Writer {
    fn write_record(&self, payload: &[u8]) -> Result<()> {
        let mut guard = self.stream.lock().unwrap();
        let Some(stream) = guard.as_mut() else {
            return Err(Error::Connection(ConnectionError::Closed { reason: "not connected".into() }));
        };
        let framed = TelnetFramer::frame(payload);
        stream.write_all(&framed)?;
        stream.flush()?;
        Ok(())
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.stream.lock().unwrap();
        let Some(stream) = guard.as_mut() else {
            return Err(Error::Connection(ConnectionError::Closed { reason: "not connected".into() }));
        };
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }
}

struct Shared {
    config: SessionConfig,
    state: Mutex<ConnectionState>,
    screen: RwLock<Screen>,
    event_gate: EventGate,
    keyboard: Keyboard,
    decoder: Decoder,
    encoder: Encoder,
    writer: Writer,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    field_names: Mutex<HashMap<String, (usize, usize)>>,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Builds a new, not-yet-connected session from `config`. Call
/// [`Session::connect`] to open the socket and start negotiation.
pub fn open_session(config: SessionConfig) -> Session {
    Session::new(config)
}

/// Owns the socket, negotiator/decoder/encoder pipeline, screen model,
/// and listener set for one TN5250 host connection (spec §4.6).
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let rows = config.rows;
        let cols = config.cols;
        let ccsid = config.ccsid.clone();
        let shared = Shared {
            config,
            state: Mutex::new(ConnectionState::Disconnected { cause: None }),
            screen: RwLock::new(Screen::new(rows, cols)),
            event_gate: EventGate::new(),
            keyboard: Keyboard::new(ccsid.clone()),
            decoder: Decoder::new(ccsid.clone()),
            encoder: Encoder::new(ccsid),
            writer: Writer { stream: Mutex::new(None) },
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            field_names: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(true),
            reader: Mutex::new(None),
        };
        Session { shared: Arc::new(shared) }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.shared.state.lock().unwrap() = state;
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Opens the socket, runs Telnet negotiation, and starts the
    /// background reader. Returns once the connection is established;
    /// `Active` is reached asynchronously on the host's first WTD.
    pub fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let cfg = &self.shared.config;
        let stream = match &cfg.tls {
            None => StreamType::connect_plain(&cfg.host, cfg.port, cfg.connect_timeout)?,
            Some(mode) => StreamType::connect_tls(&cfg.host, cfg.port, cfg.connect_timeout, mode)?,
        };
        // Short poll interval on the socket itself, not `read_timeout`:
        // the reader and the writer share one stream handle (TLS state
        // can't be split across threads), so the read syscall must keep
        // giving the mutex back up for outbound writes to get a turn.
        // `read_timeout` is enforced separately as an idle-silence budget.
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;

        self.set_state(ConnectionState::Negotiating);
        let mut codec = TelnetCodec::new(cfg.device_name.clone());
        codec.negotiator_mut().user = cfg.user.clone();
        codec.negotiator_mut().password = cfg.password.clone();

        *self.shared.writer.stream.lock().unwrap() = Some(stream);
        self.shared.closed.store(false, Ordering::SeqCst);
        self.shared.writer.write_raw(&codec.initial_negotiation())?;

        let shared = self.shared.clone();
        let handle = thread::spawn(move || reader_loop(shared, codec));
        *self.shared.reader.lock().unwrap() = Some(handle);
        self.notify(ListenerKind::Connected);
        Ok(())
    }

    /// Best-effort negotiated-option teardown, socket close, state
    /// transition, listener notification (spec §4.6).
    pub fn disconnect(&mut self) {
        self.set_state(ConnectionState::Disconnecting);
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(stream) = self.shared.writer.stream.lock().unwrap().as_ref() {
            stream.shutdown();
        }
        if let Some(handle) = self.shared.reader.lock().unwrap().take() {
            let _ = handle.join();
        }
        *self.shared.writer.stream.lock().unwrap() = None;
        self.set_state(ConnectionState::Disconnected { cause: Some("closed by caller".to_string()) });
        self.shared.event_gate.publish(true);
        self.notify(ListenerKind::Disconnected);
    }

    pub fn send_key(&self, key: Key) -> Result<()> {
        let response = {
            let mut screen = self.shared.screen.write().unwrap();
            match self.shared.keyboard.send_key(&mut screen, key)? {
                KeyOutcome::Handled => None,
                KeyOutcome::Response(bytes) => Some(bytes),
            }
        };
        self.publish_oia();
        if let Some(bytes) = response {
            self.shared.writer.write_record(&bytes)?;
        }
        Ok(())
    }

    pub fn send_string(&self, text: &str) -> Result<()> {
        {
            let mut screen = self.shared.screen.write().unwrap();
            self.shared.keyboard.send_string(&mut screen, text)?;
        }
        self.publish_oia();
        Ok(())
    }

    fn publish_oia(&self) {
        let locked = self.shared.screen.read().unwrap().oia().keyboard_locked();
        self.shared.event_gate.publish(locked);
    }

    pub fn screen(&self) -> ScreenSnapshot {
        let screen = self.shared.screen.read().unwrap();
        ScreenSnapshot {
            rows: screen.rows(),
            cols: screen.cols(),
            text: screen.text(),
            cursor: *screen.cursor(),
            fields: screen.fields().iter().cloned().collect(),
        }
    }

    pub fn cursor(&self) -> (usize, usize) {
        let screen = self.shared.screen.read().unwrap();
        screen.cursor().row_col(screen.cols())
    }

    /// Places the cursor directly, bypassing field navigation. Used by
    /// the workflow `Fill` step, which addresses fields by name/position
    /// rather than by tabbing from wherever the cursor currently sits.
    pub fn move_cursor_to(&self, row: usize, col: usize) {
        let mut screen = self.shared.screen.write().unwrap();
        let cols = screen.cols();
        screen.cursor_mut().set_row_col(row, col, cols);
    }

    pub fn oia(&self) -> Oia {
        self.shared.screen.read().unwrap().oia().clone()
    }

    pub fn add_listener(&self, kind: ListenerKind, callback: ListenerFn) -> ListenerHandle {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.shared.listeners.lock().unwrap().push(ListenerEntry { id, kind, callback });
        ListenerHandle(id)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.shared.listeners.lock().unwrap().retain(|e| e.id != handle.0);
    }

    fn notify(&self, kind: ListenerKind) {
        let snapshot: Vec<ListenerFn> = {
            let guard = self.shared.listeners.lock().unwrap();
            guard.iter().filter(|e| e.kind == kind).map(|e| e.callback.clone()).collect()
        };
        for cb in snapshot {
            cb();
        }
    }

    /// Registers a human name for a screen position, used by
    /// `wait_for_field` and the workflow `Fill`/`Assert` steps.
    pub fn register_field(&self, name: impl Into<String>, row: usize, col: usize) {
        self.shared.field_names.lock().unwrap().insert(name.into(), (row, col));
    }

    pub fn field_position(&self, name: &str) -> Result<(usize, usize)> {
        self.shared
            .field_names
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| Error::Field(FieldError::NotFound { name: name.to_string() }))
    }

    pub fn wait_for_keyboard_unlock(&self, timeout: Duration) -> Result<()> {
        self.check_closed()?;
        self.shared.event_gate.wait_for("keyboard unlock", timeout, || !self.shared.event_gate.keyboard_locked())
    }

    pub fn wait_for_text(&self, pattern: &Regex, timeout: Duration) -> Result<()> {
        self.check_closed()?;
        let shared = self.shared.clone();
        let pattern = pattern.clone();
        self.shared.event_gate.wait_for("screen text", timeout, move || {
            pattern.is_match(&shared.screen.read().unwrap().text())
        })
    }

    pub fn wait_for_field(&self, name: &str, timeout: Duration) -> Result<()> {
        self.check_closed()?;
        let (row, col) = self.field_position(name)?;
        let shared = self.shared.clone();
        self.shared.event_gate.wait_for(&format!("field '{name}'"), timeout, move || {
            let screen = shared.screen.read().unwrap();
            let pos = screen.pos_of(row, col);
            screen.field_at(pos).is_some()
        })
    }

    fn check_closed(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(Error::Connection(ConnectionError::Closed { reason: "session not connected".into() }));
        }
        Ok(())
    }
}

/// The reader owns the writer's mutex-guarded stream handle directly
/// rather than a cloned socket (TLS connections can't be cloned),
/// relying on the fact that a blocking read and an occasional outbound
/// write never overlap for long under this protocol's half-duplex
/// AID/response rhythm.
/// Socket read timeout used for each individual `read()` call so the
/// stream mutex is periodically released for the writer, independent of
/// the much larger idle-silence budget in `SessionConfig::read_timeout`.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn reader_loop(shared: Arc<Shared>, mut codec: TelnetCodec) {
    let mut buf = [0u8; crate::telnet::READ_BUFFER_SIZE];
    let mut last_activity = Instant::now();
    loop {
        if shared.closed.load(Ordering::SeqCst) {
            break;
        }
        let n = {
            let mut guard = shared.writer.stream.lock().unwrap();
            let Some(stream) = guard.as_mut() else { break };
            match stream.read(&mut buf) {
                Ok(0) => {
                    drop(guard);
                    mark_closed(&shared, "connection closed by host".to_string());
                    break;
                }
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    drop(guard);
                    if last_activity.elapsed() > shared.config.read_timeout {
                        mark_closed(&shared, format!(
                            "no data from host for {:?}, idle timeout exceeded",
                            shared.config.read_timeout
                        ));
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    drop(guard);
                    mark_closed(&shared, format!("read error: {e}"));
                    break;
                }
            }
        };
        last_activity = Instant::now();
        if !process_chunk(&shared, &mut codec, &buf[..n]) {
            break;
        }
    }
}

fn mark_closed(shared: &Arc<Shared>, reason: String) {
    shared.closed.store(true, Ordering::SeqCst);
    *shared.state.lock().unwrap() = ConnectionState::Disconnected { cause: Some(reason) };
    shared.event_gate.publish(true);
}

/// Returns `false` if a protocol error tore down the session.
fn process_chunk(shared: &Arc<Shared>, codec: &mut TelnetCodec, chunk: &[u8]) -> bool {
    let output = match codec.feed(chunk) {
        Ok(out) => out,
        Err(e) => {
            log::error!("telnet framing error, tearing down session: {e}");
            mark_closed(shared, e.to_string());
            return false;
        }
    };
    if !output.replies.is_empty() {
        let _ = shared.writer.write_raw(&output.replies);
    }
    if codec.negotiator().is_complete() && matches!(*shared.state.lock().unwrap(), ConnectionState::Negotiating) {
        *shared.state.lock().unwrap() = ConnectionState::Bound;
    }

    for record in output.records {
        let outcome = {
            let mut screen = shared.screen.write().unwrap();
            match shared.decoder.decode_record(&mut screen, &record) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("protocol error decoding record, tearing down session: {e}");
                    drop(screen);
                    mark_closed(shared, e.to_string());
                    return false;
                }
            }
        };

        for reply in &outcome.replies {
            let _ = shared.writer.write_record(reply);
        }
        if let Some(negative) = &outcome.negative_response {
            let _ = shared.writer.write_record(negative);
        }
        if let Some(request) = outcome.read_request {
            let screen = shared.screen.read().unwrap();
            let encoded = shared.encoder.encode_read_fields_response(request, &screen);
            drop(screen);
            match encoded {
                Ok(bytes) => {
                    let _ = shared.writer.write_record(&bytes);
                }
                Err(e) => log::warn!("failed to encode read-fields response: {e}"),
            }
        }

        {
            let mut state = shared.state.lock().unwrap();
            if matches!(*state, ConnectionState::Bound | ConnectionState::Negotiating) {
                *state = ConnectionState::Active;
            }
        }
        let locked = shared.screen.read().unwrap().oia().keyboard_locked();
        shared.event_gate.publish(locked);
        notify_kind(shared, ListenerKind::ScreenChanged);
        notify_kind(shared, ListenerKind::OiaChanged);
    }
    true
}

fn notify_kind(shared: &Arc<Shared>, kind: ListenerKind) {
    let snapshot: Vec<ListenerFn> = {
        let guard = shared.listeners.lock().unwrap();
        guard.iter().filter(|e| e.kind == kind).map(|e| e.callback.clone()).collect()
    };
    for cb in snapshot {
        cb();
    }
}
