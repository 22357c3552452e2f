//! Session lifecycle and controller
//!
//! Owns the connection, the telnet engine, the data-stream processor,
//! and the presentation space. One I/O thread per session multiplexes
//! transport reads with the outbound queue; external callers interact
//! through a mutex-protected core, so every PS mutation happens under
//! the session's lock and records are applied atomically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::codec::{self, CodePage};
use crate::config::SessionConfig;
use crate::error::{InputError, Tn3270Error, Tn3270Result};
use crate::lib3270::codes::AidKey;
use crate::lib3270::display::{Display3270, ScreenSize};
use crate::lib3270::protocol::DataStreamProcessor;
use crate::network::HostConnection;
use crate::telnet::{ResponseRequest, TelnetEngine, TelnetEvent};
use crate::transfer::FileTransferState;

/// How long connect waits for the option negotiation to settle
const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Operator-area banner some hosts write when structured-field
/// negotiation is unavailable
const TRANSFER_BANNER: &str = "File transfer in progress";

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Negotiating,
    Bound,
    Idle,
    PendingInput,
    Closing,
    Closed,
}

/// Events delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    HostWrite,
    KeyboardUnlock,
    SessionClose,
}

/// A decoded view of the screen
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub text: String,
    pub cursor: (usize, usize),
    pub keyboard_locked: bool,
}

struct SessionCore {
    display: Display3270,
    processor: DataStreamProcessor,
    telnet: TelnetEngine,
    state: SessionState,
    codepage: CodePage,
    /// Substitution byte for unmappable outbound characters, when set
    substitute: Option<u8>,
    listeners: Vec<mpsc::Sender<SessionEvent>>,
}

impl SessionCore {
    fn emit(&mut self, event: SessionEvent) {
        self.listeners.retain(|tx| tx.send(event).is_ok());
    }

    fn check_open(&self) -> Tn3270Result<()> {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            Err(Tn3270Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn mark_closed(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            self.telnet.set_closed();
            self.emit(SessionEvent::SessionClose);
        }
    }

    /// Apply one complete 3270 record
    fn handle_record(
        &mut self,
        data: Vec<u8>,
        response: Option<ResponseRequest>,
    ) -> Tn3270Result<()> {
        let was_locked = self.display.is_keyboard_locked();
        match self.processor.process_record(&data, &mut self.display) {
            Ok(replies) => {
                if let Some(req) = response {
                    if req.always {
                        self.telnet.send_response(req.seq, true);
                    }
                }
                for reply in replies {
                    self.telnet.send_record(&reply);
                }
                if self.state == SessionState::PendingInput || self.state == SessionState::Bound {
                    self.state = SessionState::Idle;
                }
                self.emit(SessionEvent::HostWrite);
                if was_locked && !self.display.is_keyboard_locked() {
                    self.emit(SessionEvent::KeyboardUnlock);
                }
                Ok(())
            }
            Err(e) => {
                // protocol failures are terminal: lock the keyboard,
                // answer negatively when the host asked, then close
                warn!("data stream error: {e}");
                self.display.lock_keyboard();
                if let Some(req) = response {
                    self.telnet.send_response(req.seq, false);
                }
                Err(e.into())
            }
        }
    }
}

/// Handle to a live session
pub struct SessionController {
    core: Arc<(Mutex<SessionCore>, Condvar)>,
    running: Arc<AtomicBool>,
    io_thread: Option<thread::JoinHandle<()>>,
}

impl SessionController {
    /// Connect, negotiate, and return a BOUND session
    pub fn connect(config: &SessionConfig) -> Tn3270Result<Self> {
        config.validate().map_err(|reason| {
            Tn3270Error::Transport(crate::error::TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.effective_port(),
                reason,
            })
        })?;

        let port = config.effective_port();
        info!("connecting to {}:{port}", config.host);
        let connection = HostConnection::connect(&config.host, port, &config.transport())?;

        let alternate = ScreenSize::for_dimensions(config.alt_rows, config.alt_cols);
        let core = SessionCore {
            display: Display3270::with_sizes(ScreenSize::Model2, alternate, config.codepage),
            processor: DataStreamProcessor::new(),
            telnet: TelnetEngine::new(&config.terminal_type, config.use_tn3270e),
            state: SessionState::Negotiating,
            codepage: config.codepage,
            substitute: None,
            listeners: Vec::new(),
        };
        let core = Arc::new((Mutex::new(core), Condvar::new()));
        let running = Arc::new(AtomicBool::new(true));

        let io_core = Arc::clone(&core);
        let io_running = Arc::clone(&running);
        let io_thread = thread::Builder::new()
            .name("tn3270-session".to_string())
            .spawn(move || io_loop(connection, io_core, io_running))
            .expect("spawn session thread");

        let controller = Self { core, running, io_thread: Some(io_thread) };
        controller.await_negotiation()?;
        Ok(controller)
    }

    fn await_negotiation(&self) -> Tn3270Result<()> {
        let (lock, cvar) = &*self.core;
        let deadline = Instant::now() + NEGOTIATION_TIMEOUT;
        let mut core = lock.lock().unwrap();
        loop {
            if core.state == SessionState::Closed {
                return Err(Tn3270Error::SessionClosed);
            }
            if let Some(option) = core.telnet.mandatory_refused() {
                core.mark_closed();
                return Err(
                    crate::error::NegotiationError::RequiredOptionRefused { option }.into()
                );
            }
            if core.telnet.is_active() {
                core.state = SessionState::Bound;
                info!(
                    "session bound (tn3270e={}, functions={:?})",
                    core.telnet.tn3270e(),
                    core.telnet.negotiated_functions()
                );
                return Ok(());
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                core.mark_closed();
                return Err(crate::error::NegotiationError::Timeout.into());
            };
            let (guard, _) = cvar.wait_timeout(core, remaining).unwrap();
            core = guard;
        }
    }

    pub fn state(&self) -> SessionState {
        self.core.0.lock().unwrap().state
    }

    /// Subscribe to host-write, keyboard-unlock, and close events
    pub fn events(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.core.0.lock().unwrap().listeners.push(tx);
        rx
    }

    /// Block until the predicate holds over the presentation space,
    /// the session closes, or the timeout expires
    pub fn wait<F>(&self, timeout: Duration, predicate: F) -> Tn3270Result<()>
    where
        F: Fn(&mut Display3270) -> bool,
    {
        let (lock, cvar) = &*self.core;
        let deadline = Instant::now() + timeout;
        let mut core = lock.lock().unwrap();
        loop {
            if core.state == SessionState::Closed {
                return Err(Tn3270Error::SessionClosed);
            }
            if predicate(&mut core.display) {
                return Ok(());
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(Tn3270Error::Timeout);
            };
            let (guard, _) = cvar.wait_timeout(core, remaining).unwrap();
            core = guard;
        }
    }

    /// Convenience: wait until the keyboard unlocks
    pub fn wait_for_unlock(&self, timeout: Duration) -> Tn3270Result<()> {
        self.wait(timeout, |display| !display.is_keyboard_locked())
    }

    /// Type text at the cursor; local edit only, nothing transmits
    pub fn send_keys(&self, text: &str) -> Tn3270Result<usize> {
        let (lock, cvar) = &*self.core;
        let mut core = lock.lock().unwrap();
        core.check_open()?;
        let bytes = match core.substitute {
            Some(sub) => codec::encode_lossy(text, core.codepage, sub),
            None => codec::encode(text, core.codepage)?,
        };
        let written = core.display.key_data(&bytes).map_err(Tn3270Error::Input)?;
        cvar.notify_all();
        Ok(written)
    }

    /// Use a substitution byte instead of failing on unmappable
    /// outbound characters
    pub fn set_encode_substitute(&self, substitute: Option<u8>) {
        self.core.0.lock().unwrap().substitute = substitute;
    }

    /// Transmit the read response for an AID and lock the keyboard
    pub fn send_aid(&self, aid: AidKey) -> Tn3270Result<()> {
        let (lock, cvar) = &*self.core;
        let mut core = lock.lock().unwrap();
        core.check_open()?;
        if core.display.is_keyboard_locked() {
            return Err(InputError::KeyboardLocked.into());
        }
        if aid == AidKey::Clear {
            core.display.clear();
        }
        core.display.set_aid(aid);
        let record = {
            let SessionCore { ref mut display, ref processor, .. } = *core;
            processor.read_modified(display, aid, false)
        };
        core.display.lock_keyboard();
        core.state = SessionState::PendingInput;
        core.telnet.send_record(&record);
        debug!("AID 0x{:02X} queued", aid.to_u8());
        cvar.notify_all();
        Ok(())
    }

    /// Decoded screen contents
    pub fn screen_text(&self) -> String {
        self.core.0.lock().unwrap().display.screen_text()
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        let core = self.core.0.lock().unwrap();
        ScreenSnapshot {
            rows: core.display.rows(),
            cols: core.display.cols(),
            text: core.display.screen_text(),
            cursor: core.display.cursor_position(),
            keyboard_locked: core.display.is_keyboard_locked(),
        }
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.core.0.lock().unwrap().display.cursor_position()
    }

    pub fn set_cursor(&self, row: usize, col: usize) -> Tn3270Result<()> {
        let mut core = self.core.0.lock().unwrap();
        core.check_open()?;
        let cols = core.display.cols();
        core.display.set_cursor((row * cols + col) as u16);
        Ok(())
    }

    pub fn set_insert_mode(&self, insert: bool) {
        self.core.0.lock().unwrap().display.set_insert_mode(insert);
    }

    pub fn erase_eof(&self) -> Tn3270Result<()> {
        let mut core = self.core.0.lock().unwrap();
        core.check_open()?;
        core.display.erase_eof().map_err(Tn3270Error::Input)
    }

    pub fn erase_input(&self) -> Tn3270Result<()> {
        let mut core = self.core.0.lock().unwrap();
        core.check_open()?;
        core.display.erase_input();
        Ok(())
    }

    /// Current file-transfer state
    ///
    /// DDM structured fields are authoritative; the operator-area
    /// banner is the fallback for hosts that never negotiated them.
    pub fn file_transfer_state(&self) -> FileTransferState {
        let mut core = self.core.0.lock().unwrap();
        let state = core.processor.transfer.state();
        if state == FileTransferState::Idle {
            let last_row = core.display.rows().saturating_sub(1);
            if let Some(status) = core.display.row_text(last_row) {
                if status.contains(TRANSFER_BANNER) {
                    return FileTransferState::InProgress;
                }
            }
        }
        state
    }

    /// Stage bytes for an IND$FILE PUT
    pub fn upload(&self, data: Vec<u8>) -> Tn3270Result<()> {
        let (lock, cvar) = &*self.core;
        let mut core = lock.lock().unwrap();
        core.check_open()?;
        if let Some(reply) = core.processor.transfer.begin_upload(data) {
            core.telnet.send_record(&reply);
            cvar.notify_all();
        }
        Ok(())
    }

    /// Pop the next completed IND$FILE GET download
    pub fn receive(&self) -> Option<Vec<u8>> {
        self.core.0.lock().unwrap().processor.transfer.take_download()
    }

    /// Stage a local file for an IND$FILE PUT
    pub fn upload_file(&self, path: &std::path::Path) -> Tn3270Result<()> {
        let data = std::fs::read(path)?;
        self.upload(data)
    }

    /// Write the next pending download to a local file; false when
    /// nothing is pending
    pub fn receive_file(&self, path: &std::path::Path) -> Tn3270Result<bool> {
        match self.receive() {
            Some(data) => {
                std::fs::write(path, data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the session; idempotent
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        {
            let (lock, cvar) = &*self.core;
            let mut core = lock.lock().unwrap();
            if core.state != SessionState::Closed {
                core.state = SessionState::Closing;
                core.telnet.set_closing();
            }
            cvar.notify_all();
        }
        if let Some(handle) = self.io_thread.take() {
            handle.join().ok();
        }
        let (lock, cvar) = &*self.core;
        lock.lock().unwrap().mark_closed();
        cvar.notify_all();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}

/// The per-session I/O loop: multiplexes transport reads with the
/// outbound queue; the transport read timeout provides the poll cadence
fn io_loop(
    mut connection: HostConnection,
    core: Arc<(Mutex<SessionCore>, Condvar)>,
    running: Arc<AtomicBool>,
) {
    let (lock, cvar) = &*core;
    let mut buf = [0u8; 8192];

    while running.load(Ordering::SeqCst) {
        let received = match connection.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                debug!("transport closed: {e}");
                let mut core = lock.lock().unwrap();
                core.mark_closed();
                cvar.notify_all();
                return;
            }
        };

        let mut core = lock.lock().unwrap();
        if received > 0 {
            match core.telnet.feed(&buf[..received]) {
                Ok(events) => {
                    for event in events {
                        let TelnetEvent::Record { data, response } = event;
                        if let Err(e) = core.handle_record(data, response) {
                            warn!("closing session: {e}");
                            flush_outbound(&mut connection, &mut core);
                            connection.close();
                            core.mark_closed();
                            cvar.notify_all();
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("telnet failure, closing session: {e}");
                    flush_outbound(&mut connection, &mut core);
                    connection.close();
                    core.mark_closed();
                    cvar.notify_all();
                    return;
                }
            }
        }
        if !flush_outbound(&mut connection, &mut core) {
            core.mark_closed();
            cvar.notify_all();
            return;
        }
        cvar.notify_all();
        drop(core);
    }

    connection.close();
    let mut core = lock.lock().unwrap();
    core.mark_closed();
    cvar.notify_all();
}

/// Transmit anything the engine queued; false when the transport died
fn flush_outbound(connection: &mut HostConnection, core: &mut SessionCore) -> bool {
    if !core.telnet.has_outbound() {
        return true;
    }
    let data = core.telnet.take_outbound();
    match connection.write_all(&data) {
        Ok(()) => true,
        Err(e) => {
            debug!("write failed: {e}");
            connection.close();
            false
        }
    }
}
