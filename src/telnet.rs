//! Telnet option negotiation and record framing
//!
//! Implements RFC 854/855 IAC processing with the TN3270E extensions
//! from RFC 2355: TRANSMIT-BINARY, TERMINAL-TYPE, END-OF-RECORD, and
//! the TN3270E device-type/functions subnegotiation. 3270 records are
//! delimited by IAC EOR; in TN3270E mode each record carries a 5-byte
//! header and the RESPONSES function is honored.
//!
//! The engine is transport-agnostic: `feed` consumes received bytes and
//! yields events, while everything to transmit accumulates until
//! `take_outbound` drains it.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::error::{NegotiationError, ProtocolError, Tn3270Error};

// telnet commands
pub const IAC: u8 = 0xFF;
pub const DONT: u8 = 0xFE;
pub const DO: u8 = 0xFD;
pub const WONT: u8 = 0xFC;
pub const WILL: u8 = 0xFB;
pub const SB: u8 = 0xFA;
pub const SE: u8 = 0xF0;
pub const EOR_MARK: u8 = 0xEF;

// telnet options
pub const OPT_BINARY: u8 = 0;
pub const OPT_TERMINAL_TYPE: u8 = 24;
pub const OPT_EOR: u8 = 25;
pub const OPT_TN3270E: u8 = 40;

// TERMINAL-TYPE subnegotiation verbs
const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

// TN3270E subnegotiation verbs
pub const TN3270E_CONNECT: u8 = 1;
pub const TN3270E_DEVICE_TYPE: u8 = 2;
pub const TN3270E_FUNCTIONS: u8 = 3;
pub const TN3270E_IS: u8 = 4;
pub const TN3270E_REASON: u8 = 5;
pub const TN3270E_REJECT: u8 = 6;
pub const TN3270E_REQUEST: u8 = 7;
pub const TN3270E_SEND: u8 = 8;

/// TN3270E functions
pub const FN_BIND_IMAGE: u8 = 0;
pub const FN_DATA_STREAM_CTL: u8 = 1;
pub const FN_RESPONSES: u8 = 2;
pub const FN_SCS_CTL_CODES: u8 = 3;
pub const FN_SYSREQ: u8 = 4;

/// TN3270E header data types
pub const DT_3270_DATA: u8 = 0;
pub const DT_RESPONSE: u8 = 2;

/// TN3270E response flags
const RESPONSE_ERROR: u8 = 1;
const RESPONSE_ALWAYS: u8 = 2;

/// Functions this terminal offers to the host
const SUPPORTED_FUNCTIONS: [u8; 2] = [FN_RESPONSES, FN_SYSREQ];

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the host to open negotiation
    Offering,
    /// TERMINAL-TYPE requested
    NegotiatingTtype,
    /// TN3270E device-type/functions exchange underway
    NegotiatingTn3270e,
    /// BINARY both ways and EOR agreed; records flow
    Active,
    Closing,
    Closed,
}

/// A host request for a definite response to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseRequest {
    pub seq: u16,
    /// True for ALWAYS-RESPONSE; false for ERROR-RESPONSE, which is
    /// answered only negatively
    pub always: bool,
}

/// Something the engine produced from inbound bytes
#[derive(Debug, PartialEq, Eq)]
pub enum TelnetEvent {
    /// A complete 3270 record (TN3270E header already stripped)
    Record {
        data: Vec<u8>,
        /// Present when the RESPONSES function is active and the host
        /// flagged this record for a response
        response: Option<ResponseRequest>,
    },
}

/// Escape IAC bytes for transmission
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Undo IAC doubling
pub fn unescape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().peekable();
    while let Some(&b) = iter.next() {
        out.push(b);
        if b == IAC && iter.peek() == Some(&&IAC) {
            iter.next();
        }
    }
    out
}

/// The telnet negotiation and framing engine
#[derive(Debug)]
pub struct TelnetEngine {
    terminal_type: String,
    use_tn3270e: bool,
    state: EngineState,
    local_will: HashSet<u8>,
    local_do: HashSet<u8>,
    remote_will: HashSet<u8>,
    /// Options the host asked for that we refused (non-fatal)
    refused: Vec<u8>,
    /// A mandatory option (BINARY/EOR) the host refused
    mandatory_refused: Option<u8>,
    binary_local: bool,
    binary_remote: bool,
    eor: bool,
    tn3270e: bool,
    functions: Vec<u8>,
    device_type: Option<String>,
    work: Vec<u8>,
    pending_record: Vec<u8>,
    sendbuf: Vec<u8>,
}

impl TelnetEngine {
    pub fn new(terminal_type: &str, use_tn3270e: bool) -> Self {
        Self {
            terminal_type: terminal_type.to_string(),
            use_tn3270e,
            state: EngineState::Offering,
            local_will: HashSet::new(),
            local_do: HashSet::new(),
            remote_will: HashSet::new(),
            refused: Vec::new(),
            mandatory_refused: None,
            binary_local: false,
            binary_remote: false,
            eor: false,
            tn3270e: false,
            functions: Vec::new(),
            device_type: None,
            work: Vec::new(),
            pending_record: Vec::new(),
            sendbuf: Vec::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// BINARY both ways and EOR: 3270 records may flow
    pub fn is_active(&self) -> bool {
        self.binary_local && self.binary_remote && self.eor
    }

    /// TN3270E headers are in effect
    pub fn tn3270e(&self) -> bool {
        self.tn3270e
    }

    /// The RESPONSES function was negotiated
    pub fn responses_active(&self) -> bool {
        self.functions.contains(&FN_RESPONSES)
    }

    pub fn negotiated_functions(&self) -> &[u8] {
        &self.functions
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    /// Options the host requested and we declined
    pub fn refused_options(&self) -> &[u8] {
        &self.refused
    }

    /// The mandatory option the host refused, if any; 3270 records
    /// cannot flow without BINARY and EOR
    pub fn mandatory_refused(&self) -> Option<u8> {
        self.mandatory_refused
    }

    pub fn set_closing(&mut self) {
        if self.state != EngineState::Closed {
            self.state = EngineState::Closing;
        }
    }

    pub fn set_closed(&mut self) {
        self.state = EngineState::Closed;
    }

    /// Drain bytes queued for transmission
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sendbuf)
    }

    pub fn has_outbound(&self) -> bool {
        !self.sendbuf.is_empty()
    }

    /// Queue a 3270 record: TN3270E header when negotiated, IAC
    /// escaping, trailing IAC EOR
    pub fn send_record(&mut self, data: &[u8]) {
        if self.tn3270e {
            // outbound 3270-DATA carries an all-zero header
            self.sendbuf.extend_from_slice(&[0, 0, 0, 0, 0]);
        }
        self.sendbuf.extend_from_slice(&escape_iac(data));
        self.sendbuf.extend_from_slice(&[IAC, EOR_MARK]);
    }

    /// Queue a TN3270E RESPONSE record for sequence `seq`
    pub fn send_response(&mut self, seq: u16, positive: bool) {
        let flag = if positive { 0x00 } else { 0x01 };
        let mut rec = vec![DT_RESPONSE, 0x00, flag];
        rec.extend_from_slice(&seq.to_be_bytes());
        rec.push(0x00);
        debug!("o>> TN3270E {} response, seq {seq}", if positive { "positive" } else { "negative" });
        self.sendbuf.extend_from_slice(&escape_iac(&rec));
        self.sendbuf.extend_from_slice(&[IAC, EOR_MARK]);
    }

    fn send_will(&mut self, opt: u8) {
        if self.local_will.insert(opt) {
            debug!("o>> IAC WILL {opt}");
            self.sendbuf.extend_from_slice(&[IAC, WILL, opt]);
        }
    }

    fn send_wont(&mut self, opt: u8) {
        self.local_will.remove(&opt);
        debug!("o>> IAC WONT {opt}");
        self.sendbuf.extend_from_slice(&[IAC, WONT, opt]);
    }

    fn send_do(&mut self, opt: u8) {
        if self.local_do.insert(opt) {
            debug!("o>> IAC DO {opt}");
            self.sendbuf.extend_from_slice(&[IAC, DO, opt]);
        }
    }

    fn send_dont(&mut self, opt: u8) {
        self.local_do.remove(&opt);
        debug!("o>> IAC DONT {opt}");
        self.sendbuf.extend_from_slice(&[IAC, DONT, opt]);
    }

    fn send_subnegotiation(&mut self, data: &[u8]) {
        self.sendbuf.extend_from_slice(&[IAC, SB]);
        self.sendbuf.extend_from_slice(&escape_iac(data));
        self.sendbuf.extend_from_slice(&[IAC, SE]);
    }

    /// Consume received bytes, returning any completed records
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<TelnetEvent>, Tn3270Error> {
        self.work.extend_from_slice(data);
        let mut events = Vec::new();
        let mut i = 0;

        while i < self.work.len() {
            let b = self.work[i];
            if b != IAC {
                self.pending_record.push(b);
                i += 1;
                continue;
            }
            let Some(&cmd) = self.work.get(i + 1) else {
                break; // need more bytes
            };
            match cmd {
                IAC => {
                    self.pending_record.push(IAC);
                    i += 2;
                }
                WILL | WONT | DO | DONT => {
                    let Some(&opt) = self.work.get(i + 2) else {
                        break;
                    };
                    self.handle_option(cmd, opt);
                    i += 3;
                }
                SB => {
                    let Some((sub, consumed)) = take_subnegotiation(&self.work[i + 2..]) else {
                        break;
                    };
                    self.handle_subnegotiation(&sub)?;
                    i += 2 + consumed;
                }
                EOR_MARK => {
                    let record = std::mem::take(&mut self.pending_record);
                    if let Some(event) = self.finish_record(record)? {
                        events.push(event);
                    }
                    i += 2;
                }
                _ => {
                    // point commands (NOP, GA, ...) carry no operand
                    debug!("i<< IAC {cmd}");
                    i += 2;
                }
            }
        }
        self.work.drain(..i);
        Ok(events)
    }

    fn finish_record(&mut self, record: Vec<u8>) -> Result<Option<TelnetEvent>, Tn3270Error> {
        if record.is_empty() {
            return Ok(None);
        }
        if !self.tn3270e {
            return Ok(Some(TelnetEvent::Record { data: record, response: None }));
        }
        if record.len() < 5 {
            return Err(ProtocolError::Truncated { what: "TN3270E header" }.into());
        }
        let data_type = record[0];
        let response_flag = record[2];
        let seq = u16::from_be_bytes([record[3], record[4]]);
        match data_type {
            DT_3270_DATA => {
                let response = (self.responses_active()
                    && matches!(response_flag, RESPONSE_ERROR | RESPONSE_ALWAYS))
                .then_some(ResponseRequest {
                    seq,
                    always: response_flag == RESPONSE_ALWAYS,
                });
                Ok(Some(TelnetEvent::Record { data: record[5..].to_vec(), response }))
            }
            DT_RESPONSE => {
                // acknowledgement of one of our records
                debug!("i<< TN3270E response, seq {seq}");
                Ok(None)
            }
            other => Err(ProtocolError::UnsupportedDataType { data_type: other }.into()),
        }
    }

    fn handle_option(&mut self, cmd: u8, opt: u8) {
        match cmd {
            DO => {
                debug!("i<< IAC DO {opt}");
                match opt {
                    OPT_TN3270E => {
                        if self.use_tn3270e {
                            self.send_will(opt);
                            self.state = EngineState::NegotiatingTn3270e;
                        } else {
                            self.send_wont(opt);
                        }
                    }
                    OPT_BINARY => {
                        self.send_will(opt);
                        self.binary_local = true;
                    }
                    OPT_TERMINAL_TYPE => {
                        self.send_will(opt);
                        if self.state == EngineState::Offering {
                            self.state = EngineState::NegotiatingTtype;
                        }
                    }
                    OPT_EOR => {
                        self.send_will(opt);
                        self.send_do(opt);
                        self.eor = true;
                    }
                    _ => {
                        info!("refusing telnet option {opt}");
                        self.refused.push(opt);
                        self.send_wont(opt);
                    }
                }
            }
            DONT => {
                debug!("i<< IAC DONT {opt}");
                if opt == OPT_TN3270E {
                    self.tn3270e = false;
                }
                if opt == OPT_BINARY || opt == OPT_EOR {
                    self.mandatory_refused = Some(opt);
                } else {
                    self.send_wont(opt);
                }
            }
            WILL => {
                debug!("i<< IAC WILL {opt}");
                self.remote_will.insert(opt);
                match opt {
                    OPT_BINARY => {
                        self.send_do(opt);
                        self.binary_remote = true;
                    }
                    OPT_EOR => {
                        self.send_do(opt);
                        self.eor = true;
                    }
                    OPT_TN3270E => {}
                    _ => {
                        self.refused.push(opt);
                        self.send_dont(opt);
                    }
                }
            }
            WONT => {
                debug!("i<< IAC WONT {opt}");
                self.remote_will.remove(&opt);
                if opt == OPT_BINARY || opt == OPT_EOR {
                    self.mandatory_refused = Some(opt);
                }
            }
            _ => {}
        }
        if self.is_active() && matches!(self.state, EngineState::Offering | EngineState::NegotiatingTtype) {
            self.state = EngineState::Active;
        }
    }

    fn handle_subnegotiation(&mut self, sub: &[u8]) -> Result<(), Tn3270Error> {
        match sub.first() {
            Some(&OPT_TERMINAL_TYPE) => {
                if sub.get(1) != Some(&TTYPE_SEND) {
                    return Err(NegotiationError::MalformedSubnegotiation {
                        option: OPT_TERMINAL_TYPE,
                        data: sub.to_vec(),
                    }
                    .into());
                }
                info!("o>> TERMINAL-TYPE IS {}", self.terminal_type);
                let mut reply = vec![OPT_TERMINAL_TYPE, TTYPE_IS];
                reply.extend_from_slice(self.terminal_type.as_bytes());
                self.send_subnegotiation(&reply);
                Ok(())
            }
            Some(&OPT_TN3270E) => self.handle_tn3270e_subnegotiation(sub),
            Some(&opt) => {
                warn!("ignoring subnegotiation for option {opt}");
                Ok(())
            }
            None => Err(NegotiationError::MalformedSubnegotiation {
                option: 0,
                data: Vec::new(),
            }
            .into()),
        }
    }

    fn handle_tn3270e_subnegotiation(&mut self, sub: &[u8]) -> Result<(), Tn3270Error> {
        let malformed = || NegotiationError::MalformedSubnegotiation {
            option: OPT_TN3270E,
            data: sub.to_vec(),
        };
        match (sub.get(1), sub.get(2)) {
            (Some(&TN3270E_SEND), Some(&TN3270E_DEVICE_TYPE)) => {
                info!("o>> TN3270E DEVICE-TYPE REQUEST {}", self.terminal_type);
                let mut reply = vec![OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
                reply.extend_from_slice(self.terminal_type.as_bytes());
                self.send_subnegotiation(&reply);
                self.state = EngineState::NegotiatingTn3270e;
                Ok(())
            }
            (Some(&TN3270E_DEVICE_TYPE), Some(&TN3270E_IS)) => {
                let rest = &sub[3..];
                let (device, lu) = match rest.iter().position(|&b| b == TN3270E_CONNECT) {
                    Some(i) => (&rest[..i], Some(&rest[i + 1..])),
                    None => (rest, None),
                };
                let device = String::from_utf8(device.to_vec()).map_err(|_| malformed())?;
                info!(
                    "i<< TN3270E DEVICE-TYPE IS {device}{}",
                    lu.map(|l| format!(" CONNECT {}", String::from_utf8_lossy(l)))
                        .unwrap_or_default()
                );
                self.device_type = Some(device);

                info!("o>> TN3270E FUNCTIONS REQUEST {SUPPORTED_FUNCTIONS:?}");
                let mut reply = vec![OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST];
                reply.extend_from_slice(&SUPPORTED_FUNCTIONS);
                self.send_subnegotiation(&reply);

                self.binary_local = true;
                self.binary_remote = true;
                self.eor = true;
                self.tn3270e = true;
                self.state = EngineState::Active;
                Ok(())
            }
            (Some(&TN3270E_DEVICE_TYPE), Some(&TN3270E_REJECT)) => {
                let reason = if sub.get(3) == Some(&TN3270E_REASON) {
                    sub.get(4).copied().unwrap_or(0)
                } else {
                    0
                };
                warn!("TN3270E device type rejected (reason 0x{reason:02X}); falling back to TN3270");
                self.tn3270e = false;
                self.use_tn3270e = false;
                self.functions.clear();
                self.send_wont(OPT_TN3270E);
                self.state = EngineState::NegotiatingTtype;
                Ok(())
            }
            (Some(&TN3270E_FUNCTIONS), Some(&TN3270E_IS)) => {
                self.functions = sub[3..].to_vec();
                info!("i<< TN3270E FUNCTIONS IS {:?}", self.functions);
                Ok(())
            }
            (Some(&TN3270E_FUNCTIONS), Some(&TN3270E_REQUEST)) => {
                let requested = &sub[3..];
                let agreed: Vec<u8> = requested
                    .iter()
                    .copied()
                    .filter(|f| SUPPORTED_FUNCTIONS.contains(f))
                    .collect();
                if agreed.len() == requested.len() {
                    // full agreement: confirm with IS
                    let mut reply = vec![OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS];
                    reply.extend_from_slice(&agreed);
                    self.send_subnegotiation(&reply);
                    self.functions = agreed;
                } else {
                    // counter-offer the intersection
                    let mut reply = vec![OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST];
                    reply.extend_from_slice(&agreed);
                    self.send_subnegotiation(&reply);
                }
                Ok(())
            }
            _ => Err(malformed().into()),
        }
    }
}

/// Extract one subnegotiation body (unescaped) and the number of bytes
/// consumed up to and including IAC SE. `None` when incomplete.
fn take_subnegotiation(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    let mut body = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b != IAC {
            body.push(b);
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(&IAC) => {
                body.push(IAC);
                i += 2;
            }
            Some(&SE) => return Some((body, i + 2)),
            Some(_) => {
                // tolerate a stray command inside the subnegotiation
                i += 2;
            }
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TelnetEngine {
        TelnetEngine::new("IBM-3279-4-E", true)
    }

    #[test]
    fn test_escape_round_trip() {
        let data = vec![0x00, 0xFF, 0x41, 0xFF, 0xFF, 0x7D];
        assert_eq!(unescape_iac(&escape_iac(&data)), data);
        let plain = b"no iac bytes here".to_vec();
        assert_eq!(escape_iac(&plain), plain);
    }

    #[test]
    fn test_plain_tn3270_negotiation() {
        let mut eng = TelnetEngine::new("IBM-3278-2", false);
        // host: DO TTYPE
        eng.feed(&[IAC, DO, OPT_TERMINAL_TYPE]).unwrap();
        assert_eq!(eng.take_outbound(), vec![IAC, WILL, OPT_TERMINAL_TYPE]);
        assert_eq!(eng.state(), EngineState::NegotiatingTtype);

        // host: SB TTYPE SEND
        eng.feed(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_SEND, IAC, SE]).unwrap();
        let out = eng.take_outbound();
        let mut expected = vec![IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS];
        expected.extend_from_slice(b"IBM-3278-2");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(out, expected);

        // host: DO TN3270E is refused when disabled
        eng.feed(&[IAC, DO, OPT_TN3270E]).unwrap();
        assert_eq!(eng.take_outbound(), vec![IAC, WONT, OPT_TN3270E]);

        // BINARY and EOR both ways
        eng.feed(&[IAC, DO, OPT_BINARY, IAC, WILL, OPT_BINARY]).unwrap();
        eng.feed(&[IAC, DO, OPT_EOR, IAC, WILL, OPT_EOR]).unwrap();
        assert!(eng.is_active());
        assert!(!eng.tn3270e());
        assert_eq!(eng.state(), EngineState::Active);
    }

    #[test]
    fn test_tn3270e_negotiation() {
        let mut eng = engine();
        eng.feed(&[IAC, DO, OPT_TN3270E]).unwrap();
        assert_eq!(eng.take_outbound(), vec![IAC, WILL, OPT_TN3270E]);

        // host: SEND DEVICE-TYPE
        eng.feed(&[IAC, SB, OPT_TN3270E, TN3270E_SEND, TN3270E_DEVICE_TYPE, IAC, SE])
            .unwrap();
        let out = eng.take_outbound();
        let mut expected = vec![IAC, SB, OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
        expected.extend_from_slice(b"IBM-3279-4-E");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(out, expected);

        // host: DEVICE-TYPE IS ... CONNECT lu1
        let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_IS];
        msg.extend_from_slice(b"IBM-3279-4-E");
        msg.push(TN3270E_CONNECT);
        msg.extend_from_slice(b"LU1");
        msg.extend_from_slice(&[IAC, SE]);
        eng.feed(&msg).unwrap();
        assert!(eng.tn3270e());
        assert!(eng.is_active());
        assert_eq!(eng.device_type(), Some("IBM-3279-4-E"));
        // we requested our function set
        let out = eng.take_outbound();
        assert!(out.windows(3).any(|w| w == [TN3270E_FUNCTIONS, TN3270E_REQUEST, FN_RESPONSES]));

        // host: FUNCTIONS IS
        eng.feed(&[IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS, FN_RESPONSES, IAC, SE])
            .unwrap();
        assert!(eng.responses_active());
    }

    #[test]
    fn test_tn3270e_reject_falls_back() {
        let mut eng = engine();
        eng.feed(&[IAC, DO, OPT_TN3270E]).unwrap();
        eng.take_outbound();
        eng.feed(&[
            IAC, SB, OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REJECT, TN3270E_REASON, 0x01,
            IAC, SE,
        ])
        .unwrap();
        assert!(!eng.tn3270e());
        assert_eq!(eng.take_outbound(), vec![IAC, WONT, OPT_TN3270E]);

        // plain BINARY+EOR still reaches ACTIVE
        eng.feed(&[IAC, DO, OPT_BINARY, IAC, WILL, OPT_BINARY]).unwrap();
        eng.feed(&[IAC, DO, OPT_EOR, IAC, WILL, OPT_EOR]).unwrap();
        assert!(eng.is_active());
    }

    #[test]
    fn test_functions_request_intersection() {
        let mut eng = engine();
        // host requests a superset of what we support
        eng.feed(&[
            IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, FN_BIND_IMAGE,
            FN_RESPONSES, IAC, SE,
        ])
        .unwrap();
        let out = eng.take_outbound();
        // counter-offer only RESPONSES
        let mut expected = vec![IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, FN_RESPONSES];
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(out, expected);

        // host requests exactly what we support: confirmed with IS
        eng.feed(&[
            IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, FN_RESPONSES, IAC, SE,
        ])
        .unwrap();
        let out = eng.take_outbound();
        assert!(out.windows(3).any(|w| w == [TN3270E_FUNCTIONS, TN3270E_IS, FN_RESPONSES]));
        assert!(eng.responses_active());
    }

    #[test]
    fn test_record_framing_plain() {
        let mut eng = TelnetEngine::new("IBM-3278-2", false);
        let events = eng.feed(&[0x01, 0x02, IAC, IAC, 0x03, IAC, EOR_MARK]).unwrap();
        assert_eq!(
            events,
            vec![TelnetEvent::Record { data: vec![0x01, 0x02, 0xFF, 0x03], response: None }]
        );
    }

    #[test]
    fn test_record_framing_split_across_feeds() {
        let mut eng = TelnetEngine::new("IBM-3278-2", false);
        assert!(eng.feed(&[0x01, 0x02, IAC]).unwrap().is_empty());
        let events = eng.feed(&[EOR_MARK, 0x03, IAC, EOR_MARK]).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            TelnetEvent::Record { data: vec![0x01, 0x02], response: None }
        );
        assert_eq!(events[1], TelnetEvent::Record { data: vec![0x03], response: None });
    }

    fn activate_tn3270e(eng: &mut TelnetEngine) {
        eng.feed(&[IAC, DO, OPT_TN3270E]).unwrap();
        let mut msg = vec![IAC, SB, OPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_IS];
        msg.extend_from_slice(b"IBM-3279-4-E");
        msg.extend_from_slice(&[IAC, SE]);
        eng.feed(&msg).unwrap();
        eng.feed(&[IAC, SB, OPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS, FN_RESPONSES, IAC, SE])
            .unwrap();
        eng.take_outbound();
    }

    #[test]
    fn test_tn3270e_header_stripped_and_response_requested() {
        let mut eng = engine();
        activate_tn3270e(&mut eng);

        // header: 3270-DATA, response-flag ALWAYS, seq 7
        let events = eng
            .feed(&[DT_3270_DATA, 0x00, 0x02, 0x00, 0x07, 0xF1, 0xC3, IAC, EOR_MARK])
            .unwrap();
        assert_eq!(
            events,
            vec![TelnetEvent::Record {
                data: vec![0xF1, 0xC3],
                response: Some(ResponseRequest { seq: 7, always: true })
            }]
        );
    }

    #[test]
    fn test_tn3270e_response_record_consumed() {
        let mut eng = engine();
        activate_tn3270e(&mut eng);
        let events = eng
            .feed(&[DT_RESPONSE, 0x00, 0x00, 0x00, 0x01, 0x00, IAC, EOR_MARK])
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_send_record_adds_header_and_eor() {
        let mut eng = engine();
        activate_tn3270e(&mut eng);
        eng.send_record(&[0x7D, 0xFF, 0x40]);
        let out = eng.take_outbound();
        assert_eq!(out[..5], [0, 0, 0, 0, 0]);
        assert_eq!(&out[5..], &[0x7D, 0xFF, 0xFF, 0x40, IAC, EOR_MARK]);
    }

    #[test]
    fn test_send_record_plain_mode() {
        let mut eng = TelnetEngine::new("IBM-3278-2", false);
        eng.send_record(&[0x7D]);
        assert_eq!(eng.take_outbound(), vec![0x7D, IAC, EOR_MARK]);
    }

    #[test]
    fn test_send_negative_response() {
        let mut eng = engine();
        activate_tn3270e(&mut eng);
        eng.send_response(9, false);
        let out = eng.take_outbound();
        assert_eq!(out[0], DT_RESPONSE);
        assert_eq!(out[2], 0x01); // negative
        assert_eq!(u16::from_be_bytes([out[3], out[4]]), 9);
        assert_eq!(&out[out.len() - 2..], &[IAC, EOR_MARK]);
    }

    #[test]
    fn test_unknown_option_refused_and_recorded() {
        let mut eng = engine();
        eng.feed(&[IAC, DO, 6]).unwrap(); // timing mark
        assert_eq!(eng.take_outbound(), vec![IAC, WONT, 6]);
        assert_eq!(eng.refused_options(), &[6]);
    }

    #[test]
    fn test_malformed_subnegotiation_is_error() {
        let mut eng = engine();
        let err = eng
            .feed(&[IAC, SB, OPT_TN3270E, 0x63, IAC, SE])
            .unwrap_err();
        assert!(matches!(
            err,
            Tn3270Error::Negotiation(NegotiationError::MalformedSubnegotiation { option: 40, .. })
        ));
    }
}
