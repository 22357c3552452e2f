//! Error types for the TN3270 core
//!
//! This module provides structured error types for the transport, telnet,
//! data-stream, and session layers, plus the local input-rule violations
//! surfaced by the editing API.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for TN3270 operations
#[derive(Debug)]
pub enum Tn3270Error {
    /// TCP/TLS transport errors
    Transport(TransportError),
    /// Telnet option negotiation errors
    Negotiation(NegotiationError),
    /// 3270 data-stream errors
    Protocol(ProtocolError),
    /// Local keyboard/editing rule violations
    Input(InputError),
    /// Outbound character translation errors
    Encode(EncodeError),
    /// A timed wait expired
    Timeout,
    /// Operation attempted on a closed session
    SessionClosed,
}

/// Transport (TCP/TLS) errors
#[derive(Debug)]
pub enum TransportError {
    /// Could not establish the TCP connection
    ConnectionFailed { host: String, port: u16, reason: String },
    /// TLS handshake or configuration failure
    Tls { reason: String },
    /// I/O failure on an established connection
    Io { reason: String },
    /// Peer closed the connection
    Closed,
}

/// Telnet negotiation errors
#[derive(Debug)]
pub enum NegotiationError {
    /// Host refused an option this implementation requires
    RequiredOptionRefused { option: u8 },
    /// Host rejected every device type we offered
    DeviceTypeRejected { reason: u8 },
    /// Subnegotiation data that cannot be parsed
    MalformedSubnegotiation { option: u8, data: Vec<u8> },
    /// Negotiation did not complete in time
    Timeout,
}

/// 3270 data-stream errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Record begins with a byte that is not a 3270 command
    UnknownCommand { code: u8 },
    /// Unrecognized byte in order space
    UnknownOrder { code: u8 },
    /// Record ended in the middle of a command or order
    Truncated { what: &'static str },
    /// Buffer address outside the presentation space, or reserved mode bits
    BadAddress { bytes: [u8; 2] },
    /// Structured field that cannot be honored
    BadStructuredField { id: u8, reason: String },
    /// Order applied where it is not valid (e.g. MF off a field attribute)
    InvalidOrderContext { order: u8 },
    /// Set Attribute with an unsupported attribute type
    BadAttributeType { attr_type: u8 },
    /// Set Reply Mode with an unsupported mode byte
    BadReplyMode { mode: u8 },
    /// TN3270E data type this terminal does not process
    UnsupportedDataType { data_type: u8 },
}

/// Local input-rule violations from the editing API
///
/// These are advisory: they set the input-inhibited indicator but never
/// terminate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Keystroke into a protected field or onto a field attribute
    ProtectedField { address: u16 },
    /// Non-numeric keystroke into a numeric-only field
    NumericOnly { ch: char },
    /// Insert-mode keystroke with no room left in the field
    FieldFull,
    /// AID or keystroke while the keyboard is locked
    KeyboardLocked,
}

/// Unmappable character during outbound translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeError {
    pub ch: char,
    pub codepage: &'static str,
}

impl fmt::Display for Tn3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tn3270Error::Transport(err) => write!(f, "transport error: {err}"),
            Tn3270Error::Negotiation(err) => write!(f, "negotiation error: {err}"),
            Tn3270Error::Protocol(err) => write!(f, "protocol error: {err}"),
            Tn3270Error::Input(err) => write!(f, "input error: {err}"),
            Tn3270Error::Encode(err) => write!(f, "encode error: {err}"),
            Tn3270Error::Timeout => write!(f, "wait timed out"),
            Tn3270Error::SessionClosed => write!(f, "session is closed"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { host, port, reason } => {
                write!(f, "connection to {host}:{port} failed: {reason}")
            }
            TransportError::Tls { reason } => write!(f, "TLS failure: {reason}"),
            TransportError::Io { reason } => write!(f, "I/O failure: {reason}"),
            TransportError::Closed => write!(f, "connection closed by peer"),
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::RequiredOptionRefused { option } => {
                write!(f, "host refused required telnet option {option}")
            }
            NegotiationError::DeviceTypeRejected { reason } => {
                write!(f, "host rejected device type (reason code 0x{reason:02X})")
            }
            NegotiationError::MalformedSubnegotiation { option, data } => {
                write!(f, "malformed subnegotiation for option {option}: {data:02X?}")
            }
            NegotiationError::Timeout => write!(f, "negotiation timed out"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand { code } => {
                write!(f, "unknown 3270 command: 0x{code:02X}")
            }
            ProtocolError::UnknownOrder { code } => {
                write!(f, "unknown 3270 order: 0x{code:02X}")
            }
            ProtocolError::Truncated { what } => {
                write!(f, "record truncated inside {what}")
            }
            ProtocolError::BadAddress { bytes } => {
                write!(f, "bad buffer address: {:02X} {:02X}", bytes[0], bytes[1])
            }
            ProtocolError::BadStructuredField { id, reason } => {
                write!(f, "bad structured field 0x{id:02X}: {reason}")
            }
            ProtocolError::InvalidOrderContext { order } => {
                write!(f, "order 0x{order:02X} not valid at current position")
            }
            ProtocolError::BadAttributeType { attr_type } => {
                write!(f, "bad character attribute type: 0x{attr_type:02X}")
            }
            ProtocolError::BadReplyMode { mode } => {
                write!(f, "bad reply mode: 0x{mode:02X}")
            }
            ProtocolError::UnsupportedDataType { data_type } => {
                write!(f, "TN3270E data type {data_type} not supported")
            }
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::ProtectedField { address } => {
                write!(f, "input rejected: protected field at address {address}")
            }
            InputError::NumericOnly { ch } => {
                write!(f, "input rejected: {ch:?} not valid in a numeric field")
            }
            InputError::FieldFull => write!(f, "input rejected: field is full"),
            InputError::KeyboardLocked => write!(f, "input rejected: keyboard locked"),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} has no mapping in {}", self.ch, self.codepage)
    }
}

impl StdError for Tn3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Tn3270Error::Transport(err) => Some(err),
            Tn3270Error::Negotiation(err) => Some(err),
            Tn3270Error::Protocol(err) => Some(err),
            Tn3270Error::Input(err) => Some(err),
            Tn3270Error::Encode(err) => Some(err),
            Tn3270Error::Timeout | Tn3270Error::SessionClosed => None,
        }
    }
}

impl StdError for TransportError {}
impl StdError for NegotiationError {}
impl StdError for ProtocolError {}
impl StdError for InputError {}
impl StdError for EncodeError {}

impl From<TransportError> for Tn3270Error {
    fn from(err: TransportError) -> Self {
        Tn3270Error::Transport(err)
    }
}

impl From<NegotiationError> for Tn3270Error {
    fn from(err: NegotiationError) -> Self {
        Tn3270Error::Negotiation(err)
    }
}

impl From<ProtocolError> for Tn3270Error {
    fn from(err: ProtocolError) -> Self {
        Tn3270Error::Protocol(err)
    }
}

impl From<InputError> for Tn3270Error {
    fn from(err: InputError) -> Self {
        Tn3270Error::Input(err)
    }
}

impl From<EncodeError> for Tn3270Error {
    fn from(err: EncodeError) -> Self {
        Tn3270Error::Encode(err)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io { reason: err.to_string() },
        }
    }
}

impl From<io::Error> for Tn3270Error {
    fn from(err: io::Error) -> Self {
        Tn3270Error::Transport(TransportError::from(err))
    }
}

/// Result type alias for TN3270 operations
pub type Tn3270Result<T> = Result<T, Tn3270Error>;

/// Specialized result types for individual components
pub type TransportResult<T> = Result<T, TransportError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type InputResult<T> = Result<T, InputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Tn3270Error::Protocol(ProtocolError::UnknownCommand { code: 0xAB });
        assert_eq!(err.to_string(), "protocol error: unknown 3270 command: 0xAB");
    }

    #[test]
    fn test_io_conversion_closed() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = TransportError::from(io_err);
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_input_error_is_local() {
        let err: Tn3270Error = InputError::FieldFull.into();
        assert!(matches!(err, Tn3270Error::Input(InputError::FieldFull)));
    }
}
