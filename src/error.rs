//! Error taxonomy for the TN5250 client library.
//!
//! One top-level enum wraps a nested error per subsystem, following the
//! error kinds named for this library: configuration, connection,
//! protocol, operator (keyboard inhibit), field, codec, timeout,
//! workflow assertion, and cancellation.

use std::fmt;
use std::io;
use std::error::Error as StdError;

/// Top-level error type for all library operations.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Connection(ConnectionError),
    Protocol(ProtocolError),
    Operator(OperatorError),
    Field(FieldError),
    Codec(CodecError),
    Timeout(TimeoutError),
    Assertion(AssertionError),
    Cancelled,
}

/// Fatal at startup; never recovered.
#[derive(Debug)]
pub enum ConfigError {
    UnknownCcsid { ccsid: String },
    UnknownDeviceType { device_type: String },
    MissingWorkflowField { field: String },
    InvalidWorkflowDefinition { reason: String },
}

/// TCP/TLS failure or negotiation rejection. Session transitions to
/// `Disconnected`; listeners are notified.
#[derive(Debug)]
pub enum ConnectionError {
    Refused { host: String, port: u16 },
    Timeout { host: String, port: u16, timeout_ms: u64 },
    DnsResolution { host: String },
    Tls { message: String },
    NegotiationRejected { option: u8 },
    Closed { reason: String },
}

/// Malformed framing or an order the decoder cannot represent. The
/// session tears down; the offending record belongs in the artifact
/// sink for post-mortem.
#[derive(Debug)]
pub enum ProtocolError {
    MalformedFraming { detail: String },
    InvalidCommand { byte: u8 },
    InvalidOrder { byte: u8 },
    SbaOutOfRange { row: usize, col: usize, rows: usize, cols: usize },
    TruncatedStream { expected: usize, available: usize },
    UnknownStructuredField { class: u8, field_type: u8 },
}

/// Keyboard inhibit state. Recoverable by `RESET`; not fatal.
#[derive(Debug)]
pub enum OperatorError {
    Inhibited { code: u8, status_text: String },
}

/// Raised from `send_string`/`Fill`; the send is not applied.
#[derive(Debug)]
pub enum FieldError {
    Truncation { field: String, max: usize, got: usize },
    NumericViolation { field: String, value: String },
    FerNotSatisfied { field: String },
    BypassWrite { field: String },
    NotFound { name: String },
    ParameterMissing { name: String, available: Vec<String> },
}

/// Codec cannot encode a character for the current CCSID; propagated to
/// the caller, the send is not applied.
#[derive(Debug)]
pub enum CodecError {
    Unmappable { ccsid: String, codepoint: char },
}

/// Any wait exceeding its deadline.
#[derive(Debug)]
pub struct TimeoutError {
    pub waited_for: String,
    pub elapsed_ms: u64,
}

/// A workflow assertion step failed.
#[derive(Debug)]
pub struct AssertionError {
    pub expected: String,
    pub actual: String,
    pub screen_snapshot: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error: {e}"),
            Error::Connection(e) => write!(f, "connection error: {e}"),
            Error::Protocol(e) => write!(f, "protocol error: {e}"),
            Error::Operator(e) => write!(f, "operator error: {e}"),
            Error::Field(e) => write!(f, "field error: {e}"),
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::Timeout(e) => write!(f, "timeout: {e}"),
            Error::Assertion(e) => write!(f, "assertion failed: {e}"),
            Error::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownCcsid { ccsid } => write!(f, "unknown CCSID '{ccsid}'"),
            ConfigError::UnknownDeviceType { device_type } =>
                write!(f, "unknown device type '{device_type}'"),
            ConfigError::MissingWorkflowField { field } =>
                write!(f, "workflow step missing required field '{field}'"),
            ConfigError::InvalidWorkflowDefinition { reason } =>
                write!(f, "invalid workflow definition: {reason}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Refused { host, port } =>
                write!(f, "connection refused to {host}:{port}"),
            ConnectionError::Timeout { host, port, timeout_ms } =>
                write!(f, "connection to {host}:{port} timed out after {timeout_ms}ms"),
            ConnectionError::DnsResolution { host } =>
                write!(f, "DNS resolution failed for {host}"),
            ConnectionError::Tls { message } => write!(f, "TLS error: {message}"),
            ConnectionError::NegotiationRejected { option } =>
                write!(f, "telnet option 0x{option:02X} negotiation rejected"),
            ConnectionError::Closed { reason } => write!(f, "connection closed: {reason}"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedFraming { detail } =>
                write!(f, "malformed telnet framing: {detail}"),
            ProtocolError::InvalidCommand { byte } =>
                write!(f, "invalid 5250 command byte 0x{byte:02X}"),
            ProtocolError::InvalidOrder { byte } =>
                write!(f, "invalid 5250 order byte 0x{byte:02X}"),
            ProtocolError::SbaOutOfRange { row, col, rows, cols } =>
                write!(f, "SBA ({row},{col}) out of range for a {rows}x{cols} screen"),
            ProtocolError::TruncatedStream { expected, available } =>
                write!(f, "truncated stream: expected {expected} bytes, had {available}"),
            ProtocolError::UnknownStructuredField { class, field_type } =>
                write!(f, "unknown structured field class 0x{class:02X} type 0x{field_type:02X}"),
        }
    }
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::Inhibited { code, status_text } =>
                write!(f, "keyboard inhibited (code 0x{code:02X}, {status_text})"),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Truncation { field, max, got } =>
                write!(f, "field '{field}' accepts at most {max} characters, got {got}"),
            FieldError::NumericViolation { field, value } =>
                write!(f, "field '{field}' is numeric-only, rejected '{value}'"),
            FieldError::FerNotSatisfied { field } =>
                write!(f, "field '{field}' requires an explicit field exit"),
            FieldError::BypassWrite { field } =>
                write!(f, "field '{field}' is bypassed and cannot be written"),
            FieldError::NotFound { name } => write!(f, "no field named '{name}'"),
            FieldError::ParameterMissing { name, available } =>
                write!(f, "unknown parameter '${{{name}}}', available columns: {available:?}"),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Unmappable { ccsid, codepoint } =>
                write!(f, "character '{codepoint}' has no mapping in CCSID {ccsid}"),
        }
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiting for {} timed out after {}ms", self.waited_for, self.elapsed_ms)
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {:?}, got {:?}", self.expected, self.actual)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Connection(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Operator(e) => Some(e),
            Error::Field(e) => Some(e),
            Error::Codec(e) => Some(e),
            Error::Timeout(e) => Some(e),
            Error::Assertion(e) => Some(e),
            Error::Cancelled => None,
        }
    }
}

impl StdError for ConfigError {}
impl StdError for ConnectionError {}
impl StdError for ProtocolError {}
impl StdError for OperatorError {}
impl StdError for FieldError {}
impl StdError for CodecError {}
impl StdError for TimeoutError {}
impl StdError for AssertionError {}

macro_rules! from_variant {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Error {
            fn from(err: $ty) -> Self {
                Error::$variant(err)
            }
        }
    };
}

from_variant!(Config, ConfigError);
from_variant!(Connection, ConnectionError);
from_variant!(Protocol, ProtocolError);
from_variant!(Operator, OperatorError);
from_variant!(Field, FieldError);
from_variant!(Codec, CodecError);
from_variant!(Timeout, TimeoutError);
from_variant!(Assertion, AssertionError);

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused =>
                Error::Connection(ConnectionError::Refused { host: "unknown".into(), port: 0 }),
            io::ErrorKind::TimedOut =>
                Error::Connection(ConnectionError::Timeout { host: "unknown".into(), port: 0, timeout_ms: 0 }),
            io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset =>
                Error::Connection(ConnectionError::Closed { reason: err.to_string() }),
            _ => Error::Connection(ConnectionError::Closed { reason: format!("io error: {err}") }),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
