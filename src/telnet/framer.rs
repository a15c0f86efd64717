//! Turns a raw byte stream into 5250 records delimited by `IAC EOR`.
//!
//! Telnet commands (`IAC DO/DONT/WILL/WONT`, `IAC SB ... IAC SE`) are
//! intercepted out of band and never reach the record buffer; `IAC IAC`
//! is unescaped to a single literal `0xFF` data byte.

use crate::error::{Error, ProtocolError, Result};
use crate::telnet::negotiator::{DO, DONT, IAC, EOR, SB, SE, WILL, WONT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InData,
    InIac,
    InNegotiation(u8),
    InSb,
    InSbIac,
}

/// An item produced by the framer while scanning a chunk of socket bytes.
pub enum FramerEvent {
    /// A complete 5250 record, with escaping already undone.
    Record(Vec<u8>),
    /// `IAC <DO|DONT|WILL|WONT> <option>` — caller replies via the negotiator.
    Negotiate { command: u8, option: u8 },
    /// `IAC SB <option> ... IAC SE` payload, option byte stripped.
    Subnegotiation { option: u8, data: Vec<u8> },
    /// `IAC NOP`/`IAC DM`/etc. with no data significance.
    Ignored,
}

/// Incremental IAC-EOR record framer. Feed it raw bytes as they arrive
/// from the socket; it yields zero or more [`FramerEvent`]s per call.
pub struct TelnetFramer {
    state: State,
    record: Vec<u8>,
    sb_option: u8,
    sb_option_read: bool,
    sb_buf: Vec<u8>,
}

impl Default for TelnetFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetFramer {
    pub fn new() -> Self {
        TelnetFramer {
            state: State::InData,
            record: Vec::new(),
            sb_option: 0,
            sb_option_read: false,
            sb_buf: Vec::new(),
        }
    }

    /// Feed a chunk of bytes read from the socket. Bulk reads (an 8 KiB
    /// buffer at the call site) keep this off the per-byte-syscall path;
    /// this method itself only does in-memory scanning.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<FramerEvent>> {
        let mut events = Vec::new();
        for &byte in chunk {
            if let Some(event) = self.feed_byte(byte)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn feed_byte(&mut self, byte: u8) -> Result<Option<FramerEvent>> {
        match self.state {
            State::InData => {
                if byte == IAC {
                    self.state = State::InIac;
                    Ok(None)
                } else {
                    self.record.push(byte);
                    Ok(None)
                }
            }
            State::InIac => match byte {
                IAC => {
                    self.record.push(0xFF);
                    self.state = State::InData;
                    Ok(None)
                }
                EOR => {
                    self.state = State::InData;
                    let record = std::mem::take(&mut self.record);
                    Ok(Some(FramerEvent::Record(record)))
                }
                DO | DONT | WILL | WONT => {
                    self.state = State::InNegotiation(byte);
                    Ok(None)
                }
                SB => {
                    self.state = State::InSb;
                    self.sb_buf.clear();
                    self.sb_option_read = false;
                    Ok(None)
                }
                SE => {
                    // Stray SE with no matching SB: ignore.
                    self.state = State::InData;
                    Ok(Some(FramerEvent::Ignored))
                }
                _ => {
                    // NOP, DM, GA, etc: no payload, not an error.
                    self.state = State::InData;
                    Ok(Some(FramerEvent::Ignored))
                }
            },
            State::InNegotiation(command) => {
                self.state = State::InData;
                Ok(Some(FramerEvent::Negotiate { command, option: byte }))
            }
            State::InSb => {
                if byte == IAC {
                    self.state = State::InSbIac;
                    Ok(None)
                } else if !self.sb_option_read {
                    self.sb_option = byte;
                    self.sb_option_read = true;
                    Ok(None)
                } else {
                    self.sb_buf.push(byte);
                    Ok(None)
                }
            }
            State::InSbIac => match byte {
                IAC => {
                    self.sb_buf.push(0xFF);
                    self.state = State::InSb;
                    Ok(None)
                }
                SE => {
                    self.state = State::InData;
                    let data = std::mem::take(&mut self.sb_buf);
                    Ok(Some(FramerEvent::Subnegotiation { option: self.sb_option, data }))
                }
                _ => Err(Error::Protocol(ProtocolError::MalformedFraming {
                    detail: format!("unexpected IAC {byte:#04x} inside subnegotiation"),
                })),
            },
        }
    }

    /// Frame a response record for the wire: double any `0xFF` data byte
    /// and terminate with `IAC EOR`.
    pub fn frame(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 2);
        for &b in data {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.push(IAC);
        out.push(EOR);
        out
    }
}
