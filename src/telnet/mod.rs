//! Telnet negotiation and record framing (spec §4.2).

pub mod framer;
pub mod negotiator;

pub use framer::{FramerEvent, TelnetFramer};
pub use negotiator::{NegotiationState, TelnetNegotiator, TelnetOption};

use crate::error::Result;

/// Bulk read size for the inbound socket loop; per-byte reads are
/// correctness-acceptable but performance-forbidden.
pub const READ_BUFFER_SIZE: usize = 8192;

/// Drives the framer and negotiator together: feeds raw bytes in,
/// returns completed 5250 records and any negotiation replies that must
/// be written back to the peer immediately.
pub struct TelnetCodec {
    framer: TelnetFramer,
    negotiator: TelnetNegotiator,
}

/// What the codec produced from one chunk of inbound bytes.
pub struct CodecOutput {
    pub records: Vec<Vec<u8>>,
    pub replies: Vec<u8>,
}

impl TelnetCodec {
    pub fn new(device_name: impl Into<String>) -> Self {
        TelnetCodec { framer: TelnetFramer::new(), negotiator: TelnetNegotiator::new(device_name) }
    }

    pub fn negotiator(&self) -> &TelnetNegotiator {
        &self.negotiator
    }

    pub fn negotiator_mut(&mut self) -> &mut TelnetNegotiator {
        &mut self.negotiator
    }

    /// Initial replies to kick off negotiation before the host sends
    /// anything (we proactively DO/WILL the required options).
    pub fn initial_negotiation(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for option in [TelnetOption::Binary, TelnetOption::EndOfRecord, TelnetOption::SuppressGoAhead] {
            out.extend_from_slice(&[negotiator::IAC, negotiator::WILL, option.code()]);
            out.extend_from_slice(&[negotiator::IAC, negotiator::DO, option.code()]);
        }
        out
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<CodecOutput> {
        let mut records = Vec::new();
        let mut replies = Vec::new();
        for event in self.framer.feed(chunk)? {
            match event {
                FramerEvent::Record(record) => records.push(record),
                FramerEvent::Negotiate { command, option } => {
                    replies.extend(self.negotiator.process_command(command, option)?);
                }
                FramerEvent::Subnegotiation { option, data } => {
                    if let Some(reply) = self.negotiator.process_subnegotiation(option, &data)? {
                        replies.extend(reply);
                    }
                }
                FramerEvent::Ignored => {}
            }
        }
        Ok(CodecOutput { records, replies })
    }

    pub fn frame_outbound(data: &[u8]) -> Vec<u8> {
        TelnetFramer::frame(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_yields_records_and_negotiation_replies() {
        let mut codec = TelnetCodec::new("IBM-3179-2");
        let input = [
            negotiator::IAC, negotiator::DO, TelnetOption::Binary.code(),
            b'h', b'i',
            negotiator::IAC, negotiator::EOR,
        ];
        let out = codec.feed(&input).unwrap();
        assert_eq!(out.records, vec![b"hi".to_vec()]);
        assert!(!out.replies.is_empty());
    }
}
