//! Write-to-Display-Structured-Field (WTDSF) container parsing and the
//! 5250 Query Reply we hand back when the host asks what we are.

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::codes::{SF_CLASS_5250, SF_TYPE_DEFINE_AUDIT_WINDOW, SF_TYPE_QUERY, SF_TYPE_REMOVE_AUDIT_WINDOW};

/// One `{len(2B), class(1B), type(1B), payload}` subfield pulled out of a
/// Write Structured Field record.
pub struct Subfield<'a> {
    pub class: u8,
    pub field_type: u8,
    pub payload: &'a [u8],
}

/// Splits a WTDSF record body into its subfields. Unknown classes are
/// still yielded (the caller skips them); only a length that runs past
/// the end of the record is an error.
pub fn parse_subfields(mut body: &[u8]) -> Result<Vec<Subfield<'_>>> {
    let mut subfields = Vec::new();
    while !body.is_empty() {
        if body.len() < 4 {
            return Err(Error::Protocol(ProtocolError::TruncatedStream {
                expected: 4,
                available: body.len(),
            }));
        }
        let len = u16::from_be_bytes([body[0], body[1]]) as usize;
        if len < 4 || len > body.len() {
            return Err(Error::Protocol(ProtocolError::TruncatedStream {
                expected: len,
                available: body.len(),
            }));
        }
        let class = body[2];
        let field_type = body[3];
        let payload = &body[4..len];
        subfields.push(Subfield { class, field_type, payload });
        body = &body[len..];
    }
    Ok(subfields)
}

pub fn is_query(sf: &Subfield) -> bool {
    sf.class == SF_CLASS_5250 && sf.field_type == SF_TYPE_QUERY
}

pub fn is_audit_window(sf: &Subfield) -> bool {
    sf.class == SF_CLASS_5250
        && (sf.field_type == SF_TYPE_DEFINE_AUDIT_WINDOW || sf.field_type == SF_TYPE_REMOVE_AUDIT_WINDOW)
}

/// Builds the 5250 Query Reply structured field announcing rows,
/// columns, color support, and keyboard type for the emulated terminal.
pub fn build_query_reply(rows: usize, cols: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.push(SF_CLASS_5250);
    payload.push(SF_TYPE_QUERY);
    payload.push(rows as u8);
    payload.push((cols >> 8) as u8);
    payload.push((cols & 0xFF) as u8);
    payload.push(0x01); // color support present
    payload.push(0x01); // keyboard type: standard

    let len = (payload.len() + 2) as u16;
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_subfields_back_to_back() {
        let body = [0, 5, 0xD9, 0x30, 0xAA, 0, 5, 0xD9, 0x70, 0xBB];
        let subfields = parse_subfields(&body).unwrap();
        assert_eq!(subfields.len(), 2);
        assert!(is_audit_window(&subfields[0]));
        assert!(is_query(&subfields[1]));
    }

    #[test]
    fn truncated_subfield_length_is_protocol_error() {
        let body = [0, 10, 0xD9, 0x70];
        assert!(parse_subfields(&body).is_err());
    }

    #[test]
    fn query_reply_carries_rows_and_cols() {
        let reply = build_query_reply(24, 80);
        assert_eq!(reply[2], SF_CLASS_5250);
        assert_eq!(reply[3], SF_TYPE_QUERY);
        assert_eq!(reply[4], 24);
        assert_eq!(u16::from_be_bytes([reply[5], reply[6]]), 80);
    }
}
