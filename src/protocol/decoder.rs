//! The 5250 stream decoder: command/order dispatch, field table
//! construction, and Query Reply assembly (§4.3).

use crate::codec;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::codes::*;
use crate::protocol::structured_field::{self, Subfield};
use crate::screen::{FieldAttribute, Screen};

/// What processing a single record produced besides screen mutations.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Bytes the session must write back immediately (query reply, etc).
    pub replies: Vec<Vec<u8>>,
    /// The host asked for all modified fields, or only MDT fields.
    pub read_request: Option<ReadRequest>,
    /// A negative-response record to send back; the offending order was
    /// skipped but the record as a whole is not fatal.
    pub negative_response: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    InputFields,
    MdtFields,
}

/// Write Control Character bit controlling keyboard unlock, applied from
/// the second byte following Write-to-Display (CC2).
const WCC_UNLOCK_KEYBOARD: u8 = 0x40;
/// Write Control Character bit for the message-waiting light (CC1).
const WCC_MESSAGE_LIGHT: u8 = 0x20;

pub struct Decoder {
    pub ccsid: String,
}

impl Decoder {
    pub fn new(ccsid: impl Into<String>) -> Self {
        Decoder { ccsid: ccsid.into() }
    }

    /// Consumes one complete 5250 record, mutating `screen` and reporting
    /// anything the caller (the session) must do in response.
    pub fn decode_record(&self, screen: &mut Screen, record: &[u8]) -> Result<DecodeOutcome> {
        let mut outcome = DecodeOutcome::default();
        let Some(&command_byte) = record.first() else {
            return Ok(outcome);
        };
        let Some(command) = CommandCode::from_u8(command_byte) else {
            return Err(Error::Protocol(ProtocolError::InvalidCommand { byte: command_byte }));
        };

        match command {
            CommandCode::WriteToDisplay => self.decode_write_to_display(screen, &record[1..], &mut outcome)?,
            CommandCode::WriteStructuredField => self.decode_wtdsf(screen, &record[1..], &mut outcome)?,
            CommandCode::ClearUnit => screen.clear_unit(),
            CommandCode::ClearFormatTable => screen.clear_format_table(),
            CommandCode::ReadInputFields => outcome.read_request = Some(ReadRequest::InputFields),
            CommandCode::ReadMdtFields => outcome.read_request = Some(ReadRequest::MdtFields),
            CommandCode::SaveScreen | CommandCode::SavePartialScreen => {
                log::debug!("ignoring {command:?}: save/restore screen snapshots are out of scope");
            }
        }
        Ok(outcome)
    }

    fn decode_write_to_display(&self, screen: &mut Screen, body: &[u8], outcome: &mut DecodeOutcome) -> Result<()> {
        if body.len() < 2 {
            return Err(Error::Protocol(ProtocolError::TruncatedStream { expected: 2, available: body.len() }));
        }
        let (cc1, cc2) = (body[0], body[1]);
        if cc1 & WCC_MESSAGE_LIGHT != 0 {
            screen.oia_mut().message_waiting = true;
        }

        // A WTD rebuilds the field table wholesale (spec §3): any field
        // left over from the previous screen is discarded before this
        // record's SF/SFE orders register the new ones.
        screen.clear_format_table();

        let rows = screen.rows();
        let cols = screen.cols();
        let mut pos = screen.cursor().pos;
        let mut pending_field_start: Option<(usize, FieldAttribute)> = None;
        let mut i = 2;

        macro_rules! close_pending_field {
            ($end:expr) => {
                if let Some((start, attribute)) = pending_field_start.take() {
                    screen.fields_mut().push(start, $end, attribute);
                }
            };
        }
        macro_rules! need {
            ($n:expr) => {
                if i + $n > body.len() {
                    return Err(truncated(i + $n, body.len()));
                }
            };
        }

        while i < body.len() {
            let byte = body[i];
            match OrderCode::from_u8(byte) {
                Some(OrderCode::SetBufferAddress) => {
                    need!(3);
                    let (row, col) = (body[i + 1] as usize, body[i + 2] as usize);
                    i += 3;
                    if row == 0 || row > rows || col == 0 || col > cols {
                        outcome.negative_response = Some(negative_response(DSNR_INVCURSPOS));
                        continue;
                    }
                    pos = (row - 1) * cols + (col - 1);
                }
                Some(OrderCode::InsertCursor) => {
                    need!(3);
                    let (row, col) = (body[i + 1] as usize, body[i + 2] as usize);
                    i += 3;
                    if row >= 1 && row <= rows && col >= 1 && col <= cols {
                        screen.cursor_mut().set_row_col(row - 1, col - 1, cols);
                    }
                }
                Some(OrderCode::StartOfField) | Some(OrderCode::StartOfFieldExtended) => {
                    need!(2);
                    let attr_byte = body[i + 1];
                    i += 2;
                    close_pending_field!(pos);
                    screen.set_attribute_at(pos, FieldAttribute(attr_byte));
                    pos += 1;
                    pending_field_start = Some((pos, FieldAttribute(attr_byte)));
                }
                Some(OrderCode::SetAttribute) => {
                    need!(2);
                    let attr_byte = body[i + 1];
                    i += 2;
                    screen.set_attribute_at(pos, FieldAttribute(attr_byte));
                }
                Some(OrderCode::RepeatToAddress) => {
                    need!(4);
                    let (row, col, fill_byte) = (body[i + 1] as usize, body[i + 2] as usize, body[i + 3]);
                    i += 4;
                    if row == 0 || row > rows || col == 0 || col > cols {
                        outcome.negative_response = Some(negative_response(DSNR_INVCURSPOS));
                        continue;
                    }
                    let end = (row - 1) * cols + (col - 1) + 1;
                    let ch = codec::decode(&self.ccsid, fill_byte)?;
                    while pos < end {
                        pos = screen.put_char(pos, ch);
                    }
                }
                Some(OrderCode::EraseToAddress) => {
                    need!(4);
                    let (row, col) = (body[i + 1] as usize, body[i + 2] as usize);
                    i += 4;
                    let end = ((row.saturating_sub(1)) * cols + col.saturating_sub(1) + 1).min(screen.len());
                    while pos < end {
                        pos = screen.put_char(pos, ' ');
                    }
                }
                Some(OrderCode::StartOfHeader) => {
                    need!(2);
                    let len = body[i + 1] as usize;
                    i += 2 + len;
                }
                None => {
                    let ch = codec::decode(&self.ccsid, byte)?;
                    pos = screen.put_char(pos, ch);
                    i += 1;
                }
            }
        }
        close_pending_field!(pos);
        screen.cursor_mut().pos = pos;

        if cc2 & WCC_UNLOCK_KEYBOARD != 0 {
            screen.oia_mut().clear_inhibit();
        }
        Ok(())
    }

    fn decode_wtdsf(&self, screen: &mut Screen, body: &[u8], outcome: &mut DecodeOutcome) -> Result<()> {
        for sf in structured_field::parse_subfields(body)? {
            self.decode_subfield(screen, &sf, outcome);
        }
        Ok(())
    }

    fn decode_subfield(&self, screen: &Screen, sf: &Subfield, outcome: &mut DecodeOutcome) {
        if structured_field::is_query(sf) {
            outcome.replies.push(structured_field::build_query_reply(screen.rows(), screen.cols()));
        } else if structured_field::is_audit_window(sf) {
            log::debug!("audit window structured field acknowledged, no-op");
        } else {
            log::debug!("skipping unknown structured field class {:#04x} type {:#04x}", sf.class, sf.field_type);
        }
    }
}

fn truncated(expected: usize, available: usize) -> Error {
    Error::Protocol(ProtocolError::TruncatedStream { expected, available })
}

fn negative_response(code: u8) -> Vec<u8> {
    let mut out = NR_REQUEST_ERROR.to_vec();
    out.push(code);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> Decoder {
        Decoder::new("037")
    }

    #[test]
    fn write_to_display_writes_characters() {
        let mut screen = Screen::new(2, 5);
        let d = decoder();
        // WTD, cc1=0, cc2=unlock, then plain EBCDIC 'A' (0xC1) 'B' (0xC2)
        let record = [CMD_WRITE_TO_DISPLAY, 0x00, WCC_UNLOCK_KEYBOARD, 0xC1, 0xC2];
        d.decode_record(&mut screen, &record).unwrap();
        assert_eq!(screen.char_at(0, 0), 'A');
        assert_eq!(screen.char_at(0, 1), 'B');
        assert!(!screen.oia().keyboard_locked());
    }

    #[test]
    fn sba_then_sf_registers_field_up_to_next_sf() {
        let mut screen = Screen::new(2, 10);
        let d = decoder();
        let record = [
            CMD_WRITE_TO_DISPLAY, 0x00, 0x00,
            SBA, 0x01, 0x01,
            SF, 0x00, // unprotected field starting at col 2 (pos 1)
            0xC1, 0xC2, 0xC3,
        ];
        d.decode_record(&mut screen, &record).unwrap();
        let field = screen.field_at(1).unwrap();
        assert_eq!(field.start_pos, 1);
        assert_eq!(field.end_pos(), 4);
    }

    #[test]
    fn sba_out_of_range_yields_negative_response_not_error() {
        let mut screen = Screen::new(2, 5);
        let d = decoder();
        let record = [CMD_WRITE_TO_DISPLAY, 0x00, 0x00, SBA, 0x0A, 0x0A];
        let outcome = d.decode_record(&mut screen, &record).unwrap();
        assert!(outcome.negative_response.is_some());
    }

    #[test]
    fn query_structured_field_yields_query_reply() {
        let mut screen = Screen::new(24, 80);
        let d = decoder();
        let mut body = vec![CMD_WRITE_STRUCTURED_FIELD];
        body.extend_from_slice(&[0, 4, SF_CLASS_5250, SF_TYPE_QUERY]);
        let outcome = d.decode_record(&mut screen, &body).unwrap();
        assert_eq!(outcome.replies.len(), 1);
    }

    #[test]
    fn clear_unit_resets_screen() {
        let mut screen = Screen::new(2, 5);
        screen.put_char(0, 'Z');
        let d = decoder();
        d.decode_record(&mut screen, &[CMD_CLEAR_UNIT]).unwrap();
        assert_eq!(screen.char_at(0, 0), ' ');
    }

    #[test]
    fn read_input_fields_is_reported_not_applied() {
        let mut screen = Screen::new(2, 5);
        let d = decoder();
        let outcome = d.decode_record(&mut screen, &[CMD_READ_INPUT_FIELDS]).unwrap();
        assert_eq!(outcome.read_request, Some(ReadRequest::InputFields));
    }

    #[test]
    fn invalid_command_byte_is_protocol_error() {
        let mut screen = Screen::new(2, 5);
        let d = decoder();
        assert!(d.decode_record(&mut screen, &[0xAB]).is_err());
    }
}
