//! Outbound response-record composition: AID responses and read-field
//! replies (§4.5).

use crate::codec;
use crate::error::Result;
use crate::protocol::codes::{Aid, SBA};
use crate::protocol::decoder::ReadRequest;
use crate::screen::Screen;

pub struct Encoder {
    pub ccsid: String,
}

impl Encoder {
    pub fn new(ccsid: impl Into<String>) -> Self {
        Encoder { ccsid: ccsid.into() }
    }

    /// Composes `{AID, cursor row, cursor col, [SBA + field contents]*}`.
    /// Short-form AIDs (CLEAR, HELP, PA1-3) omit the field contents.
    pub fn encode_aid_response(&self, aid: Aid, screen: &Screen) -> Result<Vec<u8>> {
        let (row, col) = screen.cursor().row_col(screen.cols());
        let mut out = vec![aid.to_u8(), (row + 1) as u8, (col + 1) as u8];
        if !aid.is_short_form() {
            self.append_modified_fields(screen, &mut out)?;
        }
        Ok(out)
    }

    /// Host-requested read: all fields for `ReadInputFields`, only
    /// MDT-set fields for `ReadMdtFields`.
    pub fn encode_read_fields_response(&self, request: ReadRequest, screen: &Screen) -> Result<Vec<u8>> {
        let (row, col) = screen.cursor().row_col(screen.cols());
        let mut out = vec![0x00, (row + 1) as u8, (col + 1) as u8];
        for field in screen.fields().iter() {
            let include = match request {
                ReadRequest::InputFields => true,
                ReadRequest::MdtFields => field.is_modified,
            };
            if include {
                self.append_field(screen, field.start_pos, field.end_pos(), &mut out)?;
            }
        }
        Ok(out)
    }

    fn append_modified_fields(&self, screen: &Screen, out: &mut Vec<u8>) -> Result<()> {
        for field in screen.fields().iter() {
            if field.is_modified {
                self.append_field(screen, field.start_pos, field.end_pos(), out)?;
            }
        }
        Ok(())
    }

    fn append_field(&self, screen: &Screen, start: usize, end: usize, out: &mut Vec<u8>) -> Result<()> {
        let (row, col) = screen.row_col_of(start);
        out.push(SBA);
        out.push((row + 1) as u8);
        out.push((col + 1) as u8);
        for pos in start..end {
            let (r, c) = screen.row_col_of(pos);
            let ch = screen.char_at(r, c);
            out.push(codec::encode(&self.ccsid, ch)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::FieldAttribute;

    #[test]
    fn short_form_aid_omits_field_contents() {
        let screen = Screen::new(2, 10);
        let encoder = Encoder::new("037");
        let bytes = encoder.encode_aid_response(Aid::Clear, &screen).unwrap();
        assert_eq!(bytes.len(), 3);
    }

    #[test]
    fn enter_includes_modified_field_contents() {
        let mut screen = Screen::new(1, 10);
        for (i, ch) in "HI".chars().enumerate() {
            screen.put_char(i, ch);
        }
        let field_id = screen.fields_mut().push(0, 2, FieldAttribute(0));
        screen.fields_mut().get_mut(field_id).unwrap().is_modified = true;
        let encoder = Encoder::new("037");
        let bytes = encoder.encode_aid_response(Aid::Enter, &screen).unwrap();
        assert_eq!(bytes[0], Aid::Enter.to_u8());
        assert!(bytes.contains(&SBA));
    }

    #[test]
    fn read_mdt_fields_skips_unmodified() {
        let mut screen = Screen::new(1, 10);
        screen.fields_mut().push(0, 5, FieldAttribute(0));
        screen.fields_mut().push(5, 10, FieldAttribute(0));
        screen.fields_mut().get_mut(1).unwrap().is_modified = true;
        let encoder = Encoder::new("037");
        let bytes = encoder.encode_read_fields_response(ReadRequest::MdtFields, &screen).unwrap();
        assert_eq!(bytes.iter().filter(|&&b| b == SBA).count(), 1);
    }
}
