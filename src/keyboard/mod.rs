//! Keyboard state machine: translates user intent into screen edits or
//! an outbound 5250 response record (§4.5).

use crate::codec;
use crate::error::{Error, FieldError, OperatorError, Result};
use crate::protocol::codes::Aid;
use crate::protocol::encoder::Encoder;
use crate::screen::{InhibitReason, Screen};

/// What `send_key` produced: a pure local edit, or bytes ready for the
/// Telnet framer.
pub enum KeyOutcome {
    Handled,
    Response(Vec<u8>),
}

/// A single keystroke or function/AID key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Home,
    Tab,
    BackTab,
    Left,
    Right,
    Up,
    Down,
    FieldExit,
    Reset,
    Insert,
    Aid(Aid),
}

pub struct Keyboard {
    pub ccsid: String,
}

impl Keyboard {
    pub fn new(ccsid: impl Into<String>) -> Self {
        Keyboard { ccsid: ccsid.into() }
    }

    pub fn send_key(&self, screen: &mut Screen, key: Key) -> Result<KeyOutcome> {
        if screen.oia().keyboard_locked() && !matches!(key, Key::Reset) {
            let code = match screen.oia().inhibit_reason() {
                InhibitReason::OperatorError(code) => *code,
                _ => 0x01,
            };
            return Err(Error::Operator(OperatorError::Inhibited {
                code,
                status_text: screen.oia().status_text(),
            }));
        }

        match key {
            Key::Char(ch) => self.accept_char(screen, ch).map(|_| KeyOutcome::Handled),
            Key::Home => {
                self.move_home(screen);
                Ok(KeyOutcome::Handled)
            }
            Key::Tab => {
                self.move_to_next_field(screen);
                Ok(KeyOutcome::Handled)
            }
            Key::BackTab => {
                self.move_to_previous_field(screen);
                Ok(KeyOutcome::Handled)
            }
            Key::Left | Key::Right | Key::Up | Key::Down => {
                self.move_cursor(screen, key);
                Ok(KeyOutcome::Handled)
            }
            Key::FieldExit => {
                if let Some(field) = screen.fields_mut().field_at_mut(screen.cursor().pos) {
                    field.fer_satisfied = true;
                }
                self.move_to_next_field(screen);
                Ok(KeyOutcome::Handled)
            }
            Key::Reset => {
                screen.oia_mut().clear_inhibit();
                Ok(KeyOutcome::Handled)
            }
            Key::Insert => {
                screen.oia_mut().insert_mode = !screen.oia_mut().insert_mode;
                Ok(KeyOutcome::Handled)
            }
            Key::Aid(aid) => self.send_aid(screen, aid).map(KeyOutcome::Response),
        }
    }

    /// Writes `text` into the field under the cursor. All-or-nothing: a
    /// field-exit validation failure, a length overrun, or an unmappable
    /// character is reported before any cell is touched (§4.1, §4.5).
    pub fn send_string(&self, screen: &mut Screen, text: &str) -> Result<()> {
        if screen.oia().keyboard_locked() {
            let code = match screen.oia().inhibit_reason() {
                InhibitReason::OperatorError(code) => *code,
                _ => 0x01,
            };
            return Err(Error::Operator(OperatorError::Inhibited {
                code,
                status_text: screen.oia().status_text(),
            }));
        }

        let pos = screen.cursor().pos;
        let field = screen
            .field_at(pos)
            .ok_or_else(|| Error::Field(FieldError::NotFound { name: format!("position {pos}") }))?;
        let descriptor = format!("field@{}", field.start_pos);
        if !field.is_input_capable() {
            return Err(Error::Field(FieldError::BypassWrite { field: descriptor }));
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() > field.max_entry_length {
            return Err(Error::Field(FieldError::Truncation {
                field: descriptor,
                max: field.max_entry_length,
                got: chars.len(),
            }));
        }
        if field.attribute.is_numeric() {
            if let Some(bad) = chars.iter().find(|c| !matches!(c, '0'..='9' | '.' | ',' | '+' | '-')) {
                return Err(Error::Field(FieldError::NumericViolation {
                    field: descriptor,
                    value: bad.to_string(),
                }));
            }
        }
        // Validate every character encodes before committing any of them.
        for ch in &chars {
            codec::encode(&self.ccsid, *ch)?;
        }

        let field_id = field.field_id;
        let start = field.start_pos;
        for (offset, ch) in chars.into_iter().enumerate() {
            screen.put_char(start + offset, ch);
        }
        if let Some(field) = screen.fields_mut().get_mut(field_id) {
            field.is_modified = true;
        }
        let next_pos = start + text.chars().count();
        if next_pos < screen.fields().get(field_id).map(|f| f.end_pos()).unwrap_or(next_pos) {
            screen.cursor_mut().pos = next_pos;
        } else {
            self.move_to_next_field(screen);
        }
        Ok(())
    }

    fn accept_char(&self, screen: &mut Screen, ch: char) -> Result<()> {
        let pos = screen.cursor().pos;
        let Some(field) = screen.field_at(pos) else {
            return Err(Error::Operator(OperatorError::Inhibited {
                code: crate::protocol::codes::ERR_NO_FIELD,
                status_text: "cursor in protected area of display".into(),
            }));
        };
        if !field.is_input_capable() {
            return Err(Error::Operator(OperatorError::Inhibited {
                code: crate::protocol::codes::ERR_BYPASS_FIELD,
                status_text: "entry not allowed in this field".into(),
            }));
        }
        if field.attribute.is_numeric() && !matches!(ch, '0'..='9' | '.' | ',' | '+' | '-') {
            return Err(Error::Operator(OperatorError::Inhibited {
                code: crate::protocol::codes::ERR_NUMERIC_ONLY,
                status_text: "field requires numeric characters".into(),
            }));
        }
        let field_id = field.field_id;
        let field_end = field.end_pos();

        screen.put_char(pos, ch);
        if let Some(field) = screen.fields_mut().get_mut(field_id) {
            field.is_modified = true;
        }
        let next_pos = pos + 1;
        if next_pos < field_end {
            screen.cursor_mut().pos = next_pos;
        } else {
            self.move_to_next_field(screen);
        }
        Ok(())
    }

    fn move_home(&self, screen: &mut Screen) {
        let pos = screen
            .fields()
            .iter()
            .find(|f| f.is_input_capable())
            .map(|f| f.start_pos)
            .unwrap_or(0);
        screen.cursor_mut().pos = pos;
    }

    fn move_to_next_field(&self, screen: &mut Screen) {
        let pos = screen.cursor().pos;
        if let Some(field) = screen.fields().next_input_capable(pos) {
            screen.cursor_mut().pos = field.start_pos;
        }
    }

    fn move_to_previous_field(&self, screen: &mut Screen) {
        let pos = screen.cursor().pos;
        if let Some(field) = screen.fields().previous_input_capable(pos) {
            screen.cursor_mut().pos = field.start_pos;
        }
    }

    fn move_cursor(&self, screen: &mut Screen, key: Key) {
        let cols = screen.cols();
        let len = screen.len();
        let pos = screen.cursor().pos;
        let new_pos = match key {
            Key::Left => pos.checked_sub(1).unwrap_or(len - 1),
            Key::Right => (pos + 1) % len,
            Key::Up => (pos + len - cols) % len,
            Key::Down => (pos + cols) % len,
            _ => pos,
        };
        screen.cursor_mut().pos = new_pos;
    }

    fn send_aid(&self, screen: &mut Screen, aid: Aid) -> Result<Vec<u8>> {
        let unsatisfied_fer = screen
            .fields()
            .iter()
            .any(|f| f.attribute.is_fer() && !f.fer_satisfied);
        if unsatisfied_fer {
            return Err(Error::Operator(OperatorError::Inhibited {
                code: crate::protocol::codes::ERR_NO_FIELD_EXIT,
                status_text: "field requires an explicit field exit".into(),
            }));
        }

        let encoder = Encoder::new(self.ccsid.clone());
        let bytes = encoder.encode_aid_response(aid, screen)?;
        screen.oia_mut().set_inhibit(InhibitReason::SystemLock);
        Ok(bytes)
    }
}
