//! The screen model: four parallel planes, the field table, cursor and
//! OIA state, and dirty-region tracking (spec §3, §4.4).

pub mod cursor;
pub mod field;
pub mod oia;

pub use cursor::Cursor;
pub use field::{Field, FieldAttribute, FieldTable};
pub use oia::{InhibitReason, Oia};

/// Underline/reverse/blink/column-separator/GUI-decoration flags carried
/// by the extended/graphic plane (SFE and 3270-style extended attributes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedAttribute(pub u8);

impl ExtendedAttribute {
    pub const UNDERLINE: u8 = 0x01;
    pub const REVERSE: u8 = 0x02;
    pub const BLINK: u8 = 0x04;
    pub const COLUMN_SEPARATOR: u8 = 0x08;

    pub fn underline(self) -> bool {
        self.0 & Self::UNDERLINE != 0
    }

    pub fn reverse(self) -> bool {
        self.0 & Self::REVERSE != 0
    }

    pub fn blink(self) -> bool {
        self.0 & Self::BLINK != 0
    }

    pub fn column_separator(self) -> bool {
        self.0 & Self::COLUMN_SEPARATOR != 0
    }
}

/// Tracks the smallest contiguous range of positions touched since the
/// last `take`, so listeners can redraw incrementally instead of on
/// every single character write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyRegion {
    start: Option<usize>,
    end: Option<usize>,
}

impl DirtyRegion {
    pub fn mark(&mut self, pos: usize) {
        self.mark_range(pos, pos + 1);
    }

    pub fn mark_range(&mut self, start: usize, end: usize) {
        self.start = Some(self.start.map_or(start, |s| s.min(start)));
        self.end = Some(self.end.map_or(end, |e| e.max(end)));
    }

    pub fn take(&mut self) -> Option<(usize, usize)> {
        let range = self.start.zip(self.end);
        self.start = None;
        self.end = None;
        range
    }

    pub fn is_dirty(&self) -> bool {
        self.start.is_some()
    }
}

/// Default base color (green) used where the host has not overridden it
/// via an extended-attribute order.
pub const DEFAULT_COLOR: u8 = 0x20;

/// `{rows, cols}` where rows ∈ {24, 27}, cols ∈ {80, 132}; `len = rows*cols`.
/// Mutated exclusively by the decoder (inbound writes) and the keyboard
/// state machine (outbound writes into input-capable fields).
pub struct Screen {
    rows: usize,
    cols: usize,
    chars: Vec<char>,
    attrs: Vec<u8>,
    colors: Vec<u8>,
    extended: Vec<ExtendedAttribute>,
    fields: FieldTable,
    cursor: Cursor,
    oia: Oia,
    dirty: DirtyRegion,
}

impl Screen {
    pub fn new(rows: usize, cols: usize) -> Self {
        let len = rows * cols;
        Screen {
            rows,
            cols,
            chars: vec![' '; len],
            attrs: vec![0; len],
            colors: vec![DEFAULT_COLOR; len],
            extended: vec![ExtendedAttribute::default(); len],
            fields: FieldTable::new(len),
            cursor: Cursor::home(),
            oia: Oia::default(),
            dirty: DirtyRegion::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn pos_of(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn row_col_of(&self, pos: usize) -> (usize, usize) {
        (pos / self.cols, pos % self.cols)
    }

    pub fn char_at(&self, row: usize, col: usize) -> char {
        self.chars[self.pos_of(row, col)]
    }

    /// Character plane concatenated with a newline every `cols` positions.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.len() + self.rows);
        for (i, ch) in self.chars.iter().enumerate() {
            if i > 0 && i % self.cols == 0 {
                out.push('\n');
            }
            out.push(*ch);
        }
        out
    }

    pub fn field_at(&self, pos: usize) -> Option<&Field> {
        self.fields.field_at(pos)
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldTable {
        &mut self.fields
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn oia(&self) -> &Oia {
        &self.oia
    }

    pub fn oia_mut(&mut self) -> &mut Oia {
        &mut self.oia
    }

    pub fn take_dirty(&mut self) -> Option<(usize, usize)> {
        self.dirty.take()
    }

    /// Text currently held by a field, trimmed of trailing spaces.
    pub fn get_field_text(&self, field_id: usize) -> Option<String> {
        let field = self.fields.get(field_id)?;
        let text: String = self.chars[field.start_pos..field.end_pos()].iter().collect();
        Some(text.trim_end().to_string())
    }

    /// Writes a single character at `pos` (decoder/keyboard path only).
    /// Wraps to position 0 past the end of screen (vendor-specific,
    /// tested behavior is "wrap to 0").
    pub fn put_char(&mut self, pos: usize, ch: char) -> usize {
        let pos = if pos >= self.len() {
            log::debug!("write position {pos} past end of screen, wrapping to 0");
            0
        } else {
            pos
        };
        self.chars[pos] = ch;
        self.dirty.mark(pos);
        pos + 1
    }

    pub fn set_attribute_at(&mut self, pos: usize, attribute: FieldAttribute) {
        self.attrs[pos] = attribute.0;
        self.dirty.mark(pos);
    }

    pub fn attribute_at(&self, pos: usize) -> FieldAttribute {
        FieldAttribute(self.attrs[pos])
    }

    pub fn set_color_at(&mut self, pos: usize, color: u8) {
        self.colors[pos] = color;
        self.dirty.mark(pos);
    }

    pub fn set_extended_at(&mut self, pos: usize, extended: ExtendedAttribute) {
        self.extended[pos] = extended;
        self.dirty.mark(pos);
    }

    /// Clear Unit (0x04): zero all planes, reset fields, reset OIA, home cursor.
    pub fn clear_unit(&mut self) {
        self.chars.iter_mut().for_each(|c| *c = ' ');
        self.attrs.iter_mut().for_each(|a| *a = 0);
        self.colors.iter_mut().for_each(|c| *c = DEFAULT_COLOR);
        self.extended.iter_mut().for_each(|e| *e = ExtendedAttribute::default());
        self.fields.clear(self.len());
        self.oia = Oia::default();
        self.cursor = Cursor::home();
        self.dirty.mark_range(0, self.len());
    }

    /// Clear Format Table (0x40): discard the field table, keep the
    /// character plane.
    pub fn clear_format_table(&mut self) {
        self.fields.clear(self.len());
        self.dirty.mark_range(0, self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_position_maps_back_through_row_col() {
        let screen = Screen::new(24, 80);
        for pos in 0..screen.len() {
            let (row, col) = screen.row_col_of(pos);
            assert_eq!(screen.pos_of(row, col), pos);
        }
    }

    #[test]
    fn text_inserts_newline_every_cols() {
        let mut screen = Screen::new(2, 3);
        for (i, ch) in "ABCDEF".chars().enumerate() {
            screen.put_char(i, ch);
        }
        assert_eq!(screen.text(), "ABC\nDEF");
    }

    #[test]
    fn put_char_past_end_wraps_to_zero() {
        let mut screen = Screen::new(2, 3);
        let next = screen.put_char(5, 'X');
        assert_eq!(next, 6);
        let next = screen.put_char(6, 'Y');
        assert_eq!(next, 1);
        assert_eq!(screen.char_at(0, 0), 'Y');
    }

    #[test]
    fn clear_unit_resets_everything() {
        let mut screen = Screen::new(2, 3);
        screen.put_char(0, 'Z');
        screen.fields_mut().push(0, 3, FieldAttribute(0));
        screen.oia_mut().clear_inhibit();
        screen.clear_unit();
        assert_eq!(screen.char_at(0, 0), ' ');
        assert!(screen.fields().is_empty());
        assert!(screen.oia().keyboard_locked());
    }

    #[test]
    fn get_field_text_trims_trailing_spaces() {
        let mut screen = Screen::new(1, 10);
        for (i, ch) in "HI".chars().enumerate() {
            screen.put_char(i, ch);
        }
        screen.fields_mut().push(0, 10, FieldAttribute(0));
        assert_eq!(screen.get_field_text(0).unwrap(), "HI");
    }
}
