//! The 3270 presentation space
//!
//! A linear buffer of character cells with position-bound attributes, a
//! derived field directory, cursor, and keyboard state. The buffer is
//! authoritative; the field directory is rebuilt lazily after any write
//! that touches an attribute cell.

use log::debug;

use super::codes::*;
use super::field::{graphic_attr, ExtendedAttributes, Field, FieldDirectory};
use crate::codec::{self, CodePage};
use crate::error::{InputError, InputResult};

/// Standard 3270 screen sizes, plus non-standard alternates
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScreenSize {
    /// Model 2: 24x80
    Model2,
    /// Model 3: 32x80
    Model3,
    /// Model 4: 43x80
    Model4,
    /// Model 5: 27x132
    Model5,
    /// A non-standard size negotiated via IBM-DYNAMIC
    Custom { rows: u16, cols: u16 },
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
            Self::Custom { rows, .. } => *rows as usize,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 => 80,
            Self::Model3 => 80,
            Self::Model4 => 80,
            Self::Model5 => 132,
            Self::Custom { cols, .. } => *cols as usize,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }

    /// The standard size matching rows x cols, or a custom size
    pub fn for_dimensions(rows: u16, cols: u16) -> Self {
        match (rows, cols) {
            (24, 80) => Self::Model2,
            (32, 80) => Self::Model3,
            (43, 80) => Self::Model4,
            (27, 132) => Self::Model5,
            _ => Self::Custom { rows, cols },
        }
    }
}

/// One position in the presentation space
///
/// `field_attr` nonzero marks a field-attribute cell; such a cell
/// renders as a space and is never editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Character data in the host encoding
    pub data: u8,
    /// Field attribute byte (graphic form), 0 for data cells
    pub field_attr: u8,
    /// Extended highlighting
    pub highlight: u8,
    /// Foreground color
    pub fg: u8,
    /// Background color
    pub bg: u8,
    /// Character set: 0 = base, 1 = APL/GE symbol set
    pub charset: u8,
}

impl Cell {
    pub fn is_field_attr(&self) -> bool {
        self.field_attr != 0
    }
}

/// Character attribute context established by SA orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharContext {
    pub highlight: u8,
    pub fg: u8,
    pub bg: u8,
    pub charset: u8,
}

/// Keyboard and AID state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardState {
    /// Locked waiting for the host (set by AID transmission)
    pub locked: bool,
    /// Input-inhibited indicator (X SYSTEM), set by local rule violations
    pub inhibited: bool,
    /// Insert vs replace typing mode
    pub insert: bool,
}

impl Default for KeyboardState {
    fn default() -> Self {
        // a fresh terminal is locked until the host writes
        Self { locked: true, inhibited: false, insert: false }
    }
}

/// Buffer address encoding and decoding
///
/// Addresses on the wire are 12-bit coded (two 6-bit groups carried as
/// graphic characters) for buffers of up to 4096 positions, or 14-bit
/// binary for larger buffers. The decoder accepts both forms on large
/// screens; the 12-bit form with mode bits 00 is invalid.
pub mod addressing {
    use crate::error::ProtocolError;

    /// Encode a 6-bit group as a graphic character (figure D-1)
    fn coded(six: u8) -> u8 {
        super::graphic_attr(six)
    }

    pub fn encode_12bit(address: u16) -> (u8, u8) {
        let high = ((address >> 6) & 0x3F) as u8;
        let low = (address & 0x3F) as u8;
        (coded(high), coded(low))
    }

    pub fn encode_14bit(address: u16) -> (u8, u8) {
        (((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8)
    }

    pub fn decode_12bit(b0: u8, b1: u8) -> Result<u16, ProtocolError> {
        if b0 & 0xC0 == 0 {
            // mode bits 00 denote the 14-bit form, invalid here
            return Err(ProtocolError::BadAddress { bytes: [b0, b1] });
        }
        Ok((((b0 & 0x3F) as u16) << 6) | (b1 & 0x3F) as u16)
    }

    pub fn decode_14bit(b0: u8, b1: u8) -> u16 {
        (((b0 & 0x3F) as u16) << 8) | b1 as u16
    }

    /// Encode for a buffer of the given size
    pub fn encode(address: u16, buffer_size: usize) -> (u8, u8) {
        if buffer_size > 4096 {
            encode_14bit(address)
        } else {
            encode_12bit(address)
        }
    }

    /// Decode for a buffer of the given size, accepting both forms on
    /// large screens
    pub fn decode(b0: u8, b1: u8, buffer_size: usize) -> Result<u16, ProtocolError> {
        if buffer_size > 4096 {
            if b0 & 0xC0 == 0 {
                Ok(decode_14bit(b0, b1))
            } else {
                decode_12bit(b0, b1)
            }
        } else {
            decode_12bit(b0, b1)
        }
    }
}

/// The presentation space
#[derive(Debug)]
pub struct Display3270 {
    default_size: ScreenSize,
    alternate_size: ScreenSize,
    rows: usize,
    cols: usize,
    buffer: Vec<Cell>,
    cursor: u16,
    directory: FieldDirectory,
    keyboard: KeyboardState,
    aid: AidKey,
    alarm: bool,
    codepage: CodePage,
}

impl Display3270 {
    /// A Model 2 (24x80) display with CP037
    pub fn new() -> Self {
        Self::with_sizes(ScreenSize::Model2, ScreenSize::Model2, CodePage::Cp037)
    }

    pub fn with_sizes(default: ScreenSize, alternate: ScreenSize, codepage: CodePage) -> Self {
        let mut display = Self {
            default_size: default,
            alternate_size: alternate,
            rows: default.rows(),
            cols: default.cols(),
            buffer: vec![Cell::default(); default.buffer_size()],
            cursor: 0,
            directory: FieldDirectory::new(),
            keyboard: KeyboardState::default(),
            aid: AidKey::None,
            alarm: false,
            codepage,
        };
        display.directory.invalidate();
        display
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn buffer_size(&self) -> usize {
        self.rows * self.cols
    }

    pub fn alternate_size(&self) -> ScreenSize {
        self.alternate_size
    }

    pub fn codepage(&self) -> CodePage {
        self.codepage
    }

    /// 14-bit addressing is in effect for buffers larger than 4096
    pub fn use_14bit(&self) -> bool {
        self.buffer_size() > 4096
    }

    /// Erase/Reset: clear the buffer and select the default or
    /// alternate implicit partition size
    pub fn erase_reset(&mut self, alternate: bool) {
        let size = if alternate { self.alternate_size } else { self.default_size };
        self.rows = size.rows();
        self.cols = size.cols();
        self.buffer = vec![Cell::default(); size.buffer_size()];
        self.cursor = 0;
        self.directory.invalidate();
        debug!("erase/reset to {}x{}", self.rows, self.cols);
    }

    /// Replace both partition sizes before a session is bound
    pub fn resize(&mut self, default: ScreenSize, alternate: ScreenSize) {
        self.default_size = default;
        self.alternate_size = alternate;
        self.erase_reset(false);
    }

    /// Clear data and attributes without changing dimensions
    pub fn clear(&mut self) {
        for cell in &mut self.buffer {
            *cell = Cell::default();
        }
        self.cursor = 0;
        self.directory.invalidate();
    }

    pub fn cell(&self, addr: u16) -> &Cell {
        &self.buffer[addr as usize % self.buffer.len()]
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn set_cursor(&mut self, addr: u16) {
        self.cursor = addr % self.buffer_size() as u16;
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        let addr = self.cursor as usize;
        (addr / self.cols, addr % self.cols)
    }

    pub fn keyboard(&self) -> KeyboardState {
        self.keyboard
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard.locked
    }

    pub fn lock_keyboard(&mut self) {
        self.keyboard.locked = true;
    }

    /// Host-initiated keyboard restore: clears the lock, the inhibit
    /// indicator, and the pending AID
    pub fn unlock_keyboard(&mut self) {
        self.keyboard.locked = false;
        self.keyboard.inhibited = false;
        self.aid = AidKey::None;
    }

    pub fn set_input_inhibited(&mut self, inhibited: bool) {
        self.keyboard.inhibited = inhibited;
    }

    pub fn insert_mode(&self) -> bool {
        self.keyboard.insert
    }

    pub fn set_insert_mode(&mut self, insert: bool) {
        self.keyboard.insert = insert;
    }

    pub fn aid(&self) -> AidKey {
        self.aid
    }

    pub fn set_aid(&mut self, aid: AidKey) {
        self.aid = aid;
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn set_alarm(&mut self, alarm: bool) {
        self.alarm = alarm;
    }

    /// Write a data character, clearing any attribute at the position
    pub fn write_cell(&mut self, addr: u16, byte: u8, ctx: CharContext) {
        let size = self.buffer.len();
        let cell = &mut self.buffer[addr as usize % size];
        if cell.field_attr != 0 {
            self.directory.invalidate();
        }
        *cell = Cell {
            data: byte,
            field_attr: 0,
            highlight: ctx.highlight,
            fg: ctx.fg,
            bg: ctx.bg,
            charset: ctx.charset,
        };
    }

    /// Place a field attribute, invalidating the directory
    pub fn write_field_attr(&mut self, addr: u16, attr: u8, extended: ExtendedAttributes) {
        let size = self.buffer.len();
        let cell = &mut self.buffer[addr as usize % size];
        *cell = Cell {
            data: 0,
            field_attr: graphic_attr(attr),
            highlight: extended.highlighting.unwrap_or(0),
            fg: extended.foreground.unwrap_or(0),
            bg: extended.background.unwrap_or(0),
            charset: extended.charset.unwrap_or(0),
        };
        self.directory.invalidate();
    }

    /// Apply one MF (type, value) pair to an attribute cell
    pub fn apply_field_attr_pair(&mut self, addr: u16, attr_type: u8, value: u8) {
        let size = self.buffer.len();
        let idx = addr as usize % size;
        if self.buffer[idx].field_attr == 0 {
            return;
        }
        match attr_type {
            XA_3270 => self.buffer[idx].field_attr = graphic_attr(value),
            XA_HIGHLIGHTING => self.buffer[idx].highlight = value,
            XA_FOREGROUND => self.buffer[idx].fg = value,
            XA_BACKGROUND => self.buffer[idx].bg = value,
            XA_CHARSET => self.buffer[idx].charset = value,
            _ => {
                debug!("MF ignoring attribute type 0x{attr_type:02X}");
            }
        }
        self.directory.invalidate();
    }

    fn ensure_directory(&mut self) {
        if self.directory.is_dirty() {
            let attrs: Vec<(u16, u8, ExtendedAttributes)> = self
                .buffer
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.field_attr != 0)
                .map(|(addr, cell)| {
                    let mut ext = ExtendedAttributes::new();
                    if cell.highlight != 0 {
                        ext.highlighting = Some(cell.highlight);
                    }
                    if cell.fg != 0 {
                        ext.foreground = Some(cell.fg);
                    }
                    if cell.bg != 0 {
                        ext.background = Some(cell.bg);
                    }
                    if cell.charset != 0 {
                        ext.charset = Some(cell.charset);
                    }
                    (addr as u16, cell.field_attr & 0x3F, ext)
                })
                .collect();
            let size = self.buffer_size();
            self.directory.rebuild(&attrs, size);
        }
    }

    /// The field directory, rebuilt if stale
    pub fn fields(&mut self) -> &FieldDirectory {
        self.ensure_directory();
        &self.directory
    }

    /// The field containing `addr`; `None` on an unformatted screen
    pub fn find_field(&mut self, addr: u16) -> Option<Field> {
        self.ensure_directory();
        self.directory.containing(addr).cloned()
    }

    /// Start of the next unprotected field after `addr`
    pub fn next_unprotected(&mut self, addr: u16) -> Option<u16> {
        self.ensure_directory();
        self.directory.next_unprotected(addr)
    }

    /// Cursor target for a tab from `addr`: next unprotected field
    /// start, or position 0 when there is none
    pub fn tab_from(&mut self, addr: u16) -> u16 {
        self.next_unprotected(addr).unwrap_or(0)
    }

    /// Address of the next field-attribute cell after `addr`, wrapping
    pub fn next_attr_address(&self, addr: u16) -> Option<u16> {
        let size = self.buffer_size();
        (1..size)
            .map(|offset| (addr as usize + offset) % size)
            .find(|&a| self.buffer[a].field_attr != 0)
            .map(|a| a as u16)
    }

    /// Home: the first unprotected position on the screen
    pub fn home(&mut self) {
        self.ensure_directory();
        let target = match self.directory.unprotected().map(|f| f.start).next() {
            Some(start) => start,
            None => 0,
        };
        self.cursor = target;
    }

    /// Whether `addr` rejects input: attribute cells always do; data
    /// cells follow their field; an unformatted screen is one implicit
    /// protected field
    pub fn is_protected(&mut self, addr: u16) -> bool {
        if self.cell(addr).is_field_attr() {
            return true;
        }
        match self.find_field(addr) {
            Some(field) => field.is_protected(),
            None => true,
        }
    }

    /// Set the MDT bit on the field containing `addr`
    pub fn set_mdt(&mut self, addr: u16) {
        if let Some(field) = self.find_field(addr) {
            let attr_addr = field.attr_address as usize;
            let attr = self.buffer[attr_addr].field_attr | ATTR_MDT;
            self.buffer[attr_addr].field_attr = attr;
            self.directory.invalidate();
        }
    }

    /// Clear MDT on every field
    pub fn reset_mdt(&mut self) {
        let mut changed = false;
        for cell in &mut self.buffer {
            if cell.field_attr != 0 && cell.field_attr & ATTR_MDT != 0 {
                cell.field_attr &= !ATTR_MDT;
                changed = true;
            }
        }
        if changed {
            self.directory.invalidate();
        }
    }

    /// Null out data in [saddr, eaddr), wrapping; attributes preserved
    pub fn erase(&mut self, saddr: u16, eaddr: u16) {
        let size = self.buffer_size();
        let mut count = (eaddr as usize + size - saddr as usize) % size;
        if count == 0 {
            count = size;
        }
        for offset in 0..count {
            let addr = (saddr as usize + offset) % size;
            let cell = &mut self.buffer[addr];
            if cell.field_attr == 0 {
                *cell = Cell::default();
            }
        }
    }

    /// Clear every unprotected field in [saddr, eaddr) (whole screen
    /// when saddr == eaddr); attributes and protected content stay
    pub fn erase_input_range(&mut self, saddr: u16, eaddr: u16) {
        self.ensure_directory();
        let size = self.buffer_size();
        if !self.directory.is_formatted() {
            // no fields: the whole window is erasable
            self.erase(saddr, eaddr);
            return;
        }
        let spans: Vec<(u16, usize)> = self
            .directory
            .unprotected()
            .map(|f| (f.start, f.length))
            .collect();
        let full = saddr == eaddr;
        let window = (eaddr as usize + size - saddr as usize) % size;
        for (start, length) in spans {
            for offset in 0..length {
                let addr = (start as usize + offset) % size;
                if !full {
                    let rel = (addr + size - saddr as usize) % size;
                    if rel >= window {
                        continue;
                    }
                }
                if self.buffer[addr].field_attr == 0 {
                    self.buffer[addr] = Cell::default();
                }
            }
        }
    }

    /// Erase Input key: clear all unprotected fields, reset MDTs, home
    pub fn erase_input(&mut self) {
        self.erase_input_range(0, 0);
        self.reset_mdt();
        self.home();
    }

    /// Erase to end of field from the cursor; sets MDT
    pub fn erase_eof(&mut self) -> InputResult<()> {
        let addr = self.cursor;
        if self.cell(addr).is_field_attr() {
            self.keyboard.inhibited = true;
            return Err(InputError::ProtectedField { address: addr });
        }
        match self.find_field(addr) {
            Some(field) if !field.is_protected() => {
                let end = (field.start as usize + field.length) % self.buffer_size();
                self.erase(addr, end as u16);
                self.set_mdt(addr);
                Ok(())
            }
            _ => {
                self.keyboard.inhibited = true;
                Err(InputError::ProtectedField { address: addr })
            }
        }
    }

    /// Repeat `byte` from `saddr` up to (not including) `stop`,
    /// wrapping; equal addresses fill the whole buffer. Attribute
    /// cells in the range are overwritten.
    pub fn repeat_to(&mut self, saddr: u16, stop: u16, byte: u8, ctx: CharContext) {
        let size = self.buffer_size();
        let mut count = (stop as usize + size - saddr as usize) % size;
        if count == 0 {
            count = size;
        }
        let mut hit_attr = false;
        for offset in 0..count {
            let addr = (saddr as usize + offset) % size;
            let cell = &mut self.buffer[addr];
            hit_attr |= cell.field_attr != 0;
            *cell = Cell {
                data: byte,
                field_attr: 0,
                highlight: ctx.highlight,
                fg: ctx.fg,
                bg: ctx.bg,
                charset: ctx.charset,
            };
        }
        if hit_attr {
            self.directory.invalidate();
        }
    }

    fn numeric_allowed(byte: u8) -> bool {
        // EBCDIC digits plus period, minus, plus, and DUP
        matches!(byte, 0xF0..=0xF9 | 0x4B | 0x60 | 0x4E | DATA_DUP)
    }

    /// Type host-encoded bytes at the cursor, honoring field rules
    ///
    /// Returns the number of bytes written. Stops with an error on the
    /// first violation, leaving earlier bytes in place; every error
    /// also raises the input-inhibited indicator.
    pub fn key_data(&mut self, data: &[u8]) -> InputResult<usize> {
        if self.keyboard.locked {
            self.keyboard.inhibited = true;
            return Err(InputError::KeyboardLocked);
        }
        let size = self.buffer_size();
        let mut written = 0;
        for &byte in data {
            let addr = self.cursor;
            if self.cell(addr).is_field_attr() {
                self.keyboard.inhibited = true;
                return Err(InputError::ProtectedField { address: addr });
            }
            let field = match self.find_field(addr) {
                Some(field) if !field.is_protected() => field,
                _ => {
                    self.keyboard.inhibited = true;
                    return Err(InputError::ProtectedField { address: addr });
                }
            };
            if field.is_numeric() && !Self::numeric_allowed(byte) {
                self.keyboard.inhibited = true;
                return Err(InputError::NumericOnly {
                    ch: codec::decode_char(byte, self.codepage),
                });
            }
            if self.keyboard.insert {
                self.insert_shift(&field, addr)?;
            }
            self.buffer[addr as usize].data = byte;
            self.buffer[addr as usize].charset = 0;
            self.set_mdt(addr);
            written += 1;

            // advance, skipping the next attribute byte; autoskip
            // fields tab onward
            let mut next = (addr as usize + 1) % size;
            if self.buffer[next].field_attr != 0 {
                let next_field = self.find_field(next as u16);
                match next_field {
                    Some(f) if f.is_autoskip() => {
                        next = self.tab_from(next as u16) as usize;
                    }
                    _ => {
                        next = (next + 1) % size;
                    }
                }
            }
            self.cursor = next as u16;
        }
        Ok(written)
    }

    /// Shift field content right by one position to make room at
    /// `addr`, consuming a trailing null or blank
    fn insert_shift(&mut self, field: &Field, addr: u16) -> InputResult<()> {
        let size = self.buffer_size();
        let field_end = (field.start as usize + field.length) % size; // exclusive
        let last = (field_end + size - 1) % size;
        let tail = self.buffer[last].data;
        if tail != DATA_NUL && tail != 0x40 {
            self.keyboard.inhibited = true;
            return Err(InputError::FieldFull);
        }
        // walk backwards copying each cell one to the right
        let mut dst = last;
        loop {
            let src = (dst + size - 1) % size;
            if dst == addr as usize {
                break;
            }
            self.buffer[dst].data = self.buffer[src].data;
            self.buffer[dst].charset = self.buffer[src].charset;
            self.buffer[dst].highlight = self.buffer[src].highlight;
            self.buffer[dst].fg = self.buffer[src].fg;
            self.buffer[dst].bg = self.buffer[src].bg;
            dst = src;
        }
        Ok(())
    }

    /// Render one row as text
    pub fn row_text(&self, row: usize) -> Option<String> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        let mut out = String::with_capacity(self.cols);
        for addr in start..start + self.cols {
            out.push(self.render_char(&self.buffer[addr]));
        }
        Some(out)
    }

    /// Render the whole screen, rows joined with newlines
    pub fn screen_text(&self) -> String {
        let mut out = String::with_capacity(self.buffer_size() + self.rows);
        for row in 0..self.rows {
            if row > 0 {
                out.push('\n');
            }
            out.push_str(&self.row_text(row).unwrap_or_default());
        }
        out
    }

    /// Decode the data characters in [saddr, eaddr), wrapping
    pub fn text_range(&self, saddr: u16, eaddr: u16) -> String {
        let size = self.buffer_size();
        let mut count = (eaddr as usize + size - saddr as usize) % size;
        if count == 0 {
            count = size;
        }
        let mut out = String::with_capacity(count);
        for offset in 0..count {
            let cell = &self.buffer[(saddr as usize + offset) % size];
            out.push(self.render_char(cell));
        }
        out
    }

    fn render_char(&self, cell: &Cell) -> char {
        if cell.is_field_attr() {
            return ' ';
        }
        if cell.charset == 1 || cell.charset == 0xF1 {
            let ch = codec::decode_char(cell.data, CodePage::Cp310);
            return if ch == '\u{FFFD}' { ' ' } else { ch };
        }
        if cell.data < 0x40 {
            // nulls and embedded controls render as blanks
            return ' ';
        }
        let ch = codec::decode_char(cell.data, self.codepage);
        if ch == '\u{FFFD}' {
            ' '
        } else {
            ch
        }
    }

}

impl Default for Display3270 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Display3270 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.screen_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted_display() -> Display3270 {
        let mut display = Display3270::new();
        display.write_field_attr(0, ATTR_PROTECTED, ExtendedAttributes::default());
        display.write_field_attr(10, 0, ExtendedAttributes::default());
        display.write_field_attr(40, ATTR_PROTECTED, ExtendedAttributes::default());
        display.unlock_keyboard();
        display
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ScreenSize::Model2.buffer_size(), 1920);
        assert_eq!(ScreenSize::Model4.buffer_size(), 3440);
        assert_eq!(ScreenSize::Model5.buffer_size(), 3564);
        assert_eq!(ScreenSize::for_dimensions(43, 80), ScreenSize::Model4);
        assert_eq!(
            ScreenSize::for_dimensions(62, 160),
            ScreenSize::Custom { rows: 62, cols: 160 }
        );
    }

    #[test]
    fn test_erase_reset_alternate() {
        let mut display =
            Display3270::with_sizes(ScreenSize::Model2, ScreenSize::Model4, CodePage::Cp037);
        assert_eq!(display.rows(), 24);
        display.erase_reset(true);
        assert_eq!(display.rows(), 43);
        assert_eq!(display.buffer_size(), 3440);
        display.erase_reset(false);
        assert_eq!(display.rows(), 24);
    }

    #[test]
    fn test_14bit_threshold() {
        let display =
            Display3270::with_sizes(ScreenSize::Model2, ScreenSize::Model2, CodePage::Cp037);
        assert!(!display.use_14bit());
        let big = ScreenSize::Custom { rows: 62, cols: 160 };
        let display = Display3270::with_sizes(big, big, CodePage::Cp037);
        assert!(display.use_14bit());
    }

    #[test]
    fn test_addressing_round_trip() {
        for addr in [0u16, 1, 80, 1919, 4095] {
            let (b0, b1) = addressing::encode_12bit(addr);
            assert_eq!(addressing::decode_12bit(b0, b1).unwrap(), addr);
        }
        for addr in [0u16, 4096, 9920, 16383] {
            let (b0, b1) = addressing::encode_14bit(addr);
            assert_eq!(addressing::decode_14bit(b0, b1), addr);
        }
    }

    #[test]
    fn test_12bit_mode_bits_00_invalid() {
        assert!(addressing::decode_12bit(0x00, 0x40).is_err());
        assert!(addressing::decode_12bit(0x3F, 0x00).is_err());
    }

    #[test]
    fn test_large_screen_accepts_both_forms() {
        let big = 62 * 160;
        let (b0, b1) = addressing::encode_12bit(100);
        assert_eq!(addressing::decode(b0, b1, big).unwrap(), 100);
        let (b0, b1) = addressing::encode_14bit(9000);
        assert_eq!(addressing::decode(b0, b1, big).unwrap(), 9000);
    }

    #[test]
    fn test_key_data_sets_mdt() {
        let mut display = formatted_display();
        display.set_cursor(11);
        display.key_data(&[0xC1, 0xC2]).unwrap();
        assert_eq!(display.cell(11).data, 0xC1);
        assert_eq!(display.cell(12).data, 0xC2);
        assert_eq!(display.cursor(), 13);
        let field = display.find_field(11).unwrap();
        assert!(field.is_modified());
    }

    #[test]
    fn test_key_data_protected_rejected() {
        let mut display = formatted_display();
        display.set_cursor(1); // inside protected field
        let err = display.key_data(&[0xC1]).unwrap_err();
        assert!(matches!(err, InputError::ProtectedField { .. }));
        assert!(display.keyboard().inhibited);
    }

    #[test]
    fn test_key_data_locked_rejected() {
        let mut display = formatted_display();
        display.lock_keyboard();
        display.set_cursor(11);
        assert_eq!(display.key_data(&[0xC1]), Err(InputError::KeyboardLocked));
    }

    #[test]
    fn test_key_data_unformatted_rejected() {
        let mut display = Display3270::new();
        display.unlock_keyboard();
        let err = display.key_data(&[0xC1]).unwrap_err();
        assert!(matches!(err, InputError::ProtectedField { .. }));
    }

    #[test]
    fn test_numeric_field_rules() {
        let mut display = Display3270::new();
        display.write_field_attr(0, ATTR_NUMERIC, ExtendedAttributes::default());
        display.unlock_keyboard();
        display.set_cursor(1);
        // digits, period, minus, plus accepted
        display.key_data(&[0xF1, 0x4B, 0x60, 0x4E]).unwrap();
        // a letter is not
        let err = display.key_data(&[0xC1]).unwrap_err();
        assert!(matches!(err, InputError::NumericOnly { ch: 'A' }));
    }

    #[test]
    fn test_insert_mode_shifts_right() {
        let mut display = formatted_display();
        display.set_cursor(11);
        display.key_data(&[0xC1, 0xC2]).unwrap(); // AB
        display.set_cursor(11);
        display.set_insert_mode(true);
        display.key_data(&[0xC3]).unwrap(); // insert C before AB
        assert_eq!(display.cell(11).data, 0xC3);
        assert_eq!(display.cell(12).data, 0xC1);
        assert_eq!(display.cell(13).data, 0xC2);
    }

    #[test]
    fn test_insert_mode_field_full() {
        let mut display = Display3270::new();
        display.write_field_attr(0, 0, ExtendedAttributes::default());
        display.write_field_attr(4, ATTR_PROTECTED, ExtendedAttributes::default());
        display.unlock_keyboard();
        display.set_cursor(1);
        display.key_data(&[0xC1, 0xC2, 0xC3]).unwrap(); // field is now full
        display.set_cursor(1);
        display.set_insert_mode(true);
        assert_eq!(display.key_data(&[0xC4]), Err(InputError::FieldFull));
    }

    #[test]
    fn test_autoskip_tabs_to_next_field() {
        let mut display = Display3270::new();
        display.write_field_attr(0, 0, ExtendedAttributes::default());
        // autoskip attribute right after a 2-char field
        display.write_field_attr(3, ATTR_PROTECTED | ATTR_NUMERIC, ExtendedAttributes::default());
        display.write_field_attr(20, 0, ExtendedAttributes::default());
        display.unlock_keyboard();
        display.set_cursor(1);
        display.key_data(&[0xC1, 0xC2]).unwrap();
        assert_eq!(display.cursor(), 21);
    }

    #[test]
    fn test_erase_eof() {
        let mut display = formatted_display();
        display.set_cursor(11);
        display.key_data(&[0xC1, 0xC2, 0xC3, 0xC4]).unwrap();
        display.set_cursor(13);
        display.erase_eof().unwrap();
        assert_eq!(display.cell(11).data, 0xC1);
        assert_eq!(display.cell(12).data, 0xC2);
        assert_eq!(display.cell(13).data, 0);
        assert_eq!(display.cell(14).data, 0);
    }

    #[test]
    fn test_erase_input_clears_unprotected_and_homes() {
        let mut display = formatted_display();
        display.set_cursor(11);
        display.key_data(&[0xC1, 0xC2]).unwrap();
        display.set_cursor(500);
        display.erase_input();
        assert_eq!(display.cell(11).data, 0);
        assert_eq!(display.cell(12).data, 0);
        assert_eq!(display.cursor(), 11); // first unprotected position
        assert!(display.fields().modified().next().is_none());
    }

    #[test]
    fn test_repeat_to_wraps_and_fills() {
        let mut display = Display3270::new();
        display.repeat_to(5, 8, 0x5C, CharContext::default());
        assert_eq!(display.cell(5).data, 0x5C);
        assert_eq!(display.cell(7).data, 0x5C);
        assert_eq!(display.cell(8).data, 0);
        // equal addresses fill the entire buffer
        display.repeat_to(100, 100, 0x6B, CharContext::default());
        assert_eq!(display.cell(0).data, 0x6B);
        assert_eq!(display.cell(1919).data, 0x6B);
    }

    #[test]
    fn test_screen_text_renders_attrs_as_spaces() {
        let mut display = formatted_display();
        display.set_cursor(11);
        display.key_data(&[0xC8, 0xC5, 0xD3, 0xD3, 0xD6]).unwrap(); // HELLO
        let row = display.row_text(0).unwrap();
        assert_eq!(&row[..16], "           HELLO");
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut display = Display3270::new();
        display.set_cursor(5000);
        assert!((display.cursor() as usize) < display.buffer_size());
    }

    #[test]
    fn test_resize_before_bind() {
        let mut display = Display3270::new();
        display.write_field_attr(0, 0, ExtendedAttributes::default());
        display.resize(ScreenSize::Model5, ScreenSize::Model5);
        assert_eq!((display.rows(), display.cols()), (27, 132));
        assert_eq!(display.buffer_size(), 3564);
        assert!(display.fields().fields().is_empty()); // cleared
        assert_eq!(display.cursor(), 0);
    }
}
