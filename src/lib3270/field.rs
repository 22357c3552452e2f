//! Field attributes and the derived field directory
//!
//! A field starts at the position immediately following its attribute
//! cell and runs to the position before the next attribute cell,
//! wrapping around the end of the buffer. The directory is a derived
//! index over the presentation space: it is rebuilt by a full scan and
//! invalidated by any write that touches an attribute cell. Cells never
//! link back to fields.

use super::codes::*;

/// Extended field attributes (SFE/MF operands)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedAttributes {
    pub highlighting: Option<u8>,
    pub foreground: Option<u8>,
    pub background: Option<u8>,
    pub charset: Option<u8>,
    pub validation: Option<u8>,
    pub outlining: Option<u8>,
    pub transparency: Option<u8>,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one (type, value) pair; unknown types are ignored
    pub fn apply(&mut self, attr_type: u8, value: u8) {
        match attr_type {
            XA_HIGHLIGHTING => self.highlighting = Some(value),
            XA_FOREGROUND => self.foreground = Some(value),
            XA_BACKGROUND => self.background = Some(value),
            XA_CHARSET => self.charset = Some(value),
            XA_VALIDATION => self.validation = Some(value),
            XA_OUTLINING => self.outlining = Some(value),
            XA_TRANSPARENCY => self.transparency = Some(value),
            _ => {
                log::debug!("ignoring extended attribute type 0x{attr_type:02X}");
            }
        }
    }
}

/// One field in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Address of the field attribute cell
    pub attr_address: u16,
    /// First content position (attribute address + 1, wrapping)
    pub start: u16,
    /// Content length, excluding the attribute cell
    pub length: usize,
    /// The attribute byte
    pub attribute: u8,
    /// Extended attributes carried by the attribute cell
    pub extended: ExtendedAttributes,
}

impl Field {
    pub fn is_protected(&self) -> bool {
        self.attribute & ATTR_PROTECTED != 0
    }

    pub fn is_numeric(&self) -> bool {
        self.attribute & ATTR_NUMERIC != 0
    }

    /// Protected + numeric means the cursor skips over this field
    pub fn is_autoskip(&self) -> bool {
        self.is_protected() && self.is_numeric()
    }

    pub fn is_intensified(&self) -> bool {
        self.attribute & ATTR_DISPLAY == DISPLAY_INTENSIFIED
    }

    pub fn is_hidden(&self) -> bool {
        self.attribute & ATTR_DISPLAY == DISPLAY_HIDDEN
    }

    /// Selector-pen detectable: intensified or explicitly detectable
    pub fn is_detectable(&self) -> bool {
        matches!(
            self.attribute & ATTR_DISPLAY,
            DISPLAY_NORMAL_DETECTABLE | DISPLAY_INTENSIFIED
        )
    }

    pub fn is_modified(&self) -> bool {
        self.attribute & ATTR_MDT != 0
    }

    /// True when `addr` falls in this field's content range (wrapping),
    /// or on the attribute cell itself
    pub fn contains(&self, addr: u16, buffer_size: usize) -> bool {
        if addr == self.attr_address {
            return true;
        }
        let start = self.start as usize;
        let addr = addr as usize;
        let offset = (addr + buffer_size - start) % buffer_size;
        offset < self.length
    }
}

/// Attribute-byte predicates usable without a directory entry
pub fn is_protected_attr(attr: u8) -> bool {
    attr & ATTR_PROTECTED != 0
}

pub fn is_numeric_attr(attr: u8) -> bool {
    attr & ATTR_NUMERIC != 0
}

pub fn is_modified_attr(attr: u8) -> bool {
    attr & ATTR_MDT != 0
}

pub fn is_displayable_attr(attr: u8) -> bool {
    attr & ATTR_DISPLAY != DISPLAY_HIDDEN
}

/// Make an attribute byte a graphic character (figure D-1 form)
///
/// Bits 0-1 are reserved on the wire; setting them keeps every stored
/// attribute byte nonzero, which is what marks a cell as an attribute
/// cell.
pub fn graphic_attr(attr: u8) -> u8 {
    let low = attr & 0x3F;
    let cc11 = low | 0xC0;
    let cc01 = low | 0x40;
    if low == 0x30 {
        return cc11;
    }
    if low == 0x21 {
        return cc01;
    }
    if (1..10).contains(&(low & 0x0F)) {
        cc11
    } else {
        cc01
    }
}

/// The derived, ordered field directory
#[derive(Debug, Default)]
pub struct FieldDirectory {
    fields: Vec<Field>,
    dirty: bool,
}

impl FieldDirectory {
    pub fn new() -> Self {
        Self { fields: Vec::new(), dirty: false }
    }

    /// Mark the directory stale; the next access rebuilds it
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild from the attribute cells found by a buffer scan
    ///
    /// `attrs` is the ordered list of (address, attribute, extended)
    /// tuples for every attribute cell; `buffer_size` is rows*cols.
    pub fn rebuild(&mut self, attrs: &[(u16, u8, ExtendedAttributes)], buffer_size: usize) {
        self.fields.clear();
        let count = attrs.len();
        for (i, &(addr, attribute, extended)) in attrs.iter().enumerate() {
            let next_attr = attrs[(i + 1) % count].0 as usize;
            let start = (addr as usize + 1) % buffer_size;
            let length = (next_attr + buffer_size - start) % buffer_size;
            // a lone field covers everything but its own attribute cell
            let length = if count == 1 { buffer_size - 1 } else { length };
            self.fields.push(Field {
                attr_address: addr,
                start: start as u16,
                length,
                attribute,
                extended,
            });
        }
        self.dirty = false;
    }

    /// All fields, ordered by attribute address
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_formatted(&self) -> bool {
        !self.fields.is_empty()
    }

    /// The field containing `addr` (wrapping); `None` on an
    /// unformatted screen
    pub fn containing(&self, addr: u16) -> Option<&Field> {
        if self.fields.is_empty() {
            return None;
        }
        // last attribute at or before addr; wraps to the final field
        match self.fields.iter().rev().find(|f| f.attr_address <= addr) {
            Some(field) => Some(field),
            None => self.fields.last(),
        }
    }

    /// Start address of the next unprotected field strictly after
    /// `addr`, scanning cyclically
    pub fn next_unprotected(&self, addr: u16) -> Option<u16> {
        if self.fields.is_empty() {
            return None;
        }
        let after = self
            .fields
            .iter()
            .filter(|f| !f.is_protected() && f.length > 0 && f.attr_address > addr)
            .map(|f| f.start);
        let wrapped = self
            .fields
            .iter()
            .filter(|f| !f.is_protected() && f.length > 0 && f.attr_address <= addr)
            .map(|f| f.start);
        after.chain(wrapped).next()
    }

    /// Fields with the MDT bit set, in address order
    pub fn modified(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_modified())
    }

    /// Unprotected fields, in address order
    pub fn unprotected(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_protected())
    }
}
