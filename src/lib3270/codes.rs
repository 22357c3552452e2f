//! 3270 protocol constants and codes
//!
//! Command codes, order codes, AID keys, WCC bits, field attribute bits,
//! structured field ids, query reply codes, and the DDM (IND$FILE)
//! function codes, per the 3270 Data Stream Programmer's Reference
//! (GA23-0059) and RFC 2355.

/// 3270 command codes
///
/// Hosts use either the SNA encoding or the local-channel encoding for
/// the same command; both are accepted on input.
pub const CMD_W: u8 = 0xF1; // Write
pub const CMD_EW: u8 = 0xF5; // Erase/Write
pub const CMD_EWA: u8 = 0x7E; // Erase/Write Alternate
pub const CMD_RB: u8 = 0xF2; // Read Buffer
pub const CMD_RM: u8 = 0xF6; // Read Modified
pub const CMD_RMA: u8 = 0x6E; // Read Modified All
pub const CMD_EAU: u8 = 0x6F; // Erase All Unprotected
pub const CMD_WSF: u8 = 0xF3; // Write Structured Field

// Local-channel command encodings
pub const CMD_W_LOCAL: u8 = 0x01;
pub const CMD_EW_LOCAL: u8 = 0x05;
pub const CMD_EWA_LOCAL: u8 = 0x0D;
pub const CMD_RB_LOCAL: u8 = 0x02;
pub const CMD_RM_LOCAL: u8 = 0x06;
pub const CMD_RMA_LOCAL: u8 = 0x0E;
pub const CMD_EAU_LOCAL: u8 = 0x0F;
pub const CMD_WSF_LOCAL: u8 = 0x11;
pub const CMD_NOP: u8 = 0x03;

/// 3270 order codes
pub const ORDER_PT: u8 = 0x05; // Program Tab
pub const ORDER_GE: u8 = 0x08; // Graphic Escape
pub const ORDER_SBA: u8 = 0x11; // Set Buffer Address
pub const ORDER_EUA: u8 = 0x12; // Erase Unprotected to Address
pub const ORDER_IC: u8 = 0x13; // Insert Cursor
pub const ORDER_SF: u8 = 0x1D; // Start Field
pub const ORDER_SA: u8 = 0x28; // Set Attribute
pub const ORDER_SFE: u8 = 0x29; // Start Field Extended
pub const ORDER_MF: u8 = 0x2C; // Modify Field
pub const ORDER_RA: u8 = 0x3C; // Repeat to Address

/// Data-character controls that are legal inside data runs
pub const DATA_NUL: u8 = 0x00;
pub const DATA_DUP: u8 = 0x1C;
pub const DATA_FM: u8 = 0x1E;

/// Write Control Character bits
pub const WCC_RESET: u8 = 0x40; // reset partition / reply mode
pub const WCC_START_PRINTER: u8 = 0x08;
pub const WCC_ALARM: u8 = 0x04; // sound alarm
pub const WCC_RESTORE: u8 = 0x02; // keyboard restore (unlock)
pub const WCC_RESET_MDT: u8 = 0x01; // reset MDT bits

/// AID (Attention Identifier) values
pub const AID_NONE: u8 = 0x60;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;
pub const AID_SF: u8 = 0x88; // structured field reply
pub const AID_READ_PARTITION: u8 = 0x61;
pub const AID_SYSREQ: u8 = 0xF0;

pub const AID_PF1: u8 = 0xF1;
pub const AID_PF2: u8 = 0xF2;
pub const AID_PF3: u8 = 0xF3;
pub const AID_PF4: u8 = 0xF4;
pub const AID_PF5: u8 = 0xF5;
pub const AID_PF6: u8 = 0xF6;
pub const AID_PF7: u8 = 0xF7;
pub const AID_PF8: u8 = 0xF8;
pub const AID_PF9: u8 = 0xF9;
pub const AID_PF10: u8 = 0x7A;
pub const AID_PF11: u8 = 0x7B;
pub const AID_PF12: u8 = 0x7C;
pub const AID_PF13: u8 = 0xC1;
pub const AID_PF14: u8 = 0xC2;
pub const AID_PF15: u8 = 0xC3;
pub const AID_PF16: u8 = 0xC4;
pub const AID_PF17: u8 = 0xC5;
pub const AID_PF18: u8 = 0xC6;
pub const AID_PF19: u8 = 0xC7;
pub const AID_PF20: u8 = 0xC8;
pub const AID_PF21: u8 = 0xC9;
pub const AID_PF22: u8 = 0x4A;
pub const AID_PF23: u8 = 0x4B;
pub const AID_PF24: u8 = 0x4C;

/// Field attribute bits (SF order operand)
pub const ATTR_PROTECTED: u8 = 0x20;
pub const ATTR_NUMERIC: u8 = 0x10;
pub const ATTR_DISPLAY: u8 = 0x0C; // display/pen-detect bits
pub const ATTR_MDT: u8 = 0x01; // Modified Data Tag

/// Display attribute values (bits 2-3 of a field attribute)
pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_NORMAL_DETECTABLE: u8 = 0x04;
pub const DISPLAY_INTENSIFIED: u8 = 0x08; // intensified, pen-detectable
pub const DISPLAY_HIDDEN: u8 = 0x0C; // non-display, non-detectable

/// Extended attribute types (SFE/MF/SA operands)
pub const XA_ALL: u8 = 0x00; // reset all character attributes
pub const XA_3270: u8 = 0xC0; // basic 3270 field attribute
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;

/// Structured field ids (WSF command body)
pub const SFID_READ_PARTITION: u8 = 0x01;
pub const SFID_ERASE_RESET: u8 = 0x03;
pub const SFID_SET_REPLY_MODE: u8 = 0x09;
pub const SFID_CREATE_PARTITION: u8 = 0x0C;
pub const SFID_ACTIVATE_PARTITION: u8 = 0x0E;
pub const SFID_OUTBOUND_3270DS: u8 = 0x40;
pub const SFID_INBOUND_3270DS: u8 = 0x41;
pub const SFID_QUERY_REPLY: u8 = 0x81;
pub const SFID_DDM: u8 = 0xD0;

/// Read Partition operation types
pub const RP_QUERY: u8 = 0x02;
pub const RP_QUERY_LIST: u8 = 0x03;
pub const RP_RMA: u8 = 0x6E;
pub const RP_RB: u8 = 0xF2;
pub const RP_RM: u8 = 0xF6;

/// Query reply codes
pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_CHARACTER_SETS: u8 = 0x85;
pub const QR_COLOR: u8 = 0x86;
pub const QR_HIGHLIGHT: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_DDM: u8 = 0x95;
pub const QR_IMPLICIT_PARTITION: u8 = 0xA6;

/// Reply modes (Set Reply Mode operand)
pub const REPLY_MODE_FIELD: u8 = 0x00;
pub const REPLY_MODE_EXTENDED: u8 = 0x01;
pub const REPLY_MODE_CHARACTER: u8 = 0x02;

/// DDM (IND$FILE) function codes: bytes 2-4 of the D0 structured field
pub const DDM_OPEN: [u8; 3] = [0xD0, 0x00, 0x12];
pub const DDM_OPEN_ACK: [u8; 3] = [0xD0, 0x00, 0x09];
pub const DDM_OPEN_ERROR: [u8; 3] = [0xD0, 0x00, 0x08];
pub const DDM_CLOSE: [u8; 3] = [0xD0, 0x41, 0x12];
pub const DDM_CLOSE_ACK: [u8; 3] = [0xD0, 0x41, 0x09];
pub const DDM_SET_CURSOR: [u8; 3] = [0xD0, 0x45, 0x11];
pub const DDM_SET_CURSOR_ERROR: [u8; 3] = [0xD0, 0x45, 0x08];
pub const DDM_GET: [u8; 3] = [0xD0, 0x46, 0x11];
pub const DDM_DATA_FOR_GET: [u8; 3] = [0xD0, 0x46, 0x05];
pub const DDM_GET_ERROR: [u8; 3] = [0xD0, 0x46, 0x08];
pub const DDM_INSERT: [u8; 3] = [0xD0, 0x47, 0x11];
pub const DDM_DATA_TO_INSERT: [u8; 3] = [0xD0, 0x47, 0x04];
pub const DDM_INSERT_ACK: [u8; 3] = [0xD0, 0x47, 0x05];
pub const DDM_INSERT_ERROR: [u8; 3] = [0xD0, 0x47, 0x08];

/// 3270 command codes as a typed enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
    Nop,
}

impl CommandCode {
    /// Decode a command byte, accepting both the SNA and local encodings
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_W | CMD_W_LOCAL => Some(Self::Write),
            CMD_EW | CMD_EW_LOCAL => Some(Self::EraseWrite),
            CMD_EWA | CMD_EWA_LOCAL => Some(Self::EraseWriteAlternate),
            CMD_RB | CMD_RB_LOCAL => Some(Self::ReadBuffer),
            CMD_RM | CMD_RM_LOCAL => Some(Self::ReadModified),
            CMD_RMA | CMD_RMA_LOCAL => Some(Self::ReadModifiedAll),
            CMD_EAU | CMD_EAU_LOCAL => Some(Self::EraseAllUnprotected),
            CMD_WSF | CMD_WSF_LOCAL => Some(Self::WriteStructuredField),
            CMD_NOP => Some(Self::Nop),
            _ => None,
        }
    }

    /// SNA encoding of this command
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_W,
            Self::EraseWrite => CMD_EW,
            Self::EraseWriteAlternate => CMD_EWA,
            Self::ReadBuffer => CMD_RB,
            Self::ReadModified => CMD_RM,
            Self::ReadModifiedAll => CMD_RMA,
            Self::EraseAllUnprotected => CMD_EAU,
            Self::WriteStructuredField => CMD_WSF,
            Self::Nop => CMD_NOP,
        }
    }
}

/// 3270 order codes as a typed enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    ProgramTab,
    GraphicEscape,
    SetBufferAddress,
    EraseUnprotectedToAddress,
    InsertCursor,
    StartField,
    SetAttribute,
    StartFieldExtended,
    ModifyField,
    RepeatToAddress,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_GE => Some(Self::GraphicEscape),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_SF => Some(Self::StartField),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_RA => Some(Self::RepeatToAddress),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::ProgramTab => ORDER_PT,
            Self::GraphicEscape => ORDER_GE,
            Self::SetBufferAddress => ORDER_SBA,
            Self::EraseUnprotectedToAddress => ORDER_EUA,
            Self::InsertCursor => ORDER_IC,
            Self::StartField => ORDER_SF,
            Self::SetAttribute => ORDER_SA,
            Self::StartFieldExtended => ORDER_SFE,
            Self::ModifyField => ORDER_MF,
            Self::RepeatToAddress => ORDER_RA,
        }
    }
}

/// AID keys as a typed enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    None,
    Enter,
    Clear,
    Pa1,
    Pa2,
    Pa3,
    Pf(u8), // 1-24
    SysReq,
    StructuredField,
    ReadPartition,
}

impl AidKey {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            AID_NONE => Some(Self::None),
            AID_ENTER => Some(Self::Enter),
            AID_CLEAR => Some(Self::Clear),
            AID_PA1 => Some(Self::Pa1),
            AID_PA2 => Some(Self::Pa2),
            AID_PA3 => Some(Self::Pa3),
            AID_SYSREQ => Some(Self::SysReq),
            AID_SF => Some(Self::StructuredField),
            AID_READ_PARTITION => Some(Self::ReadPartition),
            AID_PF1..=AID_PF9 => Some(Self::Pf(value - AID_PF1 + 1)),
            AID_PF10 => Some(Self::Pf(10)),
            AID_PF11 => Some(Self::Pf(11)),
            AID_PF12 => Some(Self::Pf(12)),
            AID_PF13..=AID_PF21 => Some(Self::Pf(value - AID_PF13 + 13)),
            AID_PF22 => Some(Self::Pf(22)),
            AID_PF23 => Some(Self::Pf(23)),
            AID_PF24 => Some(Self::Pf(24)),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => AID_NONE,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::Pa1 => AID_PA1,
            Self::Pa2 => AID_PA2,
            Self::Pa3 => AID_PA3,
            Self::SysReq => AID_SYSREQ,
            Self::StructuredField => AID_SF,
            Self::ReadPartition => AID_READ_PARTITION,
            Self::Pf(n @ 1..=9) => AID_PF1 + n - 1,
            Self::Pf(10) => AID_PF10,
            Self::Pf(11) => AID_PF11,
            Self::Pf(12) => AID_PF12,
            Self::Pf(n @ 13..=21) => AID_PF13 + n - 13,
            Self::Pf(22) => AID_PF22,
            Self::Pf(23) => AID_PF23,
            Self::Pf(24) => AID_PF24,
            Self::Pf(_) => AID_NONE,
        }
    }

    /// Short-read AIDs transmit the AID byte alone: no cursor address,
    /// no field data.
    pub fn is_short(self) -> bool {
        matches!(self, Self::Clear | Self::Pa1 | Self::Pa2 | Self::Pa3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_both_encodings() {
        assert_eq!(CommandCode::from_u8(CMD_W), Some(CommandCode::Write));
        assert_eq!(CommandCode::from_u8(CMD_W_LOCAL), Some(CommandCode::Write));
        assert_eq!(CommandCode::from_u8(CMD_EWA), Some(CommandCode::EraseWriteAlternate));
        assert_eq!(CommandCode::from_u8(0x04), None);
    }

    #[test]
    fn test_order_code_round_trip() {
        for code in [
            ORDER_PT, ORDER_GE, ORDER_SBA, ORDER_EUA, ORDER_IC, ORDER_SF, ORDER_SA,
            ORDER_SFE, ORDER_MF, ORDER_RA,
        ] {
            let order = OrderCode::from_u8(code).unwrap();
            assert_eq!(order.to_u8(), code);
        }
        assert_eq!(OrderCode::from_u8(0x3B), None);
    }

    #[test]
    fn test_aid_pf_keys() {
        assert_eq!(AidKey::from_u8(AID_PF1), Some(AidKey::Pf(1)));
        assert_eq!(AidKey::from_u8(AID_PF10), Some(AidKey::Pf(10)));
        assert_eq!(AidKey::from_u8(AID_PF24), Some(AidKey::Pf(24)));
        for n in 1..=24u8 {
            let aid = AidKey::Pf(n);
            assert_eq!(AidKey::from_u8(aid.to_u8()), Some(aid));
        }
    }

    #[test]
    fn test_short_read_aids() {
        assert!(AidKey::Clear.is_short());
        assert!(AidKey::Pa1.is_short());
        assert!(AidKey::Pa3.is_short());
        assert!(!AidKey::Enter.is_short());
        assert!(!AidKey::Pf(1).is_short());
    }

    #[test]
    fn test_enter_value() {
        assert_eq!(AidKey::Enter.to_u8(), 0x7D);
    }
}
