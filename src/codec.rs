//! EBCDIC code page translation
//!
//! Bidirectional translation between host EBCDIC code pages and Unicode.
//! Decoding is total: bytes without a mapping become U+FFFD. Encoding is
//! fallible unless a substitution byte is supplied.
//!
//! Three code pages are provided: CP037 (US/Canada), CP1047 (Open
//! Systems, used by most z/OS hosts), and CP310 (the APL graphic symbol
//! set selected by the Graphic Escape order).

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::EncodeError;

/// A named EBCDIC code page
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CodePage {
    /// EBCDIC US/Canada
    Cp037,
    /// EBCDIC Open Systems (Latin-1 repertoire, z/OS default)
    Cp1047,
    /// APL graphic symbols (3278T display), reached via Graphic Escape
    Cp310,
}

impl CodePage {
    /// Parse a code page from its conventional name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cp037" | "037" => Some(Self::Cp037),
            "cp1047" | "1047" => Some(Self::Cp1047),
            "cp310" | "310" => Some(Self::Cp310),
            _ => None,
        }
    }

    /// Conventional name of this code page
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cp037 => "cp037",
            Self::Cp1047 => "cp1047",
            Self::Cp310 => "cp310",
        }
    }

    /// IBM code page number, as advertised in the Character Sets query reply
    pub fn number(&self) -> u16 {
        match self {
            Self::Cp037 => 37,
            Self::Cp1047 => 1047,
            Self::Cp310 => 310,
        }
    }

    fn reverse(&self) -> &'static HashMap<char, u8> {
        static REV_037: OnceLock<HashMap<char, u8>> = OnceLock::new();
        static REV_1047: OnceLock<HashMap<char, u8>> = OnceLock::new();
        static REV_310: OnceLock<HashMap<char, u8>> = OnceLock::new();

        let cell = match self {
            Self::Cp037 => &REV_037,
            Self::Cp1047 => &REV_1047,
            Self::Cp310 => &REV_310,
        };
        let page = *self;
        cell.get_or_init(|| {
            let mut map = HashMap::with_capacity(256);
            for byte in 0..=255u8 {
                let ch = decode_char(byte, page);
                if ch != '\u{FFFD}' {
                    // first mapping wins where a char appears twice
                    map.entry(ch).or_insert(byte);
                }
            }
            map
        })
    }
}

/// Decode a single host byte to a Unicode scalar
///
/// Total: unmapped bytes decode to U+FFFD.
pub fn decode_char(byte: u8, page: CodePage) -> char {
    match page {
        CodePage::Cp037 => CP037[byte as usize],
        CodePage::Cp1047 => cp1047_char(byte),
        CodePage::Cp310 => CP310[byte as usize],
    }
}

/// Decode a host byte string to text
pub fn decode(bytes: &[u8], page: CodePage) -> String {
    bytes.iter().map(|&b| decode_char(b, page)).collect()
}

/// Encode a single character, if the code page maps it
pub fn encode_char(ch: char, page: CodePage) -> Option<u8> {
    page.reverse().get(&ch).copied()
}

/// Encode text to host bytes
///
/// Fails on the first character the code page cannot represent.
pub fn encode(text: &str, page: CodePage) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match encode_char(ch, page) {
            Some(b) => out.push(b),
            None => return Err(EncodeError { ch, codepage: page.name() }),
        }
    }
    Ok(out)
}

/// Encode text to host bytes, substituting a configured byte for
/// unmappable characters
pub fn encode_lossy(text: &str, page: CodePage, substitute: u8) -> Vec<u8> {
    text.chars()
        .map(|ch| encode_char(ch, page).unwrap_or(substitute))
        .collect()
}

/// CP1047 is CP037 with four swapped cell pairs: LF/NEL and the
/// bracket, caret, and diaeresis positions.
fn cp1047_char(byte: u8) -> char {
    match byte {
        0x15 => '\n',
        0x25 => '\u{0085}',
        0x5F => '^',
        0xB0 => '\u{00AC}',
        0xAD => '[',
        0xBA => '\u{00DD}',
        0xBB => '\u{00A8}',
        0xBD => ']',
        _ => CP037[byte as usize],
    }
}

/// EBCDIC CP037 to Unicode
///
/// Full 256-entry table per the IBM Code Page 00037 definition. The
/// 0x00-0x3F control range keeps its C0/C1 control mappings; the data
/// stream treats most of those bytes as orders before they ever reach
/// the codec.
const CP037: [char; 256] = [
    // 0x00
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    // 0x10
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    // 0x20
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    // 0x30
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    // 0x40
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    // 0x50
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    // 0x60
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    // 0x70
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    // 0x80
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    // 0x90
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    // 0xA0
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    // 0xB0
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    // 0xC0
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    // 0xD0
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    // 0xE0
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    // 0xF0
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

/// CP310 APL graphic symbols to Unicode
///
/// Per IBM Code Page 00310 (GCSGID 963). Positions with no assigned
/// graphic decode to U+FFFD.
const CP310: [char; 256] = [
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x00
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x08
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x10
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x18
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x20
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x28
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x30
    '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x38
    ' ', '\u{1D434}', '\u{1D435}', '\u{1D436}', '\u{1D437}', '\u{1D438}', '\u{1D439}', '\u{1D43A}',  // 0x40
    '\u{1D43B}', '\u{1D43C}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x48
    '\u{FFFD}', '\u{1D43D}', '\u{1D43E}', '\u{1D43F}', '\u{1D440}', '\u{1D441}', '\u{1D442}', '\u{1D443}',  // 0x50
    '\u{1D444}', '\u{1D445}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x58
    '\u{FFFD}', '\u{FFFD}', '\u{1D446}', '\u{1D447}', '\u{1D448}', '\u{1D449}', '\u{1D44A}', '\u{1D44B}',  // 0x60
    '\u{1D44C}', '\u{1D44D}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x68
    '\u{22C4}', '\u{2227}', '\u{00A8}', '\u{233B}', '\u{2378}', '\u{2377}', '\u{22A2}', '\u{22A3}',  // 0x70
    '\u{2228}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0x78
    '\u{223C}', '\u{2551}', '\u{2550}', '\u{23B8}', '\u{23B9}', '\u{2502}', '\u{FFFD}', '\u{FFFD}',  // 0x80
    '\u{FFFD}', '\u{FFFD}', '\u{2191}', '\u{2193}', '\u{2264}', '\u{2308}', '\u{230A}', '\u{2192}',  // 0x88
    '\u{2395}', '\u{258C}', '\u{2590}', '\u{2580}', '\u{2584}', '\u{2588}', '\u{FFFD}', '\u{FFFD}',  // 0x90
    '\u{FFFD}', '\u{FFFD}', '\u{2283}', '\u{2282}', '\u{2311}', '\u{25CB}', '\u{00B1}', '\u{2190}',  // 0x98
    '\u{00AF}', '\u{00B0}', '\u{2500}', '\u{2219}', '\u{2099}', '\u{FFFD}', '\u{FFFD}', '\u{FFFD}',  // 0xA0
    '\u{FFFD}', '\u{FFFD}', '\u{2229}', '\u{222A}', '\u{22A5}', '[', '\u{2265}', '\u{2218}',  // 0xA8
    '\u{237A}', '\u{2208}', '\u{2373}', '\u{2374}', '\u{2375}', '\u{FFFD}', '\u{00D7}', '\u{2216}',  // 0xB0
    '\u{00F7}', '\u{FFFD}', '\u{2207}', '\u{2206}', '\u{22A4}', ']', '\u{2260}', '\u{2502}',  // 0xB8
    '{', '\u{207D}', '\u{207A}', '\u{25A0}', '\u{2514}', '\u{250C}', '\u{251C}', '\u{2534}',  // 0xC0
    '\u{00A7}', '\u{FFFD}', '\u{2372}', '\u{2371}', '\u{2337}', '\u{233D}', '\u{2342}', '\u{2349}',  // 0xC8
    '}', '\u{207E}', '\u{207B}', '\u{253C}', '\u{2518}', '\u{2510}', '\u{2524}', '\u{252C}',  // 0xD0
    '\u{00B6}', '\u{FFFD}', '\u{2336}', '\u{01C3}', '\u{2352}', '\u{234B}', '\u{235E}', '\u{235D}',  // 0xD8
    '\u{2261}', '\u{2081}', '\u{2082}', '\u{2083}', '\u{2364}', '\u{2365}', '\u{236A}', '\u{20AC}',  // 0xE0
    '\u{FFFD}', '\u{FFFD}', '\u{233F}', '\u{2340}', '\u{2235}', '\u{2296}', '\u{2339}', '\u{2355}',  // 0xE8
    '\u{2070}', '\u{00B9}', '\u{00B2}', '\u{00B3}', '\u{2074}', '\u{2075}', '\u{2076}', '\u{2077}',  // 0xF0
    '\u{2078}', '\u{2079}', '\u{FFFD}', '\u{236B}', '\u{2359}', '\u{235F}', '\u{234E}', '\u{FFFD}',  // 0xF8
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic_letters() {
        assert_eq!(decode_char(0xC1, CodePage::Cp037), 'A');
        assert_eq!(decode_char(0x81, CodePage::Cp037), 'a');
        assert_eq!(decode_char(0xF0, CodePage::Cp037), '0');
        assert_eq!(decode_char(0x40, CodePage::Cp037), ' ');
    }

    #[test]
    fn test_encode_basic_letters() {
        assert_eq!(encode_char('A', CodePage::Cp037), Some(0xC1));
        assert_eq!(encode_char('a', CodePage::Cp037), Some(0x81));
        assert_eq!(encode_char('0', CodePage::Cp037), Some(0xF0));
    }

    #[test]
    fn test_round_trip_printable() {
        let text = "HELLO world 0123456789 .<(+|&!$*);-/,%_>?`:#@'=\"";
        let bytes = encode(text, CodePage::Cp037).unwrap();
        assert_eq!(decode(&bytes, CodePage::Cp037), text);
    }

    #[test]
    fn test_cp1047_differs_from_cp037() {
        // brackets live at different positions on the two pages
        assert_eq!(decode_char(0xAD, CodePage::Cp1047), '[');
        assert_eq!(decode_char(0xBD, CodePage::Cp1047), ']');
        assert_eq!(decode_char(0xBA, CodePage::Cp037), '[');
        assert_eq!(decode_char(0xBB, CodePage::Cp037), ']');
        assert_eq!(encode_char('[', CodePage::Cp1047), Some(0xAD));
        assert_eq!(encode_char('[', CodePage::Cp037), Some(0xBA));
    }

    #[test]
    fn test_cp310_apl_symbols() {
        // CP310 is a distinct graphic set, not a CP037 variant
        assert_eq!(decode_char(0xB0, CodePage::Cp310), '\u{237A}'); // APL alpha
        assert_eq!(decode_char(0x70, CodePage::Cp310), '\u{22C4}'); // diamond
        assert_ne!(
            decode_char(0xB0, CodePage::Cp310),
            decode_char(0xB0, CodePage::Cp037)
        );
    }

    #[test]
    fn test_decode_is_total() {
        // every byte decodes on every page, unmapped -> U+FFFD
        for b in 0..=255u8 {
            let _ = decode_char(b, CodePage::Cp310);
        }
        assert_eq!(decode_char(0x00, CodePage::Cp310), '\u{FFFD}');
    }

    #[test]
    fn test_encode_unmappable_fails() {
        let err = encode("\u{30A2}", CodePage::Cp037).unwrap_err();
        assert_eq!(err.ch, '\u{30A2}');
        assert_eq!(err.codepage, "cp037");
    }

    #[test]
    fn test_encode_lossy_substitutes() {
        let bytes = encode_lossy("A\u{30A2}B", CodePage::Cp037, 0x6F);
        assert_eq!(bytes, vec![0xC1, 0x6F, 0xC2]);
    }

    #[test]
    fn test_code_page_names() {
        assert_eq!(CodePage::from_name("cp1047"), Some(CodePage::Cp1047));
        assert_eq!(CodePage::from_name("310"), Some(CodePage::Cp310));
        assert_eq!(CodePage::from_name("cp500"), None);
        assert_eq!(CodePage::Cp037.number(), 37);
    }
}
