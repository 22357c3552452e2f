//! 3270 data-stream interpretation
//!
//! Consumes complete records from the telnet engine, dispatches on the
//! command byte, and mutates the presentation space through orders and
//! structured fields. Also builds the outbound Read Buffer / Read
//! Modified responses and the query reply.

use log::{debug, warn};

use super::codes::*;
use super::display::{addressing, CharContext, Display3270};
use super::field::Field;
use crate::error::{ProtocolError, ProtocolResult};
use crate::transfer::FileTransfer;

/// How a write command prepares the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EraseMode {
    None,
    Default,
    Alternate,
}

/// Running state while interpreting one orders-and-data stream
struct OrderState {
    /// The buffer address orders and data advance; distinct from the
    /// cursor, which only IC moves
    addr: u16,
    /// Character attribute context from SA orders
    ctx: CharContext,
    /// A data write preceded the current position, arming PT null fill
    pt_erase: bool,
}

/// Bytes that are character data rather than orders
fn is_data_byte(byte: u8) -> bool {
    byte >= 0x40 || matches!(byte, DATA_NUL | DATA_DUP | DATA_FM)
}

/// The data-stream interpreter
#[derive(Debug)]
pub struct DataStreamProcessor {
    reply_mode: u8,
    reply_cattrs: Vec<u8>,
    capable_color: bool,
    /// The IND$FILE sub-state machine, driven by DDM structured fields
    pub transfer: FileTransfer,
}

impl DataStreamProcessor {
    pub fn new() -> Self {
        Self {
            reply_mode: REPLY_MODE_FIELD,
            reply_cattrs: Vec::new(),
            capable_color: true,
            transfer: FileTransfer::new(),
        }
    }

    pub fn set_capable_color(&mut self, capable: bool) {
        self.capable_color = capable;
    }

    pub fn reply_mode(&self) -> u8 {
        self.reply_mode
    }

    /// Process one inbound 3270 record; returns the records to transmit
    pub fn process_record(
        &mut self,
        record: &[u8],
        display: &mut Display3270,
    ) -> ProtocolResult<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        let Some(&cmd_byte) = record.first() else {
            return Ok(out);
        };
        let command = CommandCode::from_u8(cmd_byte)
            .ok_or(ProtocolError::UnknownCommand { code: cmd_byte })?;
        debug!("command {command:?} (0x{cmd_byte:02X}), {} byte(s)", record.len());

        match command {
            CommandCode::Write => self.write_orders(record, display, EraseMode::None)?,
            CommandCode::EraseWrite => self.write_orders(record, display, EraseMode::Default)?,
            CommandCode::EraseWriteAlternate => {
                self.write_orders(record, display, EraseMode::Alternate)?
            }
            CommandCode::EraseAllUnprotected => {
                display.erase_input();
                display.unlock_keyboard();
            }
            CommandCode::ReadBuffer => {
                let aid = display.aid();
                out.push(self.read_buffer(display, aid));
            }
            CommandCode::ReadModified => {
                // a host may answer an upload chunk with RM to ask for
                // a resend of the last Data-For-Get
                if let Some(resend) = self.transfer.rm_resend() {
                    out.push(resend.to_vec());
                } else {
                    let aid = display.aid();
                    out.push(self.read_modified(display, aid, false));
                }
            }
            CommandCode::ReadModifiedAll => {
                let aid = display.aid();
                out.push(self.read_modified(display, aid, true));
                display.reset_mdt();
            }
            CommandCode::WriteStructuredField => {
                self.write_structured_field(record, display, &mut out)?
            }
            CommandCode::Nop => {}
        }
        Ok(out)
    }

    fn write_orders(
        &mut self,
        record: &[u8],
        display: &mut Display3270,
        erase: EraseMode,
    ) -> ProtocolResult<()> {
        if record.len() < 2 {
            // a write without a WCC carries nothing to do
            return Ok(());
        }
        let wcc = record[1];
        match erase {
            EraseMode::None => {
                // reset-MDT applies before the orders for a plain Write
                if wcc & WCC_RESET_MDT != 0 {
                    display.reset_mdt();
                }
            }
            EraseMode::Default => display.erase_reset(false),
            EraseMode::Alternate => display.erase_reset(true),
        }
        self.process_orders(&record[2..], display)?;
        self.apply_wcc(wcc, display);
        Ok(())
    }

    fn apply_wcc(&mut self, wcc: u8, display: &mut Display3270) {
        debug!("WCC 0x{wcc:02X}");
        if wcc & WCC_RESET != 0 {
            self.reply_mode = REPLY_MODE_FIELD;
            self.reply_cattrs.clear();
        }
        if wcc & WCC_START_PRINTER != 0 {
            warn!("WCC start-printer not supported");
        }
        if wcc & WCC_ALARM != 0 {
            display.set_alarm(true);
        }
        if wcc & WCC_RESTORE != 0 {
            display.unlock_keyboard();
        }
    }

    fn process_orders(&mut self, data: &[u8], display: &mut Display3270) -> ProtocolResult<()> {
        let size = display.buffer_size() as u16;
        let mut st = OrderState {
            addr: display.cursor(),
            ctx: CharContext::default(),
            pt_erase: false,
        };
        let mut pos = 0;
        while pos < data.len() {
            let byte = data[pos];
            if let Some(order) = OrderCode::from_u8(byte) {
                pos = self.process_order(order, data, pos, display, &mut st)?;
            } else if is_data_byte(byte) {
                let run_len = data[pos..]
                    .iter()
                    .position(|&b| !is_data_byte(b) || OrderCode::from_u8(b).is_some())
                    .unwrap_or(data.len() - pos);
                for &b in &data[pos..pos + run_len] {
                    display.write_cell(st.addr, b, st.ctx);
                    st.addr = (st.addr + 1) % size;
                }
                st.pt_erase = true;
                pos += run_len;
            } else {
                return Err(ProtocolError::UnknownOrder { code: byte });
            }
        }
        Ok(())
    }

    fn read_address(
        &self,
        data: &[u8],
        pos: usize,
        display: &Display3270,
        what: &'static str,
    ) -> ProtocolResult<u16> {
        if pos + 2 > data.len() {
            return Err(ProtocolError::Truncated { what });
        }
        let (b0, b1) = (data[pos], data[pos + 1]);
        let addr = addressing::decode(b0, b1, display.buffer_size())?;
        if addr as usize >= display.buffer_size() {
            return Err(ProtocolError::BadAddress { bytes: [b0, b1] });
        }
        Ok(addr)
    }

    fn process_order(
        &mut self,
        order: OrderCode,
        data: &[u8],
        pos: usize,
        display: &mut Display3270,
        st: &mut OrderState,
    ) -> ProtocolResult<usize> {
        let size = display.buffer_size() as u16;
        match order {
            OrderCode::SetBufferAddress => {
                let addr = self.read_address(data, pos + 1, display, "SBA")?;
                debug!("  SBA {addr}");
                st.addr = addr;
                st.pt_erase = false;
                Ok(pos + 3)
            }
            OrderCode::StartField => {
                let attr = *data.get(pos + 1).ok_or(ProtocolError::Truncated { what: "SF" })?;
                debug!("  SF 0x{attr:02X} @ {}", st.addr);
                display.write_field_attr(st.addr, attr, Default::default());
                st.addr = (st.addr + 1) % size;
                st.pt_erase = false;
                Ok(pos + 2)
            }
            OrderCode::StartFieldExtended => {
                let count =
                    *data.get(pos + 1).ok_or(ProtocolError::Truncated { what: "SFE" })? as usize;
                if pos + 2 + count * 2 > data.len() {
                    return Err(ProtocolError::Truncated { what: "SFE" });
                }
                let mut attr = 0u8;
                let mut ext = super::field::ExtendedAttributes::new();
                for i in 0..count {
                    let attr_type = data[pos + 2 + i * 2];
                    let value = data[pos + 3 + i * 2];
                    if attr_type == XA_3270 {
                        attr = value;
                    } else {
                        ext.apply(attr_type, value);
                    }
                }
                debug!("  SFE {count} pair(s) @ {}", st.addr);
                display.write_field_attr(st.addr, attr, ext);
                st.addr = (st.addr + 1) % size;
                st.pt_erase = false;
                Ok(pos + 2 + count * 2)
            }
            OrderCode::SetAttribute => {
                if pos + 3 > data.len() {
                    return Err(ProtocolError::Truncated { what: "SA" });
                }
                let attr_type = data[pos + 1];
                let value = data[pos + 2];
                debug!("  SA type=0x{attr_type:02X} value=0x{value:02X}");
                match attr_type {
                    XA_ALL => st.ctx = CharContext::default(),
                    XA_HIGHLIGHTING => st.ctx.highlight = value,
                    XA_FOREGROUND => st.ctx.fg = value,
                    XA_CHARSET => st.ctx.charset = value,
                    XA_BACKGROUND => st.ctx.bg = value,
                    _ => return Err(ProtocolError::BadAttributeType { attr_type }),
                }
                st.pt_erase = false;
                Ok(pos + 3)
            }
            OrderCode::ModifyField => {
                if !display.cell(st.addr).is_field_attr() {
                    return Err(ProtocolError::InvalidOrderContext { order: ORDER_MF });
                }
                let count =
                    *data.get(pos + 1).ok_or(ProtocolError::Truncated { what: "MF" })? as usize;
                if pos + 2 + count * 2 > data.len() {
                    return Err(ProtocolError::Truncated { what: "MF" });
                }
                for i in 0..count {
                    let attr_type = data[pos + 2 + i * 2];
                    let value = data[pos + 3 + i * 2];
                    display.apply_field_attr_pair(st.addr, attr_type, value);
                }
                debug!("  MF {count} pair(s) @ {}", st.addr);
                st.addr = (st.addr + 1) % size;
                st.pt_erase = false;
                Ok(pos + 2 + count * 2)
            }
            OrderCode::InsertCursor => {
                debug!("  IC @ {}", st.addr);
                display.set_cursor(st.addr);
                st.pt_erase = false;
                Ok(pos + 1)
            }
            OrderCode::ProgramTab => {
                if st.pt_erase && !display.cell(st.addr).is_field_attr() {
                    let unprotected = display
                        .find_field(st.addr)
                        .map(|f| !f.is_protected())
                        .unwrap_or(false);
                    if unprotected {
                        let stop = display.next_attr_address(st.addr).unwrap_or(0);
                        display.erase(st.addr, stop);
                    }
                }
                let target = display.tab_from(st.addr);
                debug!("  PT @ {} -> {target}", st.addr);
                st.addr = target;
                st.pt_erase = false;
                Ok(pos + 1)
            }
            OrderCode::RepeatToAddress => {
                let stop = self.read_address(data, pos + 1, display, "RA")?;
                let mut next = pos + 3;
                let mut ctx = st.ctx;
                let byte = *data.get(next).ok_or(ProtocolError::Truncated { what: "RA" })?;
                let byte = if byte == ORDER_GE {
                    next += 1;
                    ctx.charset = 1;
                    *data.get(next).ok_or(ProtocolError::Truncated { what: "RA" })?
                } else {
                    byte
                };
                next += 1;
                debug!("  RA to {stop}, 0x{byte:02X}");
                display.repeat_to(st.addr, stop, byte, ctx);
                st.addr = stop;
                st.pt_erase = false;
                Ok(next)
            }
            OrderCode::EraseUnprotectedToAddress => {
                let stop = self.read_address(data, pos + 1, display, "EUA")?;
                debug!("  EUA to {stop}");
                display.erase_input_range(st.addr, stop);
                st.addr = stop;
                st.pt_erase = false;
                Ok(pos + 3)
            }
            OrderCode::GraphicEscape => {
                let byte = *data.get(pos + 1).ok_or(ProtocolError::Truncated { what: "GE" })?;
                let mut ctx = st.ctx;
                ctx.charset = 1;
                display.write_cell(st.addr, byte, ctx);
                st.addr = (st.addr + 1) % size;
                st.pt_erase = false;
                Ok(pos + 2)
            }
        }
    }

    /// Build a Read Modified (or Read Modified All) response
    ///
    /// Short AIDs transmit the AID byte alone. An unformatted screen
    /// transmits AID and cursor only. Nulls never reach the wire.
    pub fn read_modified(&self, display: &mut Display3270, aid: AidKey, all: bool) -> Vec<u8> {
        let mut rec = vec![aid.to_u8()];
        if aid.is_short() {
            return rec;
        }
        let size = display.buffer_size();
        let (b0, b1) = addressing::encode(display.cursor(), size);
        rec.push(b0);
        rec.push(b1);

        let fields: Vec<Field> = {
            let dir = display.fields();
            if all {
                dir.unprotected().cloned().collect()
            } else {
                dir.modified().cloned().collect()
            }
        };
        for field in fields {
            rec.push(ORDER_SBA);
            let (b0, b1) = addressing::encode(field.start, size);
            rec.push(b0);
            rec.push(b1);
            for offset in 0..field.length {
                let addr = ((field.start as usize + offset) % size) as u16;
                let cell = *display.cell(addr);
                if cell.data == DATA_NUL {
                    continue;
                }
                if cell.charset == 1 || cell.charset == 0xF1 {
                    rec.push(ORDER_GE);
                }
                rec.push(cell.data);
            }
        }
        rec
    }

    /// Build a Read Buffer response: AID, cursor, then every position
    /// with SF/SFE orders at field attributes
    pub fn read_buffer(&self, display: &mut Display3270, aid: AidKey) -> Vec<u8> {
        let size = display.buffer_size();
        let mut rec = vec![aid.to_u8()];
        let (b0, b1) = addressing::encode(display.cursor(), size);
        rec.push(b0);
        rec.push(b1);

        let char_mode = self.reply_mode == REPLY_MODE_CHARACTER;
        let mut current = CharContext::default();
        for addr in 0..size {
            let cell = *display.cell(addr as u16);
            if cell.is_field_attr() {
                if self.reply_mode == REPLY_MODE_FIELD {
                    rec.push(ORDER_SF);
                    rec.push(cell.field_attr);
                } else {
                    // extended: SFE with any extended pairs plus the
                    // base attribute
                    let mut pairs: Vec<(u8, u8)> = Vec::new();
                    if cell.highlight != 0 {
                        pairs.push((XA_HIGHLIGHTING, cell.highlight));
                    }
                    if cell.fg != 0 {
                        pairs.push((XA_FOREGROUND, cell.fg));
                    }
                    if cell.charset != 0 {
                        pairs.push((XA_CHARSET, cell.charset));
                    }
                    if cell.bg != 0 {
                        pairs.push((XA_BACKGROUND, cell.bg));
                    }
                    pairs.push((XA_3270, cell.field_attr));
                    rec.push(ORDER_SFE);
                    rec.push(pairs.len() as u8);
                    for (t, v) in pairs {
                        rec.push(t);
                        rec.push(v);
                    }
                }
                continue;
            }
            if char_mode {
                let eh = if self.reply_cattrs.contains(&XA_HIGHLIGHTING) { cell.highlight } else { current.highlight };
                let fg = if self.reply_cattrs.contains(&XA_FOREGROUND) { cell.fg } else { current.fg };
                let bg = if self.reply_cattrs.contains(&XA_BACKGROUND) { cell.bg } else { current.bg };
                if eh != current.highlight {
                    rec.extend_from_slice(&[ORDER_SA, XA_HIGHLIGHTING, eh]);
                }
                if fg != current.fg {
                    rec.extend_from_slice(&[ORDER_SA, XA_FOREGROUND, fg]);
                }
                if bg != current.bg {
                    rec.extend_from_slice(&[ORDER_SA, XA_BACKGROUND, bg]);
                }
                current.highlight = eh;
                current.fg = fg;
                current.bg = bg;
            }
            if cell.charset == 1 || cell.charset == 0xF1 {
                rec.push(ORDER_GE);
            }
            rec.push(cell.data);
        }
        rec
    }

    fn write_structured_field(
        &mut self,
        record: &[u8],
        display: &mut Display3270,
        out: &mut Vec<Vec<u8>>,
    ) -> ProtocolResult<()> {
        let mut i = 1;
        while i < record.len() {
            if i + 3 > record.len() {
                return Err(ProtocolError::Truncated { what: "structured field" });
            }
            let mut sfl = u16::from_be_bytes([record[i], record[i + 1]]) as usize;
            if sfl == 0 {
                // zero length means "to end of record"
                sfl = record.len() - i;
            }
            if sfl < 3 || i + sfl > record.len() {
                return Err(ProtocolError::BadStructuredField {
                    id: record[i + 2],
                    reason: format!("bad length {sfl}"),
                });
            }
            self.process_sf(&record[i..i + sfl], display, out)?;
            i += sfl;
        }
        Ok(())
    }

    fn process_sf(
        &mut self,
        sf: &[u8],
        display: &mut Display3270,
        out: &mut Vec<Vec<u8>>,
    ) -> ProtocolResult<()> {
        let id = sf[2];
        match id {
            SFID_READ_PARTITION => {
                if sf.len() < 5 {
                    return Err(ProtocolError::Truncated { what: "read partition" });
                }
                let pid = sf[3];
                let rp_type = sf[4];
                match rp_type {
                    RP_QUERY | RP_QUERY_LIST => {
                        if pid != 0xFF {
                            return Err(ProtocolError::BadStructuredField {
                                id,
                                reason: format!("query with pid 0x{pid:02X}"),
                            });
                        }
                        debug!("read partition query");
                        out.push(self.query_reply(display));
                    }
                    RP_RMA => {
                        out.push(self.read_modified(display, AidKey::ReadPartition, true))
                    }
                    RP_RB => out.push(self.read_buffer(display, AidKey::ReadPartition)),
                    RP_RM => {
                        out.push(self.read_modified(display, AidKey::ReadPartition, false))
                    }
                    _ => {
                        return Err(ProtocolError::BadStructuredField {
                            id,
                            reason: format!("unknown read partition type 0x{rp_type:02X}"),
                        })
                    }
                }
            }
            SFID_ERASE_RESET => {
                if sf.len() < 4 {
                    return Err(ProtocolError::Truncated { what: "erase/reset" });
                }
                let alternate = sf[3] & 0x80 != 0;
                display.erase_reset(alternate);
                self.reply_mode = REPLY_MODE_FIELD;
                self.reply_cattrs.clear();
            }
            SFID_SET_REPLY_MODE => {
                if sf.len() < 5 {
                    return Err(ProtocolError::Truncated { what: "set reply mode" });
                }
                if sf[3] != 0 {
                    return Err(ProtocolError::BadStructuredField {
                        id,
                        reason: "only partition 0 is supported".into(),
                    });
                }
                let mode = sf[4];
                match mode {
                    REPLY_MODE_FIELD | REPLY_MODE_EXTENDED => {
                        self.reply_mode = mode;
                        self.reply_cattrs.clear();
                    }
                    REPLY_MODE_CHARACTER => {
                        self.reply_mode = mode;
                        self.reply_cattrs = sf[5..].to_vec();
                    }
                    _ => return Err(ProtocolError::BadReplyMode { mode }),
                }
            }
            SFID_OUTBOUND_3270DS => {
                if sf.len() < 5 {
                    return Err(ProtocolError::Truncated { what: "outbound 3270DS" });
                }
                if sf[3] != 0 {
                    return Err(ProtocolError::BadStructuredField {
                        id,
                        reason: "only partition 0 is supported".into(),
                    });
                }
                let body = &sf[4..];
                match CommandCode::from_u8(body[0]) {
                    Some(CommandCode::Write) => {
                        self.write_orders(body, display, EraseMode::None)?
                    }
                    Some(CommandCode::EraseWrite) => {
                        self.write_orders(body, display, EraseMode::Default)?
                    }
                    Some(CommandCode::EraseWriteAlternate) => {
                        self.write_orders(body, display, EraseMode::Alternate)?
                    }
                    Some(CommandCode::EraseAllUnprotected) => {
                        display.erase_input();
                        display.unlock_keyboard();
                    }
                    _ => {
                        return Err(ProtocolError::BadStructuredField {
                            id,
                            reason: format!("unknown partition command 0x{:02X}", body[0]),
                        })
                    }
                }
            }
            SFID_DDM => self.transfer.handle_sf(sf, out)?,
            SFID_CREATE_PARTITION | SFID_ACTIVATE_PARTITION => {
                if sf.len() >= 4 && sf[3] != 0 {
                    return Err(ProtocolError::BadStructuredField {
                        id,
                        reason: "only the implicit partition 0 is supported".into(),
                    });
                }
                // partition 0 already exists implicitly
                debug!("partition structured field 0x{id:02X} acknowledged as no-op");
            }
            SFID_INBOUND_3270DS => {
                return Err(ProtocolError::BadStructuredField {
                    id,
                    reason: "inbound-only structured field from host".into(),
                })
            }
            _ => {
                return Err(ProtocolError::BadStructuredField {
                    id,
                    reason: "unsupported structured field".into(),
                })
            }
        }
        Ok(())
    }

    /// The query reply: terminal capabilities advertised in response to
    /// Read Partition Query
    pub fn query_reply(&self, display: &Display3270) -> Vec<u8> {
        let mut rec = vec![AID_SF];
        let alt = display.alternate_size();
        let (limin, limout) = self.transfer.limits();

        // summary
        let mut body = vec![QR_SUMMARY, QR_SUMMARY, QR_USABLE_AREA, QR_CHARACTER_SETS];
        if self.capable_color {
            body.push(QR_COLOR);
        }
        body.extend_from_slice(&[QR_HIGHLIGHT, QR_REPLY_MODES, QR_DDM, QR_IMPLICIT_PARTITION]);
        push_query_reply(&mut rec, &body);

        // usable area: 12/14-bit addressing, cell grid in pels
        let mut body = vec![QR_USABLE_AREA, 0x01, 0x00];
        body.extend_from_slice(&(alt.cols() as u16).to_be_bytes());
        body.extend_from_slice(&(alt.rows() as u16).to_be_bytes());
        body.push(0x00); // units: inches
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&96u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&96u16.to_be_bytes());
        body.push(0x06); // cell width
        body.push(0x0C); // cell height
        push_query_reply(&mut rec, &body);

        // implicit partitions: default and alternate sizes
        let mut body = vec![QR_IMPLICIT_PARTITION, 0x00, 0x00];
        body.push(0x0B); // parameter length
        body.push(0x01); // implicit partition sizes
        body.push(0x00);
        body.extend_from_slice(&80u16.to_be_bytes());
        body.extend_from_slice(&24u16.to_be_bytes());
        body.extend_from_slice(&(alt.cols() as u16).to_be_bytes());
        body.extend_from_slice(&(alt.rows() as u16).to_be_bytes());
        push_query_reply(&mut rec, &body);

        // character sets: GE supported, base set plus the APL set
        let mut body = vec![QR_CHARACTER_SETS, 0x82, 0x00, 0x06, 0x0C];
        body.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // LOAD PS formats
        body.push(0x07); // descriptor length
        body.extend_from_slice(&[0x00, 0x00, 0x00]); // base set, LCID 0
        body.extend_from_slice(&697u16.to_be_bytes());
        body.extend_from_slice(&display.codepage().number().to_be_bytes());
        body.extend_from_slice(&[0x01, 0x00, 0xF1]); // APL set, LCID F1
        body.extend_from_slice(&963u16.to_be_bytes());
        body.extend_from_slice(&310u16.to_be_bytes());
        push_query_reply(&mut rec, &body);

        // highlighting: claim everything, hosts key off blink support
        let body = vec![
            QR_HIGHLIGHT, 0x05, 0x00, 0xF0, 0xF1, 0xF1, 0xF2, 0xF2, 0xF4, 0xF4, 0xF8, 0xF8,
        ];
        push_query_reply(&mut rec, &body);

        // reply modes
        let body = vec![
            QR_REPLY_MODES,
            REPLY_MODE_FIELD,
            REPLY_MODE_EXTENDED,
            REPLY_MODE_CHARACTER,
        ];
        push_query_reply(&mut rec, &body);

        // DDM, advertising IND$FILE capability
        let mut body = vec![QR_DDM, 0x00, 0x00];
        body.extend_from_slice(&limin.to_be_bytes());
        body.extend_from_slice(&limout.to_be_bytes());
        body.push(0x01); // subsets
        body.push(0x01); // DDM subset id
        push_query_reply(&mut rec, &body);

        if self.capable_color {
            let body = vec![
                QR_COLOR, 0x00, 0x08, 0x00, 0xF4, 0xF1, 0xF1, 0xF2, 0xF2, 0xF3, 0xF3, 0xF4,
                0xF4, 0xF5, 0xF5, 0xF6, 0xF6, 0xF7, 0xF7,
            ];
            push_query_reply(&mut rec, &body);
        }

        rec
    }
}

impl Default for DataStreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Append one query reply structured field: length, 0x81, body
fn push_query_reply(rec: &mut Vec<u8>, body: &[u8]) {
    rec.extend_from_slice(&((body.len() + 3) as u16).to_be_bytes());
    rec.push(SFID_QUERY_REPLY);
    rec.extend_from_slice(body);
}
