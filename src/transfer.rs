//! IND$FILE file transfer over DDM structured fields
//!
//! DFT-mode file transfer is tunneled through WSF structured fields with
//! id 0xD0. Downloads (IND$FILE GET on the host side) arrive as
//! Data-To-Insert chunks that we acknowledge and accumulate; uploads
//! (IND$FILE PUT) are driven by host Get requests that we answer with
//! Data-For-Get chunks until end of file.
//!
//! A transfer session is bracketed by an Open for `FT:DATA` and closed
//! by a second Open for `FT:MSG` carrying the host's completion message.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::lib3270::codes::*;

/// Externally visible transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferState {
    Idle,
    InProgress,
    DownloadsAvailable,
}

/// The DDM sub-state machine
#[derive(Debug)]
pub struct FileTransfer {
    /// A DDM open is outstanding
    open: bool,
    /// Direction of the open: true when the host reads from us (PUT)
    upload: bool,
    /// Current open is FT:DATA (false for the trailing FT:MSG open)
    data_mode: bool,
    /// Record number shared by inserts and gets, reset per open
    record_number: u32,
    /// Staged upload bytes and read position
    outgoing: Option<(Vec<u8>, usize)>,
    /// Next Data-For-Get structured field, empty at end of file
    next_get_sf: Vec<u8>,
    /// Host issued a Get before the caller staged upload data
    get_pending: bool,
    /// Last Data-For-Get record, resent when the host answers with RM
    last_get_record: Option<Vec<u8>>,
    /// Download in progress
    incoming: Vec<u8>,
    /// Completed downloads, drained by `take_download`
    downloads: VecDeque<Vec<u8>>,
    /// Host completion message from the FT:MSG phase (host encoding)
    completion: Option<Vec<u8>>,
    /// Negotiated inbound/outbound structured field limits
    limin: u16,
    limout: u16,
}

impl FileTransfer {
    pub fn new() -> Self {
        Self {
            open: false,
            upload: false,
            data_mode: false,
            record_number: 0,
            outgoing: None,
            next_get_sf: Vec::new(),
            get_pending: false,
            last_get_record: None,
            incoming: Vec::new(),
            downloads: VecDeque::new(),
            completion: None,
            limin: 4096,
            limout: 4096,
        }
    }

    pub fn state(&self) -> FileTransferState {
        if self.open {
            FileTransferState::InProgress
        } else if !self.downloads.is_empty() {
            FileTransferState::DownloadsAvailable
        } else {
            FileTransferState::Idle
        }
    }

    pub fn in_progress(&self) -> bool {
        self.open
    }

    /// Limits advertised in the DDM query reply
    pub fn limits(&self) -> (u16, u16) {
        (self.limin, self.limout)
    }

    /// Stage bytes for an IND$FILE PUT
    ///
    /// May be called before or after the host opens the transfer. When
    /// a Get is already pending, the first data record is emitted
    /// immediately via the returned reply.
    pub fn begin_upload(&mut self, data: Vec<u8>) -> Option<Vec<u8>> {
        self.outgoing = Some((data, 0));
        self.next_get_sf.clear();
        if self.get_pending {
            self.get_pending = false;
            Some(self.answer_get())
        } else {
            None
        }
    }

    /// Pop the next completed download
    pub fn take_download(&mut self) -> Option<Vec<u8>> {
        self.downloads.pop_front()
    }

    /// The host's completion message, if a transfer has finished
    pub fn completion_message(&self) -> Option<&[u8]> {
        self.completion.as_deref()
    }

    /// Record to resend when the host answers an upload chunk with a
    /// Read Modified instead of the next Get
    pub fn rm_resend(&self) -> Option<&[u8]> {
        self.last_get_record.as_deref()
    }

    /// Process one DDM structured field (including its length prefix);
    /// reply records are appended to `out`
    pub fn handle_sf(&mut self, sf: &[u8], out: &mut Vec<Vec<u8>>) -> ProtocolResult<()> {
        if sf.len() < 5 {
            return Err(ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: "DDM structured field too short".into(),
            });
        }
        let code = [sf[2], sf[3], sf[4]];
        if code == DDM_OPEN {
            self.handle_open(sf, out)
        } else if code == DDM_SET_CURSOR {
            self.handle_set_cursor(out);
            Ok(())
        } else if code == DDM_GET {
            self.handle_get(out);
            Ok(())
        } else if code == DDM_INSERT {
            self.handle_insert(out);
            Ok(())
        } else if code == DDM_DATA_TO_INSERT {
            self.handle_data_to_insert(sf, out)
        } else if code == DDM_CLOSE {
            debug!("DDM close request");
            out.push(simple_reply(DDM_CLOSE_ACK));
            Ok(())
        } else {
            Err(ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: format!("unknown DDM request {:02X}{:02X}{:02X}", code[0], code[1], code[2]),
            })
        }
    }

    fn handle_open(&mut self, sf: &[u8], out: &mut Vec<Vec<u8>>) -> ProtocolResult<()> {
        if sf.len() < 35 {
            return Err(ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: format!("DDM open needs 35 bytes, got {}", sf.len()),
            });
        }
        let upload = sf[14] == 1;

        // the transfer name header is either bare or preceded by a
        // record-size header
        let ft_bytes = match sf[26] {
            0x03 => &sf[28..35],
            0x08 if sf.len() >= 41 => &sf[34..41],
            _ => {
                warn!("DDM open with unrecognized name header");
                out.push(open_failed());
                return Ok(());
            }
        };
        let data_mode = ft_bytes == b"FT:DATA";

        if upload && data_mode && self.outgoing.is_none() && !self.open {
            // a PUT needs staged data; still ack and wait for the
            // caller, matching the interactive flow
            debug!("DDM open (upload) with no staged data");
        }
        debug!(
            "DDM open: {} {}",
            if upload { "upload" } else { "download" },
            if data_mode { "FT:DATA" } else { "FT:MSG" },
        );

        out.push(simple_reply(DDM_OPEN_ACK));
        self.open = true;
        self.upload = upload;
        self.data_mode = data_mode;
        self.record_number = 0;
        self.last_get_record = None;
        if !upload && data_mode {
            self.incoming.clear();
        }
        self.next_get_sf.clear();
        Ok(())
    }

    fn handle_set_cursor(&mut self, out: &mut Vec<Vec<u8>>) {
        if !self.open || !self.upload {
            debug!("DDM set cursor outside an upload");
            out.push(error_reply(DDM_SET_CURSOR_ERROR, ERR_COMMAND_SYNTAX));
        }
    }

    fn handle_get(&mut self, out: &mut Vec<Vec<u8>>) {
        if !self.open || !self.upload {
            debug!("DDM get outside an upload");
            out.push(error_reply(DDM_GET_ERROR, ERR_COMMAND_SYNTAX));
            return;
        }
        if self.outgoing.is_none() {
            // upload data not staged yet; hold the reply
            self.get_pending = true;
            return;
        }
        out.push(self.answer_get());
    }

    fn answer_get(&mut self) -> Vec<u8> {
        if self.next_get_sf.is_empty() {
            self.build_next_get();
        }
        if self.next_get_sf.is_empty() {
            debug!("DDM get past end of file");
            self.last_get_record = None;
            error_reply(DDM_GET_ERROR, ERR_PAST_END_OF_FILE)
        } else {
            let mut rec = vec![AID_SF];
            rec.extend_from_slice(&std::mem::take(&mut self.next_get_sf));
            self.last_get_record = Some(rec.clone());
            rec
        }
    }

    fn handle_insert(&mut self, out: &mut Vec<Vec<u8>>) {
        if !self.open {
            debug!("DDM insert outside a transfer");
            out.push(error_reply(DDM_INSERT_ERROR, ERR_COMMAND_SYNTAX));
        }
    }

    fn handle_data_to_insert(&mut self, sf: &[u8], out: &mut Vec<Vec<u8>>) -> ProtocolResult<()> {
        if !self.open {
            debug!("DDM data-to-insert outside a transfer");
            out.push(error_reply(DDM_INSERT_ERROR, ERR_COMMAND_SYNTAX));
            return Ok(());
        }
        if sf.len() < 11 {
            return Err(ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: format!("DDM data-to-insert needs 11 bytes, got {}", sf.len()),
            });
        }
        // sf[5..7] compression header, sf[7] begin-data code,
        // sf[8..10] data length plus 5
        let framed_len = u16::from_be_bytes([sf[8], sf[9]]) as usize;
        if framed_len <= 5 {
            return Err(ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: "DDM data length is bad".into(),
            });
        }
        let data_len = framed_len - 5;
        let data = sf
            .get(10..10 + data_len)
            .ok_or_else(|| ProtocolError::BadStructuredField {
                id: SFID_DDM,
                reason: "DDM data length inconsistent with field".into(),
            })?;

        self.record_number += 1;
        debug!("DDM inserting {} byte(s), record {}", data.len(), self.record_number);
        out.push(insert_ack(self.record_number));

        if self.data_mode {
            self.incoming.extend_from_slice(data);
        } else {
            // the FT:MSG insert carries the completion message and
            // ends the transfer
            self.completion = Some(data.to_vec());
            self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) {
        debug!("DDM transfer finished");
        if !self.upload && !self.incoming.is_empty() {
            self.downloads.push_back(std::mem::take(&mut self.incoming));
        }
        self.open = false;
        self.upload = false;
        self.outgoing = None;
        self.next_get_sf.clear();
        self.get_pending = false;
        self.last_get_record = None;
    }

    /// Build the next Data-For-Get structured field from the staged
    /// upload bytes; leaves it empty at end of file
    fn build_next_get(&mut self) {
        let Some((data, pos)) = self.outgoing.as_mut() else {
            self.next_get_sf.clear();
            return;
        };
        // function code + record-number header + compression header +
        // begin-data code take 12 bytes; the structured-field and data
        // length prefixes take 2 each
        let max_len = self.limin.saturating_sub(16) as usize;
        let remaining = data.len() - *pos;
        let chunk_len = remaining.min(max_len);
        if chunk_len == 0 {
            self.next_get_sf.clear();
            return;
        }
        self.record_number += 1;
        let chunk = &data[*pos..*pos + chunk_len];
        *pos += chunk_len;

        let mut isf = Vec::with_capacity(chunk_len + 16);
        isf.extend_from_slice(&DDM_DATA_FOR_GET);
        isf.extend_from_slice(&[0x63, 0x06]); // record number header
        isf.extend_from_slice(&self.record_number.to_be_bytes());
        isf.extend_from_slice(&[0xC0, 0x80]); // data not compressed
        isf.push(0x61); // begin data
        isf.extend_from_slice(&((chunk_len + 5) as u16).to_be_bytes());
        isf.extend_from_slice(chunk);
        self.next_get_sf = length_prefixed(isf);
    }
}

impl Default for FileTransfer {
    fn default() -> Self {
        Self::new()
    }
}

const ERR_COMMAND_SYNTAX: [u8; 2] = [0x60, 0x00];
const ERR_PAST_END_OF_FILE: [u8; 2] = [0x22, 0x00];

fn length_prefixed(isf: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(isf.len() + 2);
    out.extend_from_slice(&((isf.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&isf);
    out
}

/// An AID_SF record holding one reply structured field with no payload
fn simple_reply(code: [u8; 3]) -> Vec<u8> {
    let mut rec = vec![AID_SF];
    rec.extend_from_slice(&length_prefixed(code.to_vec()));
    rec
}

/// An AID_SF record holding an error reply with an error-code header
fn error_reply(code: [u8; 3], error: [u8; 2]) -> Vec<u8> {
    let mut isf = code.to_vec();
    isf.extend_from_slice(&[0x69, 0x04]); // error code header
    isf.extend_from_slice(&error);
    let mut rec = vec![AID_SF];
    rec.extend_from_slice(&length_prefixed(isf));
    rec
}

fn open_failed() -> Vec<u8> {
    error_reply(DDM_OPEN_ERROR, [0x01, 0x00])
}

fn insert_ack(record_number: u32) -> Vec<u8> {
    let mut isf = DDM_INSERT_ACK.to_vec();
    isf.extend_from_slice(&[0x63, 0x06]); // record number header
    isf.extend_from_slice(&record_number.to_be_bytes());
    let mut rec = vec![AID_SF];
    rec.extend_from_slice(&length_prefixed(isf));
    rec
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a DDM open structured field with the bare name header
    fn open_sf(upload: bool, name: &[u8; 7]) -> Vec<u8> {
        let mut sf = vec![0u8; 35];
        let len = sf.len() as u16;
        sf[0..2].copy_from_slice(&len.to_be_bytes());
        sf[2..5].copy_from_slice(&DDM_OPEN);
        sf[14] = if upload { 1 } else { 0 };
        sf[26] = 0x03;
        sf[28..35].copy_from_slice(name);
        sf
    }

    fn insert_sf(data: &[u8]) -> Vec<u8> {
        let mut isf = DDM_DATA_TO_INSERT.to_vec();
        isf.extend_from_slice(&[0xC0, 0x80]);
        isf.push(0x61);
        isf.extend_from_slice(&((data.len() + 5) as u16).to_be_bytes());
        isf.extend_from_slice(data);
        length_prefixed(isf)
    }

    fn get_sf() -> Vec<u8> {
        length_prefixed(DDM_GET.to_vec())
    }

    #[test]
    fn test_download_flow() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();

        ft.handle_sf(&open_sf(false, b"FT:DATA"), &mut out).unwrap();
        assert_eq!(ft.state(), FileTransferState::InProgress);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0], AID_SF);
        assert_eq!(&out[0][3..6], &DDM_OPEN_ACK);

        out.clear();
        ft.handle_sf(&insert_sf(b"hello "), &mut out).unwrap();
        ft.handle_sf(&insert_sf(b"world"), &mut out).unwrap();
        // each chunk acknowledged with an ascending record number
        assert_eq!(out.len(), 2);
        assert_eq!(&out[1][3..6], &DDM_INSERT_ACK);
        assert_eq!(out[1][11], 2);

        out.clear();
        ft.handle_sf(&length_prefixed(DDM_CLOSE.to_vec()), &mut out).unwrap();
        assert_eq!(&out[0][3..6], &DDM_CLOSE_ACK);

        // trailing message phase completes the download
        out.clear();
        ft.handle_sf(&open_sf(false, b"FT:MSG "), &mut out).unwrap();
        ft.handle_sf(&insert_sf(b"TRANS03  complete"), &mut out).unwrap();
        assert_eq!(ft.state(), FileTransferState::DownloadsAvailable);
        assert_eq!(ft.take_download().unwrap(), b"hello world");
        assert_eq!(ft.state(), FileTransferState::Idle);
        assert_eq!(ft.completion_message().unwrap(), b"TRANS03  complete");
    }

    #[test]
    fn test_upload_flow() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();

        assert!(ft.begin_upload(b"payload bytes".to_vec()).is_none());
        ft.handle_sf(&open_sf(true, b"FT:DATA"), &mut out).unwrap();

        out.clear();
        ft.handle_sf(&length_prefixed(DDM_SET_CURSOR.to_vec()), &mut out).unwrap();
        assert!(out.is_empty()); // valid set cursor draws no reply

        ft.handle_sf(&get_sf(), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        let rec = &out[0];
        assert_eq!(rec[0], AID_SF);
        assert_eq!(&rec[3..6], &DDM_DATA_FOR_GET);
        // payload is at the tail of the data-for-get record
        assert!(rec.ends_with(b"payload bytes"));
        assert!(ft.rm_resend().is_some());

        // next get hits end of file
        out.clear();
        ft.handle_sf(&get_sf(), &mut out).unwrap();
        assert_eq!(&out[0][3..6], &DDM_GET_ERROR);
        assert!(out[0].ends_with(&ERR_PAST_END_OF_FILE));
        assert!(ft.rm_resend().is_none());

        // message phase ends the upload
        out.clear();
        ft.handle_sf(&open_sf(true, b"FT:MSG "), &mut out).unwrap();
        ft.handle_sf(&insert_sf(b"TRANS03"), &mut out).unwrap();
        assert_eq!(ft.state(), FileTransferState::Idle);
    }

    #[test]
    fn test_upload_staged_after_get() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();
        ft.handle_sf(&open_sf(true, b"FT:DATA"), &mut out).unwrap();

        out.clear();
        ft.handle_sf(&get_sf(), &mut out).unwrap();
        assert!(out.is_empty()); // held until data is staged

        let reply = ft.begin_upload(b"late".to_vec()).unwrap();
        assert_eq!(&reply[3..6], &DDM_DATA_FOR_GET);
        assert!(reply.ends_with(b"late"));
    }

    #[test]
    fn test_large_upload_chunks() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();
        let payload = vec![0xC1u8; 9000];
        ft.begin_upload(payload.clone());
        ft.handle_sf(&open_sf(true, b"FT:DATA"), &mut out).unwrap();

        let mut collected = Vec::new();
        loop {
            out.clear();
            ft.handle_sf(&get_sf(), &mut out).unwrap();
            let rec = &out[0];
            if rec[3..6] == DDM_GET_ERROR {
                break;
            }
            // data follows the 2-byte chunk length after the begin code
            let data_start = 1 + 2 + 12 + 2;
            collected.extend_from_slice(&rec[data_start..]);
        }
        assert_eq!(collected, payload);
    }

    #[test]
    fn test_get_outside_upload_is_error() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();
        ft.handle_sf(&get_sf(), &mut out).unwrap();
        assert_eq!(&out[0][3..6], &DDM_GET_ERROR);
        assert!(out[0].ends_with(&ERR_COMMAND_SYNTAX));
    }

    #[test]
    fn test_unknown_ddm_code_is_error() {
        let mut ft = FileTransfer::new();
        let mut out = Vec::new();
        let sf = length_prefixed(vec![0xD0, 0x99, 0x99]);
        assert!(ft.handle_sf(&sf, &mut out).is_err());
    }
}
