//! IND$FILE transfer integration tests
//!
//! Drives the DDM flows the way a host does: through WSF records into
//! the data-stream processor, checking the replies that would go back
//! on the wire.

use tn3270r::codec::CodePage;
use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::display::{Display3270, ScreenSize};
use tn3270r::lib3270::protocol::DataStreamProcessor;
use tn3270r::transfer::FileTransferState;

fn display() -> Display3270 {
    Display3270::with_sizes(ScreenSize::Model2, ScreenSize::Model2, CodePage::Cp1047)
}

fn length_prefixed(body: Vec<u8>) -> Vec<u8> {
    let mut out = ((body.len() + 2) as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&body);
    out
}

fn wsf(sfs: &[Vec<u8>]) -> Vec<u8> {
    let mut rec = vec![CMD_WSF];
    for sf in sfs {
        rec.extend_from_slice(sf);
    }
    rec
}

fn ddm_open(upload: bool, name: &[u8; 7]) -> Vec<u8> {
    let mut body = vec![0u8; 33];
    body[0..3].copy_from_slice(&DDM_OPEN);
    body[12] = if upload { 1 } else { 0 };
    body[24] = 0x03;
    body[26..33].copy_from_slice(name);
    length_prefixed(body)
}

fn ddm_insert(data: &[u8]) -> Vec<u8> {
    let mut body = DDM_DATA_TO_INSERT.to_vec();
    body.extend_from_slice(&[0xC0, 0x80, 0x61]);
    body.extend_from_slice(&((data.len() + 5) as u16).to_be_bytes());
    body.extend_from_slice(data);
    length_prefixed(body)
}

#[test]
fn query_reply_advertises_ddm() {
    let proc = DataStreamProcessor::new();
    let disp = display();
    let reply = proc.query_reply(&disp);
    // the DDM query reply is present, so IND$FILE is offered
    let mut found = false;
    let mut i = 1;
    while i < reply.len() {
        let len = u16::from_be_bytes([reply[i], reply[i + 1]]) as usize;
        if reply[i + 3] == QR_DDM {
            found = true;
        }
        i += len;
    }
    assert!(found);
}

#[test]
fn host_download_through_wsf() {
    let mut proc = DataStreamProcessor::new();
    let mut disp = display();

    // read partition query precedes a transfer
    let query = length_prefixed(vec![SFID_READ_PARTITION, 0xFF, RP_QUERY]);
    let out = proc.process_record(&wsf(&[query]), &mut disp).unwrap();
    assert_eq!(out.len(), 1);

    // open for download
    let out = proc
        .process_record(&wsf(&[ddm_open(false, b"FT:DATA")]), &mut disp)
        .unwrap();
    assert_eq!(&out[0][3..6], &DDM_OPEN_ACK);
    assert_eq!(proc.transfer.state(), FileTransferState::InProgress);

    // two data buffers in one WSF record
    let out = proc
        .process_record(
            &wsf(&[ddm_insert(b"first "), ddm_insert(b"second")]),
            &mut disp,
        )
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(&out[0][3..6], &DDM_INSERT_ACK);
    assert_eq!(&out[1][3..6], &DDM_INSERT_ACK);

    // close, then the message phase
    let close = length_prefixed(DDM_CLOSE.to_vec());
    let out = proc.process_record(&wsf(&[close]), &mut disp).unwrap();
    assert_eq!(&out[0][3..6], &DDM_CLOSE_ACK);

    proc.process_record(&wsf(&[ddm_open(false, b"FT:MSG ")]), &mut disp)
        .unwrap();
    proc.process_record(&wsf(&[ddm_insert(b"TRANS03   complete")]), &mut disp)
        .unwrap();

    assert_eq!(proc.transfer.state(), FileTransferState::DownloadsAvailable);
    assert_eq!(proc.transfer.take_download().unwrap(), b"first second");
    assert_eq!(proc.transfer.state(), FileTransferState::Idle);
}

#[test]
fn host_upload_through_wsf() {
    let mut proc = DataStreamProcessor::new();
    let mut disp = display();
    assert!(proc.transfer.begin_upload(b"DATA TO PUT".to_vec()).is_none());

    proc.process_record(&wsf(&[ddm_open(true, b"FT:DATA")]), &mut disp)
        .unwrap();

    // set cursor + get -> one data-for-get record
    let set_cursor = length_prefixed(DDM_SET_CURSOR.to_vec());
    let get = length_prefixed(DDM_GET.to_vec());
    let out = proc
        .process_record(&wsf(&[set_cursor, get.clone()]), &mut disp)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(&out[0][3..6], &DDM_DATA_FOR_GET);
    assert!(out[0].ends_with(b"DATA TO PUT"));

    // host lost the buffer and answers with RM: same record resent
    let resend = proc.process_record(&[CMD_RM], &mut disp).unwrap();
    assert_eq!(resend[0], out[0]);

    // next get runs past end of file
    let out = proc.process_record(&wsf(&[get]), &mut disp).unwrap();
    assert_eq!(&out[0][3..6], &DDM_GET_ERROR);

    // message phase closes out
    proc.process_record(&wsf(&[ddm_open(true, b"FT:MSG ")]), &mut disp)
        .unwrap();
    proc.process_record(&wsf(&[ddm_insert(b"TRANS03")]), &mut disp)
        .unwrap();
    assert_eq!(proc.transfer.state(), FileTransferState::Idle);
    assert_eq!(proc.transfer.completion_message().unwrap(), b"TRANS03");
}

#[test]
fn rm_after_upload_finishes_reads_screen_again() {
    let mut proc = DataStreamProcessor::new();
    let mut disp = display();
    // with no transfer in progress, RM is an ordinary read
    disp.set_aid(tn3270r::AidKey::Enter);
    let out = proc.process_record(&[CMD_RM], &mut disp).unwrap();
    assert_eq!(out[0][0], AID_ENTER);
}

#[test]
fn unexpected_ddm_get_draws_error_reply() {
    let mut proc = DataStreamProcessor::new();
    let mut disp = display();
    let get = length_prefixed(DDM_GET.to_vec());
    let out = proc.process_record(&wsf(&[get]), &mut disp).unwrap();
    assert_eq!(&out[0][3..6], &DDM_GET_ERROR);
}
