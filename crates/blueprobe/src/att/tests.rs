//! Unit tests for the ATT codec and client

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::AttClient;
use super::constants::*;
use super::dispatcher::EventCategory;
use super::error::{AttError, AttErrorCode};
use super::types::*;
use crate::l2cap::{L2capError, L2capResult, PduChannel};
use crate::uuid::Uuid;

/// Scripted channel: pops canned inbound PDUs, records outbound ones.
struct MockChannel {
    inbound: VecDeque<Vec<u8>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    mtu: u16,
}

impl MockChannel {
    fn new(inbound: Vec<Vec<u8>>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inbound: inbound.into(),
                sent: sent.clone(),
                mtu: 23,
            },
            sent,
        )
    }
}

impl PduChannel for MockChannel {
    fn send(&mut self, pdu: &[u8]) -> L2capResult<()> {
        self.sent.lock().unwrap().push(pdu.to_vec());
        Ok(())
    }

    fn recv(&mut self, _timeout: Option<Duration>) -> L2capResult<Vec<u8>> {
        self.inbound.pop_front().ok_or(L2capError::Disconnected)
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }
}

fn error_rsp(request_opcode: u8, handle: u16, code: AttErrorCode) -> Vec<u8> {
    ErrorResponse {
        request_opcode,
        handle,
        error_code: code,
    }
    .serialize()
}

#[test]
fn second_send_while_pending_is_busy_and_does_no_io() {
    let (chan, sent) = MockChannel::new(vec![]);
    let mut client = AttClient::new(chan);

    client.send_request(&ReadRequest { handle: 0x0003 }).unwrap();
    let err = client
        .send_request(&ReadRequest { handle: 0x0004 })
        .unwrap_err();

    assert!(matches!(err, AttError::ChannelBusy));
    // Only the first request reached the channel
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[test]
fn transact_pairs_request_with_response() {
    let rsp = ReadResponse {
        value: vec![0xDE, 0xAD],
    };
    let (chan, sent) = MockChannel::new(vec![rsp.serialize()]);
    let mut client = AttClient::new(chan);

    let rsp: ReadResponse = client.transact(&ReadRequest { handle: 0x0021 }).unwrap();
    assert_eq!(rsp.value, vec![0xDE, 0xAD]);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], vec![ATT_READ_REQ, 0x21, 0x00]);
}

#[test]
fn error_response_completes_request_with_protocol_error() {
    let (chan, _) = MockChannel::new(vec![error_rsp(
        ATT_READ_REQ,
        0x0021,
        AttErrorCode::ReadNotPermitted,
    )]);
    let mut client = AttClient::new(chan);

    let err = client
        .transact::<_, ReadResponse>(&ReadRequest { handle: 0x0021 })
        .unwrap_err();
    assert!(matches!(
        err,
        AttError::Protocol(AttErrorCode::ReadNotPermitted, 0x0021)
    ));

    // The pending slot is free again
    client.send_request(&ReadRequest { handle: 0x0022 }).unwrap();
}

#[test]
fn notification_during_transaction_is_dispatched_not_treated_as_response() {
    let ntf = HandleValueNotification {
        handle: 0x0010,
        value: vec![0x01],
    };
    let rsp = ReadResponse { value: vec![0x42] };
    let (chan, sent) = MockChannel::new(vec![ntf.serialize(), rsp.serialize()]);
    let mut client = AttClient::new(chan);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_handler = seen.clone();
    client.register_event_handler(
        EventCategory::Notification,
        Box::new(move |handle: u16, value: &[u8]| {
            seen_in_handler.lock().unwrap().push((handle, value.to_vec()));
        }),
    );

    let rsp: ReadResponse = client.transact(&ReadRequest { handle: 0x0021 }).unwrap();
    assert_eq!(rsp.value, vec![0x42]);
    assert_eq!(*seen.lock().unwrap(), vec![(0x0010, vec![0x01])]);

    // Notifications are never confirmed: one read request, nothing else
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[test]
fn indication_is_confirmed_exactly_once() {
    let ind = HandleValueIndication {
        handle: 0x0030,
        value: vec![0xAA, 0xBB],
    };
    let (chan, sent) = MockChannel::new(vec![ind.serialize()]);
    let mut client = AttClient::new(chan);

    let seen = Arc::new(Mutex::new(0u32));
    let seen_in_handler = seen.clone();
    client.register_event_handler(
        EventCategory::Indication,
        Box::new(move |handle: u16, value: &[u8]| {
            assert_eq!(handle, 0x0030);
            assert_eq!(value, [0xAA, 0xBB]);
            *seen_in_handler.lock().unwrap() += 1;
        }),
    );

    assert!(client.poll_events(None).unwrap());

    assert_eq!(*seen.lock().unwrap(), 1);
    let sent = sent.lock().unwrap();
    assert_eq!(*sent, vec![vec![ATT_HANDLE_VALUE_CONF]]);
}

#[test]
fn indication_without_handler_is_still_confirmed() {
    let ind = HandleValueIndication {
        handle: 0x0030,
        value: vec![0x00],
    };
    let (chan, sent) = MockChannel::new(vec![ind.serialize()]);
    let mut client = AttClient::new(chan);

    assert!(client.poll_events(None).unwrap());
    assert_eq!(*sent.lock().unwrap(), vec![vec![ATT_HANDLE_VALUE_CONF]]);
}

#[test]
fn unexpected_pdu_is_discarded_and_wait_continues() {
    // A stray find-info response arrives before the real read response
    let stray = vec![ATT_FIND_INFO_RSP, 0x01, 0x05, 0x00, 0x00, 0x2A];
    let rsp = ReadResponse { value: vec![0x01] };
    let (chan, _) = MockChannel::new(vec![stray, rsp.serialize()]);
    let mut client = AttClient::new(chan);

    let rsp: ReadResponse = client.transact(&ReadRequest { handle: 0x0021 }).unwrap();
    assert_eq!(rsp.value, vec![0x01]);
}

#[test]
fn channel_eof_poisons_the_client() {
    let (chan, sent) = MockChannel::new(vec![]);
    let mut client = AttClient::new(chan);

    let err = client
        .transact::<_, ReadResponse>(&ReadRequest { handle: 0x0021 })
        .unwrap_err();
    assert!(matches!(err, AttError::Disconnected));

    // No further I/O is attempted once the channel has failed
    let before = sent.lock().unwrap().len();
    let err = client
        .send_request(&ReadRequest { handle: 0x0022 })
        .unwrap_err();
    assert!(matches!(err, AttError::Disconnected));
    assert_eq!(sent.lock().unwrap().len(), before);
}

#[test]
fn wait_without_pending_request_is_an_error() {
    let (chan, _) = MockChannel::new(vec![]);
    let mut client = AttClient::new(chan);

    let err = client.wait_response::<ReadResponse>().unwrap_err();
    assert!(matches!(err, AttError::InvalidState));
}

// Codec tests

#[test]
fn error_response_round_trip() {
    let pdu = ErrorResponse {
        request_opcode: ATT_READ_BY_GROUP_TYPE_REQ,
        handle: 0x000B,
        error_code: AttErrorCode::AttributeNotFound,
    };
    let bytes = pdu.serialize();
    assert_eq!(bytes, vec![0x01, 0x10, 0x0B, 0x00, 0x0A]);
    assert_eq!(ErrorResponse::parse(&bytes).unwrap(), pdu);
}

#[test]
fn typed_range_request_encodes_short_and_full_uuids() {
    let short = ReadByGroupTypeRequest {
        start_handle: 0x0001,
        end_handle: 0xFFFF,
        group_type: Uuid::from_u16(PRIMARY_SERVICE_UUID),
    };
    let bytes = short.serialize();
    assert_eq!(bytes, vec![0x10, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28]);
    assert_eq!(ReadByGroupTypeRequest::parse(&bytes).unwrap(), short);

    let full = ReadByTypeRequest {
        start_handle: 0x0001,
        end_handle: 0x0010,
        attribute_type: "12345678-90ab-cdef-1234-567890abcdef".parse().unwrap(),
    };
    let bytes = full.serialize();
    assert_eq!(bytes.len(), 21);
    assert_eq!(ReadByTypeRequest::parse(&bytes).unwrap(), full);
}

#[test]
fn find_info_response_decodes_both_formats() {
    // Format 1: (handle, 16-bit UUID) pairs
    let bytes = vec![ATT_FIND_INFO_RSP, 0x01, 0x05, 0x00, 0x02, 0x29, 0x06, 0x00, 0x01, 0x29];
    let rsp = FindInformationResponse::parse(&bytes).unwrap();
    assert_eq!(
        rsp.entries,
        vec![
            (0x0005, Uuid::from_u16(0x2902)),
            (0x0006, Uuid::from_u16(0x2901)),
        ]
    );

    // Format 2: (handle, 128-bit UUID) pairs
    let uuid: Uuid = "12345678-90ab-cdef-1234-567890abcdef".parse().unwrap();
    let mut bytes = vec![ATT_FIND_INFO_RSP, 0x02, 0x07, 0x00];
    bytes.extend_from_slice(uuid.as_bytes_le());
    let rsp = FindInformationResponse::parse(&bytes).unwrap();
    assert_eq!(rsp.entries, vec![(0x0007, uuid)]);
}

#[test]
fn find_info_response_rejects_bad_format_and_ragged_lists() {
    // Unknown format tag
    assert!(FindInformationResponse::parse(&[ATT_FIND_INFO_RSP, 0x03, 0, 0, 0, 0]).is_err());
    // Empty entry list
    assert!(FindInformationResponse::parse(&[ATT_FIND_INFO_RSP, 0x01]).is_err());
    // Trailing partial pair
    assert!(
        FindInformationResponse::parse(&[ATT_FIND_INFO_RSP, 0x01, 0x05, 0x00, 0x02]).is_err()
    );
}

#[test]
fn group_response_rejects_empty_and_ragged_lists() {
    // Entry list must not be empty: this is never "attribute not found"
    assert!(ReadByGroupTypeResponse::parse(&[ATT_READ_BY_GROUP_TYPE_RSP, 6]).is_err());
    // Entry length below the fixed header is malformed
    assert!(ReadByGroupTypeResponse::parse(&[ATT_READ_BY_GROUP_TYPE_RSP, 5, 0, 0, 0, 0, 0]).is_err());
    // Body length must be an exact multiple of the entry length
    let bytes = vec![ATT_READ_BY_GROUP_TYPE_RSP, 6, 0x01, 0x00, 0x05, 0x00, 0x00, 0x18, 0xFF];
    assert!(ReadByGroupTypeResponse::parse(&bytes).is_err());
}

#[test]
fn group_response_round_trip() {
    let rsp = ReadByGroupTypeResponse {
        length: 6,
        data: vec![
            AttributeGroupData {
                handle: 0x0001,
                end_group_handle: 0x0005,
                value: vec![0x00, 0x18],
            },
            AttributeGroupData {
                handle: 0x0006,
                end_group_handle: 0x000A,
                value: vec![0x0F, 0x18],
            },
        ],
    };
    let parsed = ReadByGroupTypeResponse::parse(&rsp.serialize()).unwrap();
    assert_eq!(parsed, rsp);
}

#[test]
fn read_by_type_response_rejects_short_entries() {
    assert!(ReadByTypeResponse::parse(&[ATT_READ_BY_TYPE_RSP, 2, 0x01, 0x00]).is_err());
    assert!(ReadByTypeResponse::parse(&[ATT_READ_BY_TYPE_RSP, 7]).is_err());
}

#[test]
fn confirmation_is_a_bare_opcode() {
    assert_eq!(HandleValueConfirmation.serialize(), vec![0x1E]);
    assert!(HandleValueConfirmation::parse(&[0x1E]).is_ok());
    assert!(HandleValueConfirmation::parse(&[0x1E, 0x00]).is_err());
}

#[test]
fn write_command_layout() {
    let cmd = WriteCommand {
        handle: 0x0042,
        value: vec![0x01, 0x02, 0xAB],
    };
    assert_eq!(cmd.serialize(), vec![0x52, 0x42, 0x00, 0x01, 0x02, 0xAB]);
}

#[test]
fn error_code_translation() {
    assert_eq!(AttErrorCode::from(0x0A), AttErrorCode::AttributeNotFound);
    assert_eq!(u8::from(AttErrorCode::AttributeNotFound), 0x0A);
    assert_eq!(AttErrorCode::from(0x85), AttErrorCode::ApplicationError(0x85));
    assert_eq!(AttErrorCode::from(0xE0), AttErrorCode::CommonProfileError(0xE0));
    assert_eq!(
        AttErrorCode::AttributeNotFound.to_string(),
        "No attribute found within the given range"
    );
}
