//! ATT PDU definitions and codec
//!
//! Each PDU is a struct implementing [`AttPacket`]: `serialize` and
//! `parse` are pure functions over the wire representation (1-byte
//! opcode followed by little-endian fields). List-shaped responses are
//! self-describing: a per-entry length followed by uniform entries.
//! Parsing is strict; a response whose entry list is empty or not an
//! exact multiple of the entry length is rejected as malformed rather
//! than being mistaken for an empty result.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use crate::uuid::Uuid;

/// ATT packet codec
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from bytes
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

/// Error Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Opcode of the request that failed
    pub request_opcode: u8,
    /// Attribute handle the error refers to
    pub handle: u16,
    pub error_code: AttErrorCode,
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() != 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let request_opcode = data[1];
        let mut cursor = Cursor::new(&data[2..4]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let error_code = data[4].into();

        Ok(Self {
            request_opcode,
            handle,
            error_code,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);

        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());

        packet
    }
}

/// Find Information Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInformationRequest {
    pub start_handle: u16,
    pub end_handle: u16,
}

impl AttPacket for FindInformationRequest {
    fn opcode() -> u8 {
        ATT_FIND_INFO_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() != 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        Ok(Self {
            start_handle,
            end_handle,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());

        packet
    }
}

/// Find Information Response packet
///
/// The format byte applies to every entry in the response: 0x01 means
/// 4-byte (handle, 16-bit UUID) pairs, 0x02 means 18-byte (handle,
/// 128-bit UUID) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInformationResponse {
    pub format: u8,
    pub entries: Vec<(u16, Uuid)>,
}

impl AttPacket for FindInformationResponse {
    fn opcode() -> u8 {
        ATT_FIND_INFO_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let format = data[1];
        let uuid_len = match format {
            ATT_FIND_INFO_RSP_FORMAT_16BIT => 2,
            ATT_FIND_INFO_RSP_FORMAT_128BIT => 16,
            _ => return Err(AttError::InvalidPdu),
        };
        let pair_len = 2 + uuid_len;

        let body = &data[2..];
        if body.is_empty() || body.len() % pair_len != 0 {
            return Err(AttError::InvalidPdu);
        }

        let mut entries = Vec::with_capacity(body.len() / pair_len);
        for pair in body.chunks_exact(pair_len) {
            let handle = u16::from_le_bytes([pair[0], pair[1]]);
            let uuid = Uuid::try_from_slice_le(&pair[2..]).ok_or(AttError::InvalidPdu)?;
            entries.push((handle, uuid));
        }

        Ok(Self { format, entries })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.format];

        for (handle, uuid) in &self.entries {
            packet.extend_from_slice(&handle.to_le_bytes());
            if self.format == ATT_FIND_INFO_RSP_FORMAT_16BIT {
                packet.extend_from_slice(&uuid.as_u16().unwrap_or(0).to_le_bytes());
            } else {
                packet.extend_from_slice(uuid.as_bytes_le());
            }
        }

        packet
    }
}

/// Read By Type Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeRequest {
    pub start_handle: u16,
    pub end_handle: u16,
    pub attribute_type: Uuid,
}

impl AttPacket for ReadByTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        parse_typed_range_request(data, Self::opcode()).map(
            |(start_handle, end_handle, attribute_type)| Self {
                start_handle,
                end_handle,
                attribute_type,
            },
        )
    }

    fn serialize(&self) -> Vec<u8> {
        serialize_typed_range_request(
            Self::opcode(),
            self.start_handle,
            self.end_handle,
            &self.attribute_type,
        )
    }
}

/// Handle and value in a Read By Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    pub handle: u16,
    pub value: Vec<u8>,
}

/// Read By Type Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeResponse {
    /// Length of each entry, handle included
    pub length: u8,
    pub data: Vec<HandleValue>,
}

impl AttPacket for ReadByTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1];
        if length < 3 {
            return Err(AttError::InvalidPdu);
        }

        let body = &data[2..];
        if body.is_empty() || body.len() % length as usize != 0 {
            return Err(AttError::InvalidPdu);
        }

        let mut data_list = Vec::with_capacity(body.len() / length as usize);
        for entry in body.chunks_exact(length as usize) {
            data_list.push(HandleValue {
                handle: u16::from_le_bytes([entry[0], entry[1]]),
                value: entry[2..].to_vec(),
            });
        }

        Ok(Self {
            length,
            data: data_list,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];

        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }

        packet
    }
}

/// Read Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub handle: u16,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() != 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let handle = u16::from_le_bytes([data[1], data[2]]);

        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());

        packet
    }
}

/// Read Response packet
///
/// The value length is not encoded; it is whatever remains of the PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.is_empty() || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Read By Group Type Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeRequest {
    pub start_handle: u16,
    pub end_handle: u16,
    pub group_type: Uuid,
}

impl AttPacket for ReadByGroupTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        parse_typed_range_request(data, Self::opcode()).map(
            |(start_handle, end_handle, group_type)| Self {
                start_handle,
                end_handle,
                group_type,
            },
        )
    }

    fn serialize(&self) -> Vec<u8> {
        serialize_typed_range_request(
            Self::opcode(),
            self.start_handle,
            self.end_handle,
            &self.group_type,
        )
    }
}

/// One attribute group in a Read By Group Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroupData {
    pub handle: u16,
    pub end_group_handle: u16,
    pub value: Vec<u8>,
}

/// Read By Group Type Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeResponse {
    /// Length of each entry, handles included
    pub length: u8,
    pub data: Vec<AttributeGroupData>,
}

impl AttPacket for ReadByGroupTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1];
        if length < 6 {
            return Err(AttError::InvalidPdu);
        }

        let body = &data[2..];
        if body.is_empty() || body.len() % length as usize != 0 {
            return Err(AttError::InvalidPdu);
        }

        let mut data_list = Vec::with_capacity(body.len() / length as usize);
        for entry in body.chunks_exact(length as usize) {
            data_list.push(AttributeGroupData {
                handle: u16::from_le_bytes([entry[0], entry[1]]),
                end_group_handle: u16::from_le_bytes([entry[2], entry[3]]),
                value: entry[4..].to_vec(),
            });
        }

        Ok(Self {
            length,
            data: data_list,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];

        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.end_group_handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }

        packet
    }
}

/// Write Command packet (no response expected)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Handle Value Notification packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValueNotification {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueNotification {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_NTF
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < ATT_VALUE_HEADER_SIZE || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Handle Value Indication packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValueIndication {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueIndication {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_IND
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < ATT_VALUE_HEADER_SIZE || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Handle Value Confirmation packet: a bare opcode, no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValueConfirmation;

impl AttPacket for HandleValueConfirmation {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_CONF
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() != 1 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Shared layout of Read By Type / Read By Group Type requests:
/// opcode + range + 16-bit or 128-bit type UUID.
fn parse_typed_range_request(data: &[u8], opcode: u8) -> AttResult<(u16, u16, Uuid)> {
    if data.len() < 7 || data[0] != opcode {
        return Err(AttError::InvalidPdu);
    }

    let mut cursor = Cursor::new(&data[1..5]);
    let start_handle = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::InvalidPdu)?;
    let end_handle = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::InvalidPdu)?;

    let uuid = match data.len() {
        7 | 21 => Uuid::try_from_slice_le(&data[5..]).ok_or(AttError::InvalidPdu)?,
        _ => return Err(AttError::InvalidPdu),
    };

    Ok((start_handle, end_handle, uuid))
}

fn serialize_typed_range_request(opcode: u8, start: u16, end: u16, uuid: &Uuid) -> Vec<u8> {
    let mut packet = Vec::with_capacity(5 + uuid.encoded_len());

    packet.push(opcode);
    packet.extend_from_slice(&start.to_le_bytes());
    packet.extend_from_slice(&end.to_le_bytes());
    uuid.encode_to(&mut packet);

    packet
}
