//! GATT client procedures
//!
//! Each public method runs one GATT sub-procedure to completion on the
//! ATT client. ATT responses are capped at the channel MTU and carry no
//! "more follows" marker, so the paginated procedures chain requests
//! using a [`DiscoveryCursor`]: every batch moves the lower bound to
//! the last seen handle plus one, and the server signals exhaustion
//! with an "Attribute Not Found" error response. Results are handed to
//! the caller per entry as batches arrive, so partial output survives a
//! failure on a later page.

use log::debug;
use thiserror::Error;

use crate::att::{
    AttClient, AttError, AttErrorCode, EventCategory, EventHandler,
    FindInformationRequest, FindInformationResponse, ReadByGroupTypeRequest,
    ReadByGroupTypeResponse, ReadByTypeRequest, ReadByTypeResponse, ReadRequest, ReadResponse,
    WriteCommand, ATT_VALUE_HEADER_SIZE, CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID,
};
use crate::gatt::types::{
    Characteristic, CharacteristicProperties, Descriptor, DiscoveryCursor, ServiceGroup,
};
use crate::l2cap::PduChannel;
use crate::uuid::Uuid;

/// Errors surfaced by GATT procedures
#[derive(Debug, Error)]
pub enum GattError {
    /// Rejected locally, before any request was sent
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server's response decoded but does not make sense
    #[error("invalid data received: {0}")]
    InvalidData(&'static str),

    #[error(transparent)]
    Att(#[from] AttError),
}

/// GATT result type
pub type GattResult<T> = Result<T, GattError>;

/// A client for running GATT procedures against a remote server
pub struct GattClient<C: PduChannel> {
    att: AttClient<C>,
}

impl<C: PduChannel> GattClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            att: AttClient::new(channel),
        }
    }

    /// Registers the handler invoked for incoming notifications.
    pub fn on_notification(&mut self, handler: EventHandler) {
        self.att
            .register_event_handler(EventCategory::Notification, handler);
    }

    /// Registers the handler invoked for incoming indications. The
    /// confirmation reply is sent automatically.
    pub fn on_indication(&mut self, handler: EventHandler) {
        self.att
            .register_event_handler(EventCategory::Indication, handler);
    }

    /// Discovers all primary services in `[start, end]`, invoking
    /// `emit` for each group as it is decoded.
    pub fn discover_primary<F>(&mut self, start: u16, end: u16, mut emit: F) -> GattResult<()>
    where
        F: FnMut(&ServiceGroup),
    {
        let mut cursor = DiscoveryCursor::new(start, end);

        while let Some((low, high)) = cursor.range() {
            debug!("discover primary over [0x{:04x}, 0x{:04x}]", low, high);
            let request = ReadByGroupTypeRequest {
                start_handle: low,
                end_handle: high,
                group_type: Uuid::from_u16(PRIMARY_SERVICE_UUID),
            };

            let response: ReadByGroupTypeResponse = match self.att.transact(&request) {
                Ok(response) => response,
                Err(AttError::Protocol(AttErrorCode::AttributeNotFound, _)) => break,
                Err(e) => return Err(e.into()),
            };

            let mut last_end = low;
            for entry in &response.data {
                let uuid = Uuid::try_from_slice_le(&entry.value)
                    .ok_or(GattError::InvalidData("bad service UUID length"))?;
                emit(&ServiceGroup {
                    start_handle: entry.handle,
                    end_handle: entry.end_group_handle,
                    uuid,
                });
                last_end = entry.end_group_handle;
            }

            cursor.advance(last_end);
        }

        Ok(())
    }

    /// Discovers all characteristic declarations in `[start, end]`,
    /// invoking `emit` for each as it is decoded.
    pub fn discover_characteristics<F>(
        &mut self,
        start: u16,
        end: u16,
        mut emit: F,
    ) -> GattResult<()>
    where
        F: FnMut(&Characteristic),
    {
        let mut cursor = DiscoveryCursor::new(start, end);

        while let Some((low, high)) = cursor.range() {
            debug!("discover characteristics over [0x{:04x}, 0x{:04x}]", low, high);
            let request = ReadByTypeRequest {
                start_handle: low,
                end_handle: high,
                attribute_type: Uuid::from_u16(CHARACTERISTIC_UUID),
            };

            let response: ReadByTypeResponse = match self.att.transact(&request) {
                Ok(response) => response,
                Err(AttError::Protocol(AttErrorCode::AttributeNotFound, _)) => break,
                Err(e) => return Err(e.into()),
            };

            let mut last_handle = low;
            for entry in &response.data {
                // Declaration value: properties (1), value handle (2),
                // then a 2- or 16-byte UUID
                if entry.value.len() < 5 {
                    return Err(GattError::InvalidData("characteristic declaration too short"));
                }
                let properties = CharacteristicProperties::from_bits_truncate(entry.value[0]);
                let value_handle = u16::from_le_bytes([entry.value[1], entry.value[2]]);
                let uuid = Uuid::try_from_slice_le(&entry.value[3..])
                    .ok_or(GattError::InvalidData("bad characteristic UUID length"))?;

                emit(&Characteristic {
                    declaration_handle: entry.handle,
                    properties,
                    value_handle,
                    uuid,
                });
                last_handle = entry.handle;
            }

            cursor.advance(last_handle);
        }

        Ok(())
    }

    /// Discovers descriptors in `[start, end]` with a single Find
    /// Information request.
    ///
    /// Deliberately does not page past the first response batch.
    pub fn discover_descriptors<F>(&mut self, start: u16, end: u16, mut emit: F) -> GattResult<()>
    where
        F: FnMut(&Descriptor),
    {
        let request = FindInformationRequest {
            start_handle: start,
            end_handle: end,
        };
        let response: FindInformationResponse = self.att.transact(&request)?;

        for (handle, uuid) in &response.entries {
            emit(&Descriptor {
                handle: *handle,
                uuid: *uuid,
            });
        }

        Ok(())
    }

    /// Reads the value of the attribute at `handle`.
    pub fn read_value(&mut self, handle: u16) -> GattResult<Vec<u8>> {
        if handle == 0 {
            return Err(GattError::InvalidArgument(
                "a valid handle is required".into(),
            ));
        }

        let response: ReadResponse = self.att.transact(&ReadRequest { handle })?;
        Ok(response.value)
    }

    /// Writes `value` to the attribute at `handle` as a Write Command.
    ///
    /// Completes once the PDU has been handed to the channel; this
    /// write form has no response.
    pub fn write_command(&mut self, handle: u16, value: &[u8]) -> GattResult<()> {
        if handle == 0 {
            return Err(GattError::InvalidArgument(
                "a valid handle is required".into(),
            ));
        }
        if value.is_empty() {
            return Err(GattError::InvalidArgument("a value is required".into()));
        }
        let max = usize::from(self.att.mtu()) - ATT_VALUE_HEADER_SIZE;
        if value.len() > max {
            return Err(GattError::InvalidArgument(format!(
                "value exceeds {} bytes allowed by the MTU",
                max
            )));
        }

        self.att.send_command(&WriteCommand {
            handle,
            value: value.to_vec(),
        })?;
        Ok(())
    }

    /// Services incoming notifications and indications until the
    /// channel fails.
    pub fn listen(&mut self) -> GattResult<()> {
        loop {
            self.att.poll_events(None)?;
        }
    }
}

/// Decodes a write value given as a case-insensitive hex string.
///
/// An odd trailing nibble is dropped rather than rejected, matching
/// long-standing tool behavior; an empty or non-hex string is rejected
/// before any I/O happens.
pub fn parse_hex_value(s: &str) -> GattResult<Vec<u8>> {
    if s.is_empty() {
        return Err(GattError::InvalidArgument("a value is required".into()));
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GattError::InvalidArgument(format!(
            "invalid hex value '{}'",
            s
        )));
    }

    let even = &s[..s.len() & !1];
    hex::decode(even).map_err(|e| GattError::InvalidArgument(e.to_string()))
}
