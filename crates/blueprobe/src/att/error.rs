//! Error handling for the ATT protocol

use std::fmt;

use thiserror::Error;

use super::constants::*;
use crate::l2cap::L2capError;

/// ATT error codes as carried in an Error Response PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    InvalidHandle,
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidPdu,
    InsufficientAuthentication,
    RequestNotSupported,
    InvalidOffset,
    InsufficientAuthorization,
    PrepareQueueFull,
    AttributeNotFound,
    AttributeNotLong,
    InsufficientEncryptionKeySize,
    InvalidAttributeValueLength,
    Unlikely,
    InsufficientEncryption,
    UnsupportedGroupType,
    InsufficientResources,
    DatabaseOutOfSync,
    ValueNotAllowed,
    ApplicationError(u8),
    CommonProfileError(u8),
    Unknown(u8),
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => AttErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_INSUFFICIENT_AUTHENTICATION => AttErrorCode::InsufficientAuthentication,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => AttErrorCode::InvalidOffset,
            ATT_ERROR_INSUFFICIENT_AUTHORIZATION => AttErrorCode::InsufficientAuthorization,
            ATT_ERROR_PREPARE_QUEUE_FULL => AttErrorCode::PrepareQueueFull,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND => AttErrorCode::AttributeNotFound,
            ATT_ERROR_ATTRIBUTE_NOT_LONG => AttErrorCode::AttributeNotLong,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE => {
                AttErrorCode::InsufficientEncryptionKeySize
            }
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION => AttErrorCode::InsufficientEncryption,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE => AttErrorCode::UnsupportedGroupType,
            ATT_ERROR_INSUFFICIENT_RESOURCES => AttErrorCode::InsufficientResources,
            ATT_ERROR_DATABASE_OUT_OF_SYNC => AttErrorCode::DatabaseOutOfSync,
            ATT_ERROR_VALUE_NOT_ALLOWED => AttErrorCode::ValueNotAllowed,
            c if (ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END)
                .contains(&c) =>
            {
                AttErrorCode::ApplicationError(c)
            }
            c if c >= ATT_ERROR_COMMON_PROFILE_ERROR_START => AttErrorCode::CommonProfileError(c),
            _ => AttErrorCode::Unknown(code),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> Self {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            AttErrorCode::InsufficientAuthorization => ATT_ERROR_INSUFFICIENT_AUTHORIZATION,
            AttErrorCode::PrepareQueueFull => ATT_ERROR_PREPARE_QUEUE_FULL,
            AttErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttErrorCode::AttributeNotLong => ATT_ERROR_ATTRIBUTE_NOT_LONG,
            AttErrorCode::InsufficientEncryptionKeySize => {
                ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE
            }
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            AttErrorCode::UnsupportedGroupType => ATT_ERROR_UNSUPPORTED_GROUP_TYPE,
            AttErrorCode::InsufficientResources => ATT_ERROR_INSUFFICIENT_RESOURCES,
            AttErrorCode::DatabaseOutOfSync => ATT_ERROR_DATABASE_OUT_OF_SYNC,
            AttErrorCode::ValueNotAllowed => ATT_ERROR_VALUE_NOT_ALLOWED,
            AttErrorCode::ApplicationError(code) => code,
            AttErrorCode::CommonProfileError(code) => code,
            AttErrorCode::Unknown(code) => code,
        }
    }
}

impl fmt::Display for AttErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttErrorCode::InvalidHandle => write!(f, "Invalid handle"),
            AttErrorCode::ReadNotPermitted => write!(f, "Attribute can't be read"),
            AttErrorCode::WriteNotPermitted => write!(f, "Attribute can't be written"),
            AttErrorCode::InvalidPdu => write!(f, "Attribute PDU was invalid"),
            AttErrorCode::InsufficientAuthentication => {
                write!(f, "Attribute requires authentication before read/write")
            }
            AttErrorCode::RequestNotSupported => {
                write!(f, "Server doesn't support the request received")
            }
            AttErrorCode::InvalidOffset => write!(f, "Offset past the end of the attribute"),
            AttErrorCode::InsufficientAuthorization => {
                write!(f, "Attribute requires authorization before read/write")
            }
            AttErrorCode::PrepareQueueFull => {
                write!(f, "Too many prepare writes have been queued")
            }
            AttErrorCode::AttributeNotFound => {
                write!(f, "No attribute found within the given range")
            }
            AttErrorCode::AttributeNotLong => {
                write!(f, "Attribute can't be read or written using the blob requests")
            }
            AttErrorCode::InsufficientEncryptionKeySize => {
                write!(f, "Encryption key size is insufficient")
            }
            AttErrorCode::InvalidAttributeValueLength => {
                write!(f, "Attribute value length is invalid")
            }
            AttErrorCode::Unlikely => write!(f, "Request has encountered an unlikely error"),
            AttErrorCode::InsufficientEncryption => {
                write!(f, "Encryption required before read/write")
            }
            AttErrorCode::UnsupportedGroupType => {
                write!(f, "Attribute type is not a supported grouping attribute")
            }
            AttErrorCode::InsufficientResources => {
                write!(f, "Insufficient resources to complete the request")
            }
            AttErrorCode::DatabaseOutOfSync => write!(f, "Attribute database out of sync"),
            AttErrorCode::ValueNotAllowed => write!(f, "Value not allowed"),
            AttErrorCode::ApplicationError(code) => write!(f, "Application error 0x{:02x}", code),
            AttErrorCode::CommonProfileError(code) => {
                write!(f, "Common profile error 0x{:02x}", code)
            }
            AttErrorCode::Unknown(code) => write!(f, "Unexpected error code 0x{:02x}", code),
        }
    }
}

/// ATT client error type
#[derive(Debug, Error)]
pub enum AttError {
    /// Error Response received from the server
    #[error("{0} (handle 0x{1:04x})")]
    Protocol(AttErrorCode, u16),

    #[error("malformed ATT PDU")]
    InvalidPdu,

    /// A request is already outstanding; ATT forbids pipelining
    #[error("another request is already in progress")]
    ChannelBusy,

    /// No request is outstanding for the attempted operation
    #[error("no request in progress")]
    InvalidState,

    #[error("connection closed")]
    Disconnected,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(L2capError),
}

impl From<L2capError> for AttError {
    fn from(err: L2capError) -> Self {
        match err {
            L2capError::Disconnected => AttError::Disconnected,
            L2capError::Timeout => AttError::Timeout,
            other => AttError::Transport(other),
        }
    }
}

impl AttError {
    /// Returns the server error code if this is an Error Response.
    pub fn error_code(&self) -> Option<AttErrorCode> {
        match self {
            AttError::Protocol(code, _) => Some(*code),
            _ => None,
        }
    }
}

/// ATT result type
pub type AttResult<T> = Result<T, AttError>;
