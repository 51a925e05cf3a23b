//! L2CAP transport for ATT
//!
//! ATT runs over a single connection-oriented L2CAP channel: the fixed
//! attribute channel (CID 4) on LE, or PSM 31 on BR/EDR. This module
//! provides the [`PduChannel`] abstraction the ATT layer is written
//! against and the BlueZ socket implementation of it.

pub mod socket;

use std::time::Duration;

use thiserror::Error;

use crate::addr::BdAddr;

pub use self::socket::L2capSocket;

/// Fixed channel identifier for the Attribute Protocol on LE.
pub const ATT_CID: u16 = 0x0004;
/// PSM for GATT over BR/EDR.
pub const ATT_PSM: u16 = 0x001F;
/// Minimum MTU permitted for an ATT channel on the BR/EDR bearer.
pub const BREDR_MIN_MTU: u16 = 48;
/// Default ATT MTU on the LE fixed channel.
pub const LE_DEFAULT_MTU: u16 = 23;
/// Default L2CAP MTU on BR/EDR.
pub const BREDR_DEFAULT_MTU: u16 = 672;

/// Errors that can occur on the L2CAP transport
#[derive(Debug, Error)]
pub enum L2capError {
    #[error("failed to create L2CAP socket: {0}")]
    Socket(std::io::Error),

    #[error("failed to bind L2CAP socket: {0}")]
    Bind(std::io::Error),

    #[error("failed to connect: {0}")]
    Connect(std::io::Error),

    #[error("failed to configure socket: {0}")]
    SetOption(std::io::Error),

    #[error("failed to send PDU: {0}")]
    Send(std::io::Error),

    #[error("failed to receive PDU: {0}")]
    Recv(std::io::Error),

    #[error("receive timed out")]
    Timeout,

    #[error("connection closed by peer")]
    Disconnected,

    #[error("MTU cannot be smaller than 48 (got {0})")]
    InvalidMtu(u16),
}

/// L2CAP transport result type
pub type L2capResult<T> = Result<T, L2capError>;

/// Which bearer carries the ATT channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Classic BR/EDR, connecting on PSM 31
    BrEdr,
    /// Low Energy, connecting on fixed CID 4
    LowEnergy,
}

/// Connection parameters for [`L2capSocket::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Local adapter address to bind to; `BdAddr::ANY` for any adapter.
    pub source: BdAddr,
    /// Remote device address.
    pub destination: BdAddr,
    /// Bearer selection.
    pub transport: Transport,
    /// Requested MTU; 0 leaves the kernel default in place.
    pub mtu: u16,
}

impl ConnectOptions {
    pub fn new(destination: BdAddr, transport: Transport) -> Self {
        Self {
            source: BdAddr::ANY,
            destination,
            transport,
            mtu: 0,
        }
    }

    /// Validates the options before any socket is created.
    ///
    /// The kernel accepts sub-minimum MTU values on BR/EDR without an
    /// error from `setsockopt`, so the check has to happen here.
    pub fn validate(&self) -> L2capResult<()> {
        if self.transport == Transport::BrEdr && self.mtu != 0 && self.mtu < BREDR_MIN_MTU {
            return Err(L2capError::InvalidMtu(self.mtu));
        }
        Ok(())
    }
}

/// An ordered, reliable, message-oriented PDU transport with a
/// negotiated maximum message size.
///
/// The ATT layer owns exactly one channel for its lifetime and is
/// written against this trait so it can be driven by a scripted mock in
/// tests.
pub trait PduChannel {
    /// Sends one complete PDU.
    fn send(&mut self, pdu: &[u8]) -> L2capResult<()>;

    /// Receives one complete PDU, blocking until one arrives.
    ///
    /// With a timeout, `L2capError::Timeout` is returned when nothing
    /// arrives in time. End of stream yields `L2capError::Disconnected`.
    fn recv(&mut self, timeout: Option<Duration>) -> L2capResult<Vec<u8>>;

    /// The negotiated maximum PDU size for this channel.
    fn mtu(&self) -> u16;
}
