//! Blueprobe - a GATT client library for Linux
//!
//! This library implements the client side of the Bluetooth Attribute
//! Protocol (ATT) and the Generic Attribute Profile (GATT) discovery,
//! read, write, and notification procedures on top of it. The transport
//! is a BlueZ L2CAP socket (fixed channel 4 for LE, PSM 31 for BR/EDR),
//! abstracted behind the [`l2cap::PduChannel`] trait so the protocol
//! layers can be exercised without Bluetooth hardware.

pub mod addr;
pub mod att;
pub mod gatt;
pub mod hci;
pub mod l2cap;
pub mod uuid;

// Re-export common types for convenience
pub use addr::BdAddr;
pub use att::{AttClient, AttError, AttErrorCode, AttResult, EventCategory};
pub use gatt::{
    Characteristic, CharacteristicProperties, Descriptor, GattClient, GattError, ServiceGroup,
};
pub use l2cap::{ConnectOptions, L2capError, L2capSocket, PduChannel, Transport};
pub use uuid::Uuid;
