//! GATT (Generic Attribute Profile) client procedures
//!
//! This module implements the client-side discovery, read, and write
//! sub-procedures layered on the ATT client.

pub mod client;
pub mod types;


pub use client::{parse_hex_value, GattClient, GattError, GattResult};
pub use types::{
    Characteristic, CharacteristicProperties, Descriptor, DiscoveryCursor, ServiceGroup,
};
