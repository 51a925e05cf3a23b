//! Attribute Protocol (ATT) client implementation
//!
//! This module provides the ATT wire codec, the request/response
//! correlation client, and the dispatcher for server-initiated
//! notifications and indications.

pub mod client;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the public API
pub use self::client::AttClient;
pub use self::constants::*;
pub use self::dispatcher::{EventCategory, EventDispatcher, EventHandler};
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::types::*;
