//! Dispatch of server-initiated PDUs
//!
//! Notifications and indications arrive unsolicited on the same channel
//! as responses. The dispatcher keeps at most one handler per PDU
//! category; registering a new handler replaces the previous one, and
//! registrations live until explicitly cleared or the channel goes down.

use super::constants::{ATT_HANDLE_VALUE_IND, ATT_HANDLE_VALUE_NTF};

/// The two categories of unsolicited value PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Unacknowledged server push
    Notification,
    /// Server push requiring a confirmation reply
    Indication,
}

impl EventCategory {
    /// Classifies an opcode, if it is an unsolicited value PDU.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            ATT_HANDLE_VALUE_NTF => Some(EventCategory::Notification),
            ATT_HANDLE_VALUE_IND => Some(EventCategory::Indication),
            _ => None,
        }
    }
}

/// Handler invoked with (attribute handle, value bytes).
pub type EventHandler = Box<dyn FnMut(u16, &[u8]) + Send>;

/// Registration table for unsolicited PDU handlers
#[derive(Default)]
pub struct EventDispatcher {
    notification: Option<EventHandler>,
    indication: Option<EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a category, replacing any previous one.
    pub fn register(&mut self, category: EventCategory, handler: EventHandler) {
        *self.slot(category) = Some(handler);
    }

    /// Removes the handler for a category.
    pub fn unregister(&mut self, category: EventCategory) {
        *self.slot(category) = None;
    }

    /// Invokes the handler for `category`, if one is registered.
    pub fn dispatch(&mut self, category: EventCategory, handle: u16, value: &[u8]) {
        if let Some(handler) = self.slot(category) {
            handler(handle, value);
        }
    }

    fn slot(&mut self, category: EventCategory) -> &mut Option<EventHandler> {
        match category {
            EventCategory::Notification => &mut self.notification,
            EventCategory::Indication => &mut self.indication,
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_notification_handler", &self.notification.is_some())
            .field("has_indication_handler", &self.indication.is_some())
            .finish()
    }
}
