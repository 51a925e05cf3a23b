//! ATT client: request/response correlation over one PDU channel
//!
//! ATT is a request/response protocol with no transaction identifiers,
//! so at most one request may be outstanding on the channel at any
//! time; the response is correlated purely by opcode. The client owns
//! the channel for its lifetime and keeps a single pending-request
//! slot. Unsolicited notifications and indications share the channel
//! and are forwarded to the [`EventDispatcher`] whenever they arrive,
//! including in the middle of a transaction.

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::constants::*;
use super::dispatcher::{EventCategory, EventDispatcher, EventHandler};
use super::error::{AttError, AttResult};
use super::types::{AttPacket, ErrorResponse, HandleValueConfirmation};
use crate::l2cap::{L2capError, PduChannel};

/// ATT client
pub struct AttClient<C: PduChannel> {
    channel: C,
    /// Opcode of the outstanding request, if any
    pending: Option<u8>,
    dispatcher: EventDispatcher,
    /// Optional guard against a peer that never answers; `None`
    /// reproduces the protocol's behavior of waiting indefinitely
    request_timeout: Option<Duration>,
    /// Set once the channel has failed; no further I/O is attempted
    closed: bool,
}

impl<C: PduChannel> AttClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            pending: None,
            dispatcher: EventDispatcher::new(),
            request_timeout: None,
            closed: false,
        }
    }

    /// The negotiated MTU of the underlying channel.
    pub fn mtu(&self) -> u16 {
        self.channel.mtu()
    }

    /// Sets a deadline for each request; `None` waits forever.
    pub fn set_request_timeout(&mut self, timeout: Option<Duration>) {
        self.request_timeout = timeout;
    }

    /// Registers a handler for notifications or indications, replacing
    /// any previous handler for that category.
    pub fn register_event_handler(&mut self, category: EventCategory, handler: EventHandler) {
        self.dispatcher.register(category, handler);
    }

    pub fn unregister_event_handler(&mut self, category: EventCategory) {
        self.dispatcher.unregister(category);
    }

    /// Sends a request and waits for its response.
    pub fn transact<Req: AttPacket, Rsp: AttPacket>(&mut self, request: &Req) -> AttResult<Rsp> {
        self.send_request(request)?;
        self.wait_response()
    }

    /// Sends a request, recording it as pending.
    ///
    /// Fails with `ChannelBusy` before any I/O if a request is already
    /// outstanding.
    pub fn send_request<Req: AttPacket>(&mut self, request: &Req) -> AttResult<()> {
        if self.closed {
            return Err(AttError::Disconnected);
        }
        if self.pending.is_some() {
            return Err(AttError::ChannelBusy);
        }

        let pdu = request.serialize();
        self.channel.send(&pdu).map_err(|e| self.channel_failed(e))?;
        self.pending = Some(Req::opcode());
        Ok(())
    }

    /// Waits for the response to the pending request, servicing any
    /// unsolicited PDUs that arrive first.
    pub fn wait_response<Rsp: AttPacket>(&mut self) -> AttResult<Rsp> {
        let expected_req = self.pending.ok_or(AttError::InvalidState)?;
        let expected_rsp = response_opcode(expected_req);
        let deadline = self.request_timeout.map(|t| Instant::now() + t);

        loop {
            let timeout = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.pending = None;
                        return Err(AttError::Timeout);
                    }
                    Some(deadline - now)
                }
            };

            let pdu = match self.channel.recv(timeout) {
                Ok(pdu) => pdu,
                Err(L2capError::Timeout) => {
                    self.pending = None;
                    return Err(AttError::Timeout);
                }
                Err(e) => return Err(self.channel_failed(e)),
            };

            if pdu.is_empty() {
                warn!("discarding empty PDU");
                continue;
            }
            let opcode = pdu[0];

            if let Some(category) = EventCategory::from_opcode(opcode) {
                self.handle_event(category, &pdu)?;
                continue;
            }

            if opcode == ATT_ERROR_RSP {
                let err = match ErrorResponse::parse(&pdu) {
                    Ok(err) => err,
                    Err(e) => {
                        self.pending = None;
                        return Err(e);
                    }
                };
                if err.request_opcode != expected_req {
                    warn!(
                        "error response names opcode 0x{:02x}, expected 0x{:02x}",
                        err.request_opcode, expected_req
                    );
                }
                self.pending = None;
                return Err(AttError::Protocol(err.error_code, err.handle));
            }

            if Some(opcode) == expected_rsp {
                self.pending = None;
                return Rsp::parse(&pdu);
            }

            // Neither the pending response nor an event: report and drop
            warn!("discarding unexpected PDU with opcode 0x{:02x}", opcode);
        }
    }

    /// Sends a PDU that expects no response (write command,
    /// confirmation). Does not touch the pending-request slot.
    pub fn send_command<Cmd: AttPacket>(&mut self, command: &Cmd) -> AttResult<()> {
        if self.closed {
            return Err(AttError::Disconnected);
        }

        let pdu = command.serialize();
        self.channel.send(&pdu).map_err(|e| self.channel_failed(e))?;
        Ok(())
    }

    /// Services one inbound PDU while idle (listen mode).
    ///
    /// Returns `Ok(true)` if a PDU was handled, `Ok(false)` if the
    /// timeout elapsed first.
    pub fn poll_events(&mut self, timeout: Option<Duration>) -> AttResult<bool> {
        if self.closed {
            return Err(AttError::Disconnected);
        }

        let pdu = match self.channel.recv(timeout) {
            Ok(pdu) => pdu,
            Err(L2capError::Timeout) => return Ok(false),
            Err(e) => return Err(self.channel_failed(e)),
        };

        if pdu.is_empty() {
            warn!("discarding empty PDU");
            return Ok(true);
        }

        match EventCategory::from_opcode(pdu[0]) {
            Some(category) => self.handle_event(category, &pdu)?,
            None => warn!(
                "discarding PDU with opcode 0x{:02x} while no request is pending",
                pdu[0]
            ),
        }

        Ok(true)
    }

    /// Dispatches one notification or indication and, for indications,
    /// sends exactly one confirmation once the handler has returned.
    /// The server will not indicate again until it sees the
    /// confirmation, so it is sent whether or not a handler is
    /// registered.
    fn handle_event(&mut self, category: EventCategory, pdu: &[u8]) -> AttResult<()> {
        if pdu.len() < ATT_VALUE_HEADER_SIZE {
            warn!("discarding truncated {:?} PDU", category);
            return Ok(());
        }

        let handle = u16::from_le_bytes([pdu[1], pdu[2]]);
        let value = &pdu[3..];
        debug!("{:?} for handle 0x{:04x}, {} bytes", category, handle, value.len());

        self.dispatcher.dispatch(category, handle, value);

        if category == EventCategory::Indication {
            self.send_command(&HandleValueConfirmation)?;
        }

        Ok(())
    }

    /// Records a channel failure: the pending request (if any) is
    /// completed with the error and every later send is refused.
    fn channel_failed(&mut self, err: L2capError) -> AttError {
        self.pending = None;
        let err = AttError::from(err);
        if matches!(err, AttError::Disconnected | AttError::Transport(_)) {
            self.closed = true;
        }
        err
    }
}

impl<C: PduChannel> std::fmt::Debug for AttClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttClient")
            .field("pending", &self.pending)
            .field("closed", &self.closed)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
