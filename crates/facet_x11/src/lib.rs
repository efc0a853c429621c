#![cfg(unix)]
#![allow(clippy::unnecessary_cast)] // Better be safe in encodings

//! Minimal client side of the X11 core protocol, enough to open a window, read its input and
//! blit pixels into it.

use crate::{
    connection::XConnection,
    error::Error,
    events::SomeEvent,
    replies::{AwaitingReply, SomeReply, XReply},
    requests::{InitializeConnection, XRequest},
    setup::SetupResponse,
    utils::{display_maybe_utf8, resource_id},
    xauth::XAuth,
    xerror::XError,
};
use std::{
    collections::{vec_deque::Drain, HashMap, VecDeque},
    fmt,
    marker::PhantomData,
};

pub mod atoms;
pub mod connection;
pub mod error;
pub mod events;
pub mod replies;
pub mod requests;
pub mod setup;
mod utils;
pub mod xauth;
pub mod xerror;

pub use setup::{
    Depth, Format, ImageByteOrder, Screen, Setup, SetupRefused, Visual, VisualClass,
};

/// Server-side object handle. Typed wrappers below are what requests take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ResourceId(u32);

impl ResourceId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ResourceId> for u32 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

resource_id!(VisualId);
resource_id!(WindowId);
resource_id!(GContextId);

/// Hands out ids from the range the server assigned to this client
#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    base: u32,
    mask: u32,
    shift: u32,
    issued: u32,
}

impl IdAllocator {
    pub fn new(base: u32, mask: u32) -> Self {
        Self {
            base,
            mask,
            shift: mask.trailing_zeros(),
            issued: 0,
        }
    }

    pub fn allocate_id(&mut self) -> Result<ResourceId, Error> {
        let candidate = self
            .issued
            .checked_add(1)
            .and_then(|next| next.checked_shl(self.shift))
            .filter(|&bits| bits != 0 && bits & !self.mask == 0)
            .ok_or(Error::ResourceIdsExhausted)?;
        self.issued += 1;
        Ok(ResourceId(self.base | candidate))
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(u16)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

/// Visual of a new window. Windows created here always inherit it.
#[derive(Debug, Clone, Copy)]
pub enum WindowVisual {
    CopyFromParent,
}

impl WindowVisual {
    pub fn value(self) -> u32 {
        match self {
            Self::CopyFromParent => 0,
        }
    }
}

/// Target of drawing requests. Pixmaps are never created, so only windows qualify.
#[derive(Debug, Clone, Copy)]
pub enum Drawable {
    Window(WindowId),
}

impl Drawable {
    pub fn value(self) -> u32 {
        let Self::Window(window) = self;
        window.into()
    }
}

/// Lower 16 bits of the request counter, as echoed by the server
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SequenceNumber(u16);

impl SequenceNumber {
    pub fn value(self) -> u16 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u16> for SequenceNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Ticket for the reply of one request. Consumed by [`XDisplay::await_reply`], so it is
/// neither `Clone` nor `Copy`.
pub struct PendingReply<Reply> {
    sequence_number: SequenceNumber,
    reply: PhantomData<Reply>,
}

impl<Reply> fmt::Debug for PendingReply<Reply> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingReply({})", self.sequence_number.value())
    }
}

impl<Reply> PendingReply<Reply> {
    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }
}

/// Connection to X server with the bookkeeping needed to match replies, errors and events
pub struct XDisplay {
    connection: XConnection,
    setup: Setup,
    screen: usize,
    ids: IdAllocator,
    last_sequence_number: SequenceNumber,
    awaiting_replies: HashMap<SequenceNumber, AwaitingReply>,
    event_queue: VecDeque<SomeEvent>,
    error_queue: VecDeque<XError>,
}

impl XDisplay {
    /// Connect to the display named by `$DISPLAY`, authenticating with Xauthority cookie
    pub fn open() -> Result<Self, Error> {
        let (connection, display_var) = XConnection::open()?;
        tracing::debug!(display = %display_var, "Connected to X server socket");
        let auth = XAuth::from_env(display_var.display_sequence)?;
        Self::with_connection(connection, auth, display_var.screen.unwrap_or(0))
    }

    pub fn with_connection(
        mut connection: XConnection,
        auth: Option<XAuth>,
        screen: u32,
    ) -> Result<Self, Error> {
        let init = match auth {
            Some(auth) => InitializeConnection {
                authorization_protocol_name: auth.name,
                authorization_protocol_data: auth.data,
            },
            None => {
                tracing::debug!("No Xauthority entry, connecting without authorization");
                InitializeConnection {
                    authorization_protocol_name: Vec::new(),
                    authorization_protocol_data: Vec::new(),
                }
            }
        };
        connection.send(&init)?;
        connection.flush()?;

        let setup = match SetupResponse::read(&mut connection)? {
            SetupResponse::Success(setup) => setup,
            SetupResponse::Refused(refused) => return Err(Error::CouldNotOpenDisplay(refused)),
            SetupResponse::Authenticate(reason) => {
                return Err(Error::AuthenticationRequired(reason))
            }
        };
        if screen as usize >= setup.screens.len() {
            return Err(Error::NoSuchScreen(screen));
        }

        tracing::debug!(
            vendor = %display_maybe_utf8(&setup.vendor),
            release = setup.release_number,
            maximum_request_length = setup.maximum_request_length,
            "Connection setup accepted"
        );

        Ok(Self {
            connection,
            ids: IdAllocator::new(setup.resource_id_base, setup.resource_id_mask),
            setup,
            screen: screen as usize,
            // Connection setup counts as request 0
            last_sequence_number: SequenceNumber(0),
            awaiting_replies: HashMap::new(),
            event_queue: VecDeque::new(),
            error_queue: VecDeque::new(),
        })
    }

    pub fn id_allocator(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// Screen selected by the display name
    pub fn screen(&self) -> &Screen {
        &self.setup.screens[self.screen]
    }

    /// Largest request server accepts, in bytes
    pub fn maximum_request_bytes(&self) -> usize {
        self.setup.maximum_request_length as usize * 4
    }

    /// Queue a request. Nothing reaches the server before [`Self::flush`] or a blocking wait.
    pub fn send_request<Request: XRequest>(
        &mut self,
        request: &Request,
    ) -> Result<PendingReply<Request::Reply>, Error> {
        self.connection.send(request)?;
        self.last_sequence_number = self.last_sequence_number.next();

        let sequence_number = self.last_sequence_number;
        if let Some(reply_type) = Request::REPLY_TYPE {
            self.awaiting_replies
                .insert(sequence_number, AwaitingReply::NotReceived(reply_type));
        }

        Ok(PendingReply {
            sequence_number,
            reply: PhantomData,
        })
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.connection.flush()
    }

    /// Block until the reply (or error) for `pending` arrives
    pub fn await_reply<Reply: XReply>(
        &mut self,
        pending: PendingReply<Reply>,
    ) -> Result<Reply, Error> {
        self.flush()?;
        loop {
            match self.awaiting_replies.remove(&pending.sequence_number) {
                None => return Err(Error::UnexpectedReply),
                Some(AwaitingReply::Received(reply)) => {
                    return Reply::from_reply(reply).ok_or(Error::UnexpectedReply)
                }
                Some(AwaitingReply::Failed(error)) => return Err(Error::RequestFailed(error)),
                Some(waiting) => {
                    self.awaiting_replies.insert(pending.sequence_number, waiting);
                    self.read_packet()?;
                }
            }
        }
    }

    /// Read one error, reply or event and file it where it belongs
    fn read_packet(&mut self) -> Result<(), Error> {
        match self.connection.read_u8()? {
            0 => {
                let code = self.connection.read_u8()?;
                let error = XError::from_le_bytes(&mut self.connection, code)?;
                if let Some(waiting @ AwaitingReply::NotReceived(_)) =
                    self.awaiting_replies.get_mut(&error.sequence_number)
                {
                    *waiting = AwaitingReply::Failed(error);
                } else {
                    self.error_queue.push_back(error);
                }
            }
            1 => self.read_reply()?,
            code => {
                let mut raw = [0u8; 32];
                raw[0] = code;
                self.connection.read_exact(&mut raw[1..])?;
                let event =
                    SomeEvent::from_le_bytes(raw).ok_or(Error::InvalidResponse("SomeEvent"))?;
                tracing::trace!(?event, "Received event");
                self.event_queue.push_back(event);
            }
        }
        Ok(())
    }

    fn read_reply(&mut self) -> Result<(), Error> {
        self.connection.skip(1)?;
        let sequence_number = SequenceNumber(self.connection.read_le_u16()?);
        let extra_words = self.connection.read_le_u32()? as usize;

        let Some(&AwaitingReply::NotReceived(reply_type)) =
            self.awaiting_replies.get(&sequence_number)
        else {
            tracing::warn!(
                sequence_number = sequence_number.value(),
                "Dropping reply nobody waits for"
            );
            // Rest of the 32-byte reply plus its variable part
            return self.connection.skip(24 + extra_words * 4);
        };

        let reply = SomeReply::from_le_bytes(&mut self.connection, reply_type)?;
        self.awaiting_replies
            .insert(sequence_number, AwaitingReply::Received(reply));
        Ok(())
    }

    /// Decode everything that arrived so far without blocking on the socket
    fn read_available(&mut self) -> Result<(), Error> {
        while self.connection.poll_readable()? {
            self.read_packet()?;
        }
        Ok(())
    }

    /// Next queued event, if any arrived. Does not block.
    pub fn next_event(&mut self) -> Result<Option<SomeEvent>, Error> {
        if self.event_queue.is_empty() {
            self.read_available()?;
        }
        Ok(self.event_queue.pop_front())
    }

    /// Block until an event matching `predicate` arrives. Events that don't match stay queued
    /// in order for [`Self::next_event`].
    pub fn wait_for_event(
        &mut self,
        predicate: impl Fn(&SomeEvent) -> bool,
    ) -> Result<SomeEvent, Error> {
        self.flush()?;
        let mut checked = 0;
        loop {
            let found = self.event_queue.range(checked..).position(&predicate);
            if let Some(event) = found.and_then(|idx| self.event_queue.remove(checked + idx)) {
                return Ok(event);
            }
            checked = self.event_queue.len();
            self.read_packet()?;
        }
    }

    /// Drain all errors from queue
    pub fn errors(&mut self) -> Drain<'_, XError> {
        self.error_queue.drain(..)
    }
}

/// In-memory server for exercising code built on [`XDisplay`] without an X server
#[cfg(any(test, feature = "test-utils"))]
impl XDisplay {
    /// Display on one 24-bit screen in native image byte order that, after connection setup,
    /// sends `server_bytes` and then nothing
    #[doc(hidden)]
    pub fn scripted(server_bytes: &[u8]) -> Result<Self, Error> {
        let byte_order = ImageByteOrder::native() as u8;
        let mut raw = setup::test_utils::setup_success(0xffff, byte_order);
        raw.extend_from_slice(server_bytes);
        Self::with_connection(XConnection::scripted(raw), None, 0)
    }

    /// Queue more bytes as if the server sent them
    #[doc(hidden)]
    pub fn script_incoming(&mut self, server_bytes: &[u8]) {
        self.connection.script(server_bytes);
    }

    /// Fail reads once queued server bytes are used up
    #[doc(hidden)]
    pub fn hang_up(&mut self) {
        self.connection.hang_up();
    }

    /// Requests flushed so far, starting with connection setup
    #[doc(hidden)]
    pub fn sent_bytes(&self) -> &[u8] {
        self.connection.sent()
    }
}
