use crate::{atoms::AtomId, utils::bitmask, WindowId};

/// Set in event code when event was generated with `SendEvent` request, i.e. by window manager
pub const SEND_EVENT_FLAG: u8 = 0x80;

#[inline]
fn le_u16(raw: &[u8; 32], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

#[inline]
fn le_i16(raw: &[u8; 32], offset: usize) -> i16 {
    i16::from_le_bytes([raw[offset], raw[offset + 1]])
}

#[inline]
fn le_u32(raw: &[u8; 32], offset: usize) -> u32 {
    u32::from_le_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}

fn invalid_bool(value: u8) -> bool {
    value != 0 && value != 1
}

/// Shared layout of `KeyPress`, `KeyRelease`, `ButtonPress`, `ButtonRelease` and `MotionNotify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    /// Keycode for keys, button number for buttons
    pub detail: u8,
    pub sequence_number: u16,
    pub time: u32,
    pub root: WindowId,
    pub event: WindowId,
    pub child: u32,
    pub root_x: i16,
    pub root_y: i16,
    pub event_x: i16,
    pub event_y: i16,
    pub state: u16,
    pub same_screen: bool,
}

impl InputEvent {
    pub(crate) fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        if invalid_bool(raw[30]) {
            return None;
        }

        Some(Self {
            detail: raw[1],
            sequence_number: le_u16(&raw, 2),
            time: le_u32(&raw, 4),
            root: WindowId::from(le_u32(&raw, 8)),
            event: WindowId::from(le_u32(&raw, 12)),
            child: le_u32(&raw, 16),
            root_x: le_i16(&raw, 20),
            root_y: le_i16(&raw, 22),
            event_x: le_i16(&raw, 24),
            event_y: le_i16(&raw, 26),
            state: le_u16(&raw, 28),
            same_screen: raw[30] == 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expose {
    pub sequence_number: u16,
    pub window: WindowId,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    /// Number of `Expose` events that follow
    pub count: u16,
}

impl Expose {
    pub(crate) fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        Some(Self {
            sequence_number: le_u16(&raw, 2),
            window: WindowId::from(le_u32(&raw, 4)),
            x: le_u16(&raw, 8),
            y: le_u16(&raw, 10),
            width: le_u16(&raw, 12),
            height: le_u16(&raw, 14),
            count: le_u16(&raw, 16),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNotify {
    pub sequence_number: u16,
    pub event: WindowId,
    pub window: WindowId,
    pub override_redirect: bool,
}

impl MapNotify {
    pub(crate) fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        if invalid_bool(raw[12]) {
            return None;
        }

        Some(Self {
            sequence_number: le_u16(&raw, 2),
            event: WindowId::from(le_u32(&raw, 4)),
            window: WindowId::from(le_u32(&raw, 8)),
            override_redirect: raw[12] == 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureNotify {
    pub sequence_number: u16,
    pub event: WindowId,
    pub window: WindowId,
    pub above_sibling: u32,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

impl ConfigureNotify {
    pub(crate) fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        if invalid_bool(raw[26]) {
            return None;
        }

        Some(Self {
            sequence_number: le_u16(&raw, 2),
            event: WindowId::from(le_u32(&raw, 4)),
            window: WindowId::from(le_u32(&raw, 8)),
            above_sibling: le_u32(&raw, 12),
            x: le_i16(&raw, 16),
            y: le_i16(&raw, 18),
            width: le_u16(&raw, 20),
            height: le_u16(&raw, 22),
            border_width: le_u16(&raw, 24),
            override_redirect: raw[26] == 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub format: u8,
    pub sequence_number: u16,
    pub window: WindowId,
    pub message_type: AtomId,
    pub data: [u8; 20],
}

impl ClientMessage {
    pub(crate) fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        let mut data = [0u8; 20];
        data.copy_from_slice(&raw[12..32]);

        Some(Self {
            format: raw[1],
            sequence_number: le_u16(&raw, 2),
            window: WindowId::from(le_u32(&raw, 4)),
            message_type: AtomId::from(le_u32(&raw, 8)),
            data,
        })
    }

    /// First 32-bit item of data. For `WM_PROTOCOLS` messages this is the protocol atom.
    pub fn first_u32(&self) -> u32 {
        u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }
}

/// Event this crate does not decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent {
    pub event_code: u8,
    pub sequence_number: u16,
    pub raw: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SomeEvent {
    KeyPress(InputEvent),
    KeyRelease(InputEvent),
    ButtonPress(InputEvent),
    ButtonRelease(InputEvent),
    MotionNotify(InputEvent),
    Expose(Expose),
    MapNotify(MapNotify),
    ConfigureNotify(ConfigureNotify),
    ClientMessage(ClientMessage),
    UnknownEvent(UnknownEvent),
}

impl SomeEvent {
    /// Decode 32 bytes of event. Events that came through `SendEvent` are decoded the same as
    /// ones generated by the server.
    pub fn from_le_bytes(raw: [u8; 32]) -> Option<Self> {
        let event_code = raw[0] & !SEND_EVENT_FLAG;

        match event_code {
            2 => Some(Self::KeyPress(InputEvent::from_le_bytes(raw)?)),
            3 => Some(Self::KeyRelease(InputEvent::from_le_bytes(raw)?)),
            4 => Some(Self::ButtonPress(InputEvent::from_le_bytes(raw)?)),
            5 => Some(Self::ButtonRelease(InputEvent::from_le_bytes(raw)?)),
            6 => Some(Self::MotionNotify(InputEvent::from_le_bytes(raw)?)),
            12 => Some(Self::Expose(Expose::from_le_bytes(raw)?)),
            19 => Some(Self::MapNotify(MapNotify::from_le_bytes(raw)?)),
            22 => Some(Self::ConfigureNotify(ConfigureNotify::from_le_bytes(raw)?)),
            33 => Some(Self::ClientMessage(ClientMessage::from_le_bytes(raw)?)),
            _ => Some(Self::UnknownEvent(UnknownEvent {
                event_code,
                sequence_number: le_u16(&raw, 2),
                raw,
            })),
        }
    }
}

bitmask! {
    /// Event classes a window selects with its event-mask
    bitmask EventType {
        KEY_PRESS = 0x00000001,
        KEY_RELEASE = 0x00000002,
        BUTTON_PRESS = 0x00000004,
        BUTTON_RELEASE = 0x00000008,
        POINTER_MOTION = 0x00000040,
        EXPOSURE = 0x00008000,
        STRUCTURE_NOTIFY = 0x00020000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_button_press() {
        let mut raw = [0u8; 32];
        raw[0] = 4;
        raw[1] = 3;
        raw[12..16].copy_from_slice(&0x400001u32.to_le_bytes());
        raw[24..26].copy_from_slice(&(-5i16).to_le_bytes());
        raw[26..28].copy_from_slice(&120i16.to_le_bytes());
        raw[30] = 1;

        let Some(SomeEvent::ButtonPress(event)) = SomeEvent::from_le_bytes(raw) else {
            panic!("expected ButtonPress");
        };
        assert_eq!(event.detail, 3);
        assert_eq!(event.event, WindowId::from(0x400001));
        assert_eq!(event.event_x, -5);
        assert_eq!(event.event_y, 120);
        assert!(event.same_screen);
    }

    #[test]
    fn reject_invalid_bool() {
        let mut raw = [0u8; 32];
        raw[0] = 2;
        raw[30] = 7;
        assert_eq!(SomeEvent::from_le_bytes(raw), None);
    }

    #[test]
    fn decode_sent_client_message() {
        let mut raw = [0u8; 32];
        raw[0] = 33 | SEND_EVENT_FLAG;
        raw[1] = 32;
        raw[8..12].copy_from_slice(&301u32.to_le_bytes());
        raw[12..16].copy_from_slice(&302u32.to_le_bytes());

        let Some(SomeEvent::ClientMessage(event)) = SomeEvent::from_le_bytes(raw) else {
            panic!("expected ClientMessage");
        };
        assert_eq!(event.format, 32);
        assert_eq!(event.message_type, AtomId::from(301));
        assert_eq!(event.first_u32(), 302);
    }

    #[test]
    fn decode_configure_notify() {
        let mut raw = [0u8; 32];
        raw[0] = 22;
        raw[20..22].copy_from_slice(&1024u16.to_le_bytes());
        raw[22..24].copy_from_slice(&768u16.to_le_bytes());

        let Some(SomeEvent::ConfigureNotify(event)) = SomeEvent::from_le_bytes(raw) else {
            panic!("expected ConfigureNotify");
        };
        assert_eq!((event.width, event.height), (1024, 768));
        assert!(!event.override_redirect);
    }

    #[test]
    fn unknown_events_are_kept() {
        let mut raw = [0u8; 32];
        raw[0] = 14; // NoExposure
        raw[2] = 9;
        let Some(SomeEvent::UnknownEvent(event)) = SomeEvent::from_le_bytes(raw) else {
            panic!("expected UnknownEvent");
        };
        assert_eq!(event.event_code, 14);
        assert_eq!(event.sequence_number, 9);
    }
}
