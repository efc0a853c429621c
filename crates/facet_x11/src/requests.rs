//! Core protocol requests used to set up a window and draw into it. Everything is encoded
//! little-endian, as announced in [`InitializeConnection`].

use crate::{
    atoms::AtomId,
    events::EventType,
    replies::ReplyType,
    utils::{wire_enum, pad},
    Drawable, GContextId, WindowClass, WindowId, WindowVisual,
};
use std::io::{self, Write};

pub(crate) mod opcodes {
    pub const CREATE_WINDOW: u8 = 1;
    pub const DESTROY_WINDOW: u8 = 4;
    pub const MAP_WINDOW: u8 = 8;
    pub const INTERN_ATOM: u8 = 16;
    pub const CHANGE_PROPERTY: u8 = 18;
    pub const CREATE_GC: u8 = 55;
    pub const FREE_GC: u8 = 60;
    pub const PUT_IMAGE: u8 = 72;
}

/// Size of [`PutImage`] request without image data, in bytes
pub const PUT_IMAGE_HEADER_SIZE: usize = 24;

pub trait Encode {
    fn encode(&self, w: &mut impl Write) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct NoReply;

pub trait XRequest: Encode {
    type Reply;

    /// `None` if server does not send a reply for this request
    const REPLY_TYPE: Option<ReplyType>;
}

macro_rules! no_reply {
    ($($request:ty),* $(,)?) => {
        $(impl XRequest for $request {
            type Reply = NoReply;

            const REPLY_TYPE: Option<ReplyType> = None;
        })*
    };
}

/// Little-endian primitives shared by all request encoders
trait WriteLe: Write {
    fn put_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    fn put_u16(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn put_i16(&mut self, value: i16) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn put_u32(&mut self, value: impl Into<u32>) -> io::Result<()> {
        self.write_all(&value.into().to_le_bytes())
    }

    /// Opcode, one byte of request specific data and total length in 4-byte units
    fn put_header(&mut self, opcode: u8, data: u8, words: usize) -> io::Result<()> {
        let words = u16::try_from(words)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "request too long"))?;
        self.put_u8(opcode)?;
        self.put_u8(data)?;
        self.put_u16(words)
    }

    /// `bytes` followed by zeros up to the next 4-byte boundary
    fn put_padded(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.write_all(&[0u8; 3][..pad(bytes.len())])
    }
}

impl<W: Write + ?Sized> WriteLe for W {}

/// Length of `len` bytes after padding, in 4-byte units
fn words(len: usize) -> usize {
    (len + pad(len)) / 4
}

/// First bytes sent on a new connection
#[derive(Debug, Clone)]
pub(crate) struct InitializeConnection {
    pub authorization_protocol_name: Vec<u8>,
    pub authorization_protocol_data: Vec<u8>,
}

impl Encode for InitializeConnection {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        // 'l' selects little-endian for the rest of the session
        w.put_u8(b'l')?;
        w.put_u8(0)?;
        w.put_u16(11)?;
        w.put_u16(0)?;
        w.put_u16(self.authorization_protocol_name.len() as u16)?;
        w.put_u16(self.authorization_protocol_data.len() as u16)?;
        w.put_u16(0)?;
        w.put_padded(&self.authorization_protocol_name)?;
        w.put_padded(&self.authorization_protocol_data)
    }
}

/// Optional values of [`CreateWindow`]. Only the ones needed for a plain top-level window.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowAttributes {
    pub background_pixel: Option<u32>,
    pub border_pixel: Option<u32>,
    pub event_mask: Option<EventType>,
}

impl WindowAttributes {
    /// Set values with their value-mask bit, in the order the server expects them
    fn set_values(&self) -> impl Iterator<Item = (u32, u32)> {
        [
            (1 << 1, self.background_pixel),
            (1 << 3, self.border_pixel),
            (1 << 11, self.event_mask.map(u32::from)),
        ]
        .into_iter()
        .filter_map(|(bit, value)| Some((bit, value?)))
    }
}

#[derive(Debug, Clone)]
pub struct CreateWindow {
    pub depth: u8,
    pub wid: WindowId,
    pub parent: WindowId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub window_class: WindowClass,
    pub visual: WindowVisual,
    pub attributes: WindowAttributes,
}

impl Encode for CreateWindow {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        let value_mask = self.attributes.set_values().fold(0, |mask, (bit, _)| mask | bit);
        let value_count = self.attributes.set_values().count();

        w.put_header(opcodes::CREATE_WINDOW, self.depth, 8 + value_count)?;
        w.put_u32(self.wid)?;
        w.put_u32(self.parent)?;
        w.put_i16(self.x)?;
        w.put_i16(self.y)?;
        for dimension in [self.width, self.height, self.border_width] {
            w.put_u16(dimension)?;
        }
        w.put_u16(self.window_class as u16)?;
        w.put_u32(self.visual.value())?;
        w.put_u32(value_mask)?;
        for (_, value) in self.attributes.set_values() {
            w.put_u32(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DestroyWindow {
    pub window: WindowId,
}

impl Encode for DestroyWindow {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(opcodes::DESTROY_WINDOW, 0, 2)?;
        w.put_u32(self.window)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MapWindow {
    pub window: WindowId,
}

impl Encode for MapWindow {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(opcodes::MAP_WINDOW, 0, 2)?;
        w.put_u32(self.window)
    }
}

/// Look up (or create) the atom with given name
#[derive(Debug, Clone)]
pub struct InternAtom {
    pub only_if_exists: bool,
    pub name: Vec<u8>,
}

impl Encode for InternAtom {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(
            opcodes::INTERN_ATOM,
            self.only_if_exists as u8,
            2 + words(self.name.len()),
        )?;
        w.put_u16(self.name.len() as u16)?;
        w.put_u16(0)?;
        w.put_padded(&self.name)
    }
}

impl XRequest for InternAtom {
    type Reply = crate::replies::InternAtom;

    const REPLY_TYPE: Option<ReplyType> = Some(ReplyType::InternAtom);
}

wire_enum! {
    #[repr(u8)]
    enum PropertyMode {
        Replace = 0,
        Prepend = 1,
        Append = 2,
    }
}

wire_enum! {
    #[repr(u8)]
    /// Bits per element of property data
    enum PropertyFormat {
        Format8 = 8,
        Format16 = 16,
        Format32 = 32,
    }
}

#[derive(Debug, Clone)]
pub struct ChangeProperty {
    pub mode: PropertyMode,
    pub window: WindowId,
    pub property: AtomId,
    pub type_: AtomId,
    pub format: PropertyFormat,
    /// Already encoded, length must be a multiple of the element size
    pub data: Vec<u8>,
}

impl Encode for ChangeProperty {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        let elements = self.data.len() / (self.format as usize / 8);

        w.put_header(
            opcodes::CHANGE_PROPERTY,
            self.mode as u8,
            6 + words(self.data.len()),
        )?;
        w.put_u32(self.window)?;
        w.put_u32(self.property)?;
        w.put_u32(self.type_)?;
        w.put_u8(self.format as u8)?;
        w.write_all(&[0u8; 3])?;
        w.put_u32(elements as u32)?;
        w.put_padded(&self.data)
    }
}

/// Value-mask bit of `graphics-exposures`
const GC_GRAPHICS_EXPOSURES: u32 = 1 << 16;

/// Graphics context with default settings, apart from `graphics-exposures` that can be turned
/// off to stop the server from sending `NoExposure` after every image copy
#[derive(Debug, Clone, Copy)]
pub struct CreateGC {
    pub cid: GContextId,
    pub drawable: Drawable,
    pub graphics_exposures: bool,
}

impl Encode for CreateGC {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(opcodes::CREATE_GC, 0, 5)?;
        w.put_u32(self.cid)?;
        w.put_u32(self.drawable.value())?;
        w.put_u32(GC_GRAPHICS_EXPOSURES)?;
        w.put_u32(self.graphics_exposures)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FreeGC {
    pub gc: GContextId,
}

impl Encode for FreeGC {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(opcodes::FREE_GC, 0, 2)?;
        w.put_u32(self.gc)
    }
}

wire_enum! {
    #[repr(u8)]
    enum ImageFormat {
        Bitmap = 0,
        XYPixmap = 1,
        ZPixmap = 2,
    }
}

/// Borrows image data for the time it takes to write the request out
#[derive(Debug, Clone)]
pub struct PutImage<'data> {
    pub format: ImageFormat,
    pub drawable: Drawable,
    pub gc: GContextId,
    pub width: u16,
    pub height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub left_pad: u8,
    /// With [`ImageFormat::ZPixmap`] it must match depth of `drawable`
    pub depth: u8,
    pub data: &'data [u8],
}

impl<'data> PutImage<'data> {
    /// Request length in 4-byte units, as it goes on the wire
    pub fn request_len(&self) -> usize {
        PUT_IMAGE_HEADER_SIZE / 4 + words(self.data.len())
    }
}

impl<'data> Encode for PutImage<'data> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.put_header(opcodes::PUT_IMAGE, self.format as u8, self.request_len())?;
        w.put_u32(self.drawable.value())?;
        w.put_u32(self.gc)?;
        w.put_u16(self.width)?;
        w.put_u16(self.height)?;
        w.put_i16(self.dst_x)?;
        w.put_i16(self.dst_y)?;
        w.put_u8(self.left_pad)?;
        w.put_u8(self.depth)?;
        w.put_u16(0)?;
        w.put_padded(self.data)
    }
}

no_reply!(
    CreateWindow,
    DestroyWindow,
    MapWindow,
    ChangeProperty,
    CreateGC,
    FreeGC,
    PutImage<'_>,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &impl Encode) -> Vec<u8> {
        let mut buf = Vec::new();
        request.encode(&mut buf).unwrap();
        buf
    }

    fn u32_at(raw: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
    }

    #[test]
    fn create_window_length_counts_values() {
        let raw = encode(&CreateWindow {
            depth: 24,
            wid: WindowId::from(0x200001),
            parent: WindowId::from(0x1e7),
            x: 10,
            y: 10,
            width: 800,
            height: 600,
            border_width: 1,
            window_class: WindowClass::InputOutput,
            visual: WindowVisual::CopyFromParent,
            attributes: WindowAttributes {
                background_pixel: Some(0xffffff),
                event_mask: Some(EventType::KEY_PRESS | EventType::EXPOSURE),
                ..Default::default()
            },
        });

        assert_eq!(raw.len(), 4 * 10);
        assert_eq!(raw[0], opcodes::CREATE_WINDOW);
        assert_eq!(u16::from_le_bytes([raw[2], raw[3]]), 10);
        assert_eq!(u32_at(&raw, 4), 0x200001);
        // background-pixel (bit 1) and event-mask (bit 11)
        assert_eq!(u32_at(&raw, 28), 0b1000_0000_0010);
        assert_eq!(u32_at(&raw, 32), 0xffffff);
        assert_eq!(u32_at(&raw, 36), 0x8001);
    }

    #[test]
    fn intern_atom_is_padded() {
        let raw = encode(&InternAtom {
            only_if_exists: false,
            name: b"WM_PROTOCOLS".to_vec(),
        });
        assert_eq!(raw.len(), 8 + 12);
        assert_eq!(u16::from_le_bytes([raw[2], raw[3]]), 5);

        let raw = encode(&InternAtom {
            only_if_exists: true,
            name: b"WM_DELETE_WINDOW".to_vec(),
        });
        assert_eq!(raw[1], 1);
        assert_eq!(raw.len(), 8 + 16);
    }

    #[test]
    fn change_property_counts_format_units() {
        let raw = encode(&ChangeProperty {
            mode: PropertyMode::Replace,
            window: WindowId::from(1),
            property: AtomId::from(300),
            type_: AtomId::ATOM,
            format: PropertyFormat::Format32,
            data: 301u32.to_le_bytes().to_vec(),
        });
        assert_eq!(raw.len(), 28);
        assert_eq!(u16::from_le_bytes([raw[2], raw[3]]), 7);
        assert_eq!(u32_at(&raw, 20), 1);

        let raw = encode(&ChangeProperty {
            mode: PropertyMode::Replace,
            window: WindowId::from(1),
            property: AtomId::WM_NAME,
            type_: AtomId::STRING,
            format: PropertyFormat::Format8,
            data: b"Facet".to_vec(),
        });
        assert_eq!(raw.len(), 24 + 8);
        assert_eq!(u32_at(&raw, 20), 5);
        assert_eq!(&raw[24..], b"Facet\0\0\0");
    }

    #[test]
    fn put_image_header() {
        let data = [0u8; 16];
        let request = PutImage {
            format: ImageFormat::ZPixmap,
            drawable: Drawable::Window(WindowId::from(7)),
            gc: GContextId::from(8),
            width: 2,
            height: 2,
            dst_x: 0,
            dst_y: 3,
            left_pad: 0,
            depth: 24,
            data: &data,
        };
        let raw = encode(&request);

        assert_eq!(raw.len(), PUT_IMAGE_HEADER_SIZE + 16);
        assert_eq!(request.request_len(), 10);
        assert_eq!(raw[1], ImageFormat::ZPixmap as u8);
        assert_eq!(u16::from_le_bytes([raw[18], raw[19]]), 3);
        assert_eq!(raw[21], 24);
    }

    #[test]
    fn oversized_request_is_rejected() {
        let data = vec![0u8; 0x40000 * 4];
        let request = PutImage {
            format: ImageFormat::ZPixmap,
            drawable: Drawable::Window(WindowId::from(7)),
            gc: GContextId::from(8),
            width: 0x100,
            height: 0x1000,
            dst_x: 0,
            dst_y: 0,
            left_pad: 0,
            depth: 24,
            data: &data,
        };
        let mut buf = Vec::new();
        assert!(request.encode(&mut buf).is_err());
    }
}
