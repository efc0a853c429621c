//! Server response to the connection handshake

use crate::{
    connection::XConnection,
    error::Error,
    utils::{display_maybe_utf8, wire_enum, pad},
    VisualId, WindowId,
};
use std::fmt;

/// Fixed-size chunk of the setup response, decoded front to back
struct Block<const N: usize> {
    raw: [u8; N],
    at: usize,
}

impl<const N: usize> Block<N> {
    fn read(conn: &mut XConnection) -> Result<Self, Error> {
        let mut raw = [0u8; N];
        conn.read_exact(&mut raw)?;
        Ok(Self { raw, at: 0 })
    }

    fn u8(&mut self) -> u8 {
        self.at += 1;
        self.raw[self.at - 1]
    }

    fn u16(&mut self) -> u16 {
        self.at += 2;
        u16::from_le_bytes([self.raw[self.at - 2], self.raw[self.at - 1]])
    }

    fn u32(&mut self) -> u32 {
        self.at += 4;
        let raw = &self.raw[self.at - 4..self.at];
        u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
    }

    fn skip(&mut self, n: usize) -> &mut Self {
        self.at += n;
        self
    }
}

/// Reason the server gave for closing the connection right away
#[derive(Debug)]
pub struct SetupRefused {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub reason: Vec<u8>,
}

impl fmt::Display for SetupRefused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection refused by server with protocol {}.{}: {}",
            self.protocol_major_version,
            self.protocol_minor_version,
            display_maybe_utf8(&self.reason)
        )
    }
}

wire_enum! {
    #[repr(u8)]
    enum VisualClass {
        StaticGray = 0,
        GrayScale = 1,
        StaticColor = 2,
        PseudoColor = 3,
        TrueColor = 4,
        DirectColor = 5,
    }
}

#[derive(Debug, Clone)]
pub struct Visual {
    pub id: VisualId,
    pub class: VisualClass,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl Visual {
    fn read(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<24>::read(conn)?;
        let id = VisualId::from(block.u32());
        let class = VisualClass::try_from(block.u8())
            .map_err(|_| Error::InvalidResponse("VisualClass"))?;
        // bits-per-rgb-value and colormap-entries
        block.skip(3);

        Ok(Self {
            id,
            class,
            red_mask: block.u32(),
            green_mask: block.u32(),
            blue_mask: block.u32(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<Visual>,
}

impl Depth {
    fn read(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<8>::read(conn)?;
        let depth = block.u8();
        let visual_count = block.skip(1).u16();

        Ok(Self {
            depth,
            visuals: conn.read_list(visual_count as usize, Visual::read)?,
        })
    }
}

/// Root window and its properties. Only the parts needed to create a top-level window are kept.
#[derive(Debug, Clone)]
pub struct Screen {
    pub root: WindowId,
    pub default_colormap: u32,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub root_visual: VisualId,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

impl Screen {
    fn read(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<40>::read(conn)?;
        let root = WindowId::from(block.u32());
        let default_colormap = block.u32();
        let white_pixel = block.u32();
        let black_pixel = block.u32();
        // current-input-masks
        let width_in_pixels = block.skip(4).u16();
        let height_in_pixels = block.u16();
        // size in millimeters, min and max installed maps
        let root_visual = VisualId::from(block.skip(8).u32());
        // backing-stores and save-unders
        let root_depth = block.skip(2).u8();
        let depth_count = block.u8();

        Ok(Self {
            root,
            default_colormap,
            white_pixel,
            black_pixel,
            width_in_pixels,
            height_in_pixels,
            root_visual,
            root_depth,
            allowed_depths: conn.read_list(depth_count as usize, Depth::read)?,
        })
    }
}

/// Pixmap format for a depth, as announced in connection setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

impl Format {
    fn read(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<8>::read(conn)?;
        Ok(Self {
            depth: block.u8(),
            bits_per_pixel: block.u8(),
            scanline_pad: block.u8(),
        })
    }
}

wire_enum! {
    #[repr(u8)]
    /// Byte order of multi-byte pixels in images sent with `PutImage`
    enum ImageByteOrder {
        LSBFirst = 0,
        MSBFirst = 1,
    }
}

impl ImageByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LSBFirst
        } else {
            Self::MSBFirst
        }
    }
}

#[derive(Debug, Clone)]
pub struct Setup {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    /// In 4-byte units, including request header
    pub maximum_request_length: u16,
    pub image_byte_order: ImageByteOrder,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub vendor: Vec<u8>,
    pub pixmap_formats: Vec<Format>,
    pub screens: Vec<Screen>,
}

impl Setup {
    pub fn pixmap_format(&self, depth: u8) -> Option<Format> {
        self.pixmap_formats
            .iter()
            .copied()
            .find(|format| format.depth == depth)
    }
}

#[derive(Debug)]
pub(crate) enum SetupResponse {
    Refused(SetupRefused),
    Authenticate(Vec<u8>),
    Success(Setup),
}

impl SetupResponse {
    pub(crate) fn read(conn: &mut XConnection) -> Result<Self, Error> {
        match conn.read_u8()? {
            0 => Self::read_refused(conn),
            1 => Self::read_success(conn),
            2 => {
                let mut block = Block::<7>::read(conn)?;
                let reason_words = block.skip(5).u16();
                Ok(Self::Authenticate(
                    conn.read_bytes(reason_words as usize * 4)?,
                ))
            }
            _ => Err(Error::InvalidResponse("SetupResponse")),
        }
    }

    fn read_refused(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<7>::read(conn)?;
        let reason_len = block.u8() as usize;
        let protocol_major_version = block.u16();
        let protocol_minor_version = block.u16();
        let reason = conn.read_bytes(reason_len)?;
        conn.skip(pad(reason_len))?;

        Ok(Self::Refused(SetupRefused {
            protocol_major_version,
            protocol_minor_version,
            reason,
        }))
    }

    fn read_success(conn: &mut XConnection) -> Result<Self, Error> {
        let mut block = Block::<39>::read(conn)?;
        let protocol_major_version = block.skip(1).u16();
        let protocol_minor_version = block.u16();
        // length of additional data
        let release_number = block.skip(2).u32();
        let resource_id_base = block.u32();
        let resource_id_mask = block.u32();
        // motion-buffer-size
        let vendor_len = block.skip(4).u16() as usize;
        let maximum_request_length = block.u16();
        let screen_count = block.u8();
        let format_count = block.u8();
        let image_byte_order = ImageByteOrder::try_from(block.u8())
            .map_err(|_| Error::InvalidResponse("ImageByteOrder"))?;
        // bitmap format bit order, scanline unit and pad
        let min_keycode = block.skip(3).u8();
        let max_keycode = block.u8();

        let vendor = conn.read_bytes(vendor_len)?;
        conn.skip(pad(vendor_len))?;
        let pixmap_formats = conn.read_list(format_count as usize, Format::read)?;
        let screens = conn.read_list(screen_count as usize, Screen::read)?;

        Ok(Self::Success(Setup {
            protocol_major_version,
            protocol_minor_version,
            release_number,
            resource_id_base,
            resource_id_mask,
            maximum_request_length,
            image_byte_order,
            min_keycode,
            max_keycode,
            vendor,
            pixmap_formats,
            screens,
        }))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub(crate) mod test_utils {
    /// Bytes of a successful connection setup with single screen of depth 24 and 32 bpp pixmaps
    pub(crate) fn setup_success(maximum_request_length: u16, image_byte_order: u8) -> Vec<u8> {
        let vendor = b"Facet Test";
        let mut raw = vec![1u8, 0];
        raw.extend_from_slice(&11u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes()); // additional data length, unused by decoder
        raw.extend_from_slice(&12_101_004u32.to_le_bytes()); // release
        raw.extend_from_slice(&0x0060_0000u32.to_le_bytes()); // resource id base
        raw.extend_from_slice(&0x001f_ffffu32.to_le_bytes()); // resource id mask
        raw.extend_from_slice(&256u32.to_le_bytes()); // motion buffer
        raw.extend_from_slice(&(vendor.len() as u16).to_le_bytes());
        raw.extend_from_slice(&maximum_request_length.to_le_bytes());
        raw.push(1); // screens
        raw.push(2); // formats
        raw.push(image_byte_order);
        raw.extend_from_slice(&[0, 32, 32, 8, 255]);
        raw.extend_from_slice(&[0u8; 4]);
        raw.extend_from_slice(vendor);
        raw.extend_from_slice(&[0u8; 2]); // pad vendor to 12
        raw.extend_from_slice(&[1, 1, 32, 0, 0, 0, 0, 0]);
        raw.extend_from_slice(&[24, 32, 32, 0, 0, 0, 0, 0]);

        // screen
        raw.extend_from_slice(&0x3c5u32.to_le_bytes()); // root
        raw.extend_from_slice(&0x20u32.to_le_bytes()); // colormap
        raw.extend_from_slice(&0xffffffu32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&1920u16.to_le_bytes());
        raw.extend_from_slice(&1080u16.to_le_bytes());
        raw.extend_from_slice(&508u16.to_le_bytes());
        raw.extend_from_slice(&285u16.to_le_bytes());
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&0x21u32.to_le_bytes()); // root visual
        raw.extend_from_slice(&[0, 0, 24, 1]);

        // depth with one visual
        raw.extend_from_slice(&[24, 0]);
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&[0u8; 4]);
        raw.extend_from_slice(&0x21u32.to_le_bytes());
        raw.extend_from_slice(&[4, 8]);
        raw.extend_from_slice(&256u16.to_le_bytes());
        raw.extend_from_slice(&0xff0000u32.to_le_bytes());
        raw.extend_from_slice(&0x00ff00u32.to_le_bytes());
        raw.extend_from_slice(&0x0000ffu32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 4]);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_screen_and_visuals() {
        let mut conn = XConnection::scripted(test_utils::setup_success(0x1000, 1));
        let setup = match SetupResponse::read(&mut conn).unwrap() {
            SetupResponse::Success(setup) => setup,
            other => panic!("unexpected {:?}", other),
        };
        assert!(conn.is_drained());

        assert_eq!(setup.protocol_major_version, 11);
        assert_eq!(setup.resource_id_mask, 0x001f_ffff);
        assert_eq!(setup.image_byte_order, ImageByteOrder::MSBFirst);
        assert_eq!((setup.min_keycode, setup.max_keycode), (8, 255));
        assert_eq!(setup.pixmap_formats.len(), 2);

        let screen = &setup.screens[0];
        assert_eq!((screen.width_in_pixels, screen.height_in_pixels), (1920, 1080));
        assert_eq!(screen.root_visual, VisualId::from(0x21));
        assert_eq!(screen.root_depth, 24);

        let visual = &screen.allowed_depths[0].visuals[0];
        assert_eq!(visual.id, VisualId::from(0x21));
        assert_eq!(visual.red_mask, 0xff0000);
        assert_eq!(visual.blue_mask, 0x0000ff);
    }

    #[test]
    fn authenticate_reason() {
        let mut raw = vec![2u8, 0, 0, 0, 0, 0];
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(b"bad!");

        let mut conn = XConnection::scripted(raw);
        assert!(matches!(
            SetupResponse::read(&mut conn).unwrap(),
            SetupResponse::Authenticate(reason) if reason == b"bad!"
        ));
    }

    #[test]
    fn unknown_status_is_invalid() {
        let mut conn = XConnection::scripted(vec![7u8; 8]);
        assert!(matches!(
            SetupResponse::read(&mut conn),
            Err(Error::InvalidResponse("SetupResponse"))
        ));
    }
}
