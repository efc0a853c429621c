use crate::{connection::XConnection, error::Error, utils::wire_enum, SequenceNumber};
use std::fmt;

wire_enum! {
    #[repr(u8)]
    /// Error codes of the core protocol
    enum XErrorCode {
        Request = 1,
        Value = 2,
        Window = 3,
        Pixmap = 4,
        Atom = 5,
        Cursor = 6,
        Font = 7,
        Match = 8,
        Drawable = 9,
        Access = 10,
        Alloc = 11,
        Colormap = 12,
        GContext = 13,
        IDChoice = 14,
        Name = 15,
        Length = 16,
        Implementation = 17,
    }
}

impl XErrorCode {
    /// Whether `bad_value` field carries a meaningful resource id, atom or value
    pub fn has_bad_value(self) -> bool {
        !matches!(
            self,
            XErrorCode::Request
                | XErrorCode::Match
                | XErrorCode::Access
                | XErrorCode::Alloc
                | XErrorCode::Name
                | XErrorCode::Length
                | XErrorCode::Implementation
        )
    }
}

/// Error packet. Fixed 32 bytes, no variable part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XError {
    pub code: XErrorCode,
    pub sequence_number: SequenceNumber,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl XError {
    /// Reads the 30 bytes that follow the leading `0` and the error code
    pub(crate) fn from_le_bytes(conn: &mut XConnection, error_code: u8) -> Result<Self, Error> {
        let code =
            XErrorCode::try_from(error_code).map_err(|_| Error::InvalidResponse("XErrorCode"))?;
        let error = Self {
            code,
            sequence_number: SequenceNumber::from(conn.read_le_u16()?),
            bad_value: conn.read_le_u32()?,
            minor_opcode: conn.read_le_u16()?,
            major_opcode: conn.read_u8()?,
        };
        conn.skip(21)?;
        Ok(error)
    }
}

impl fmt::Display for XError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} error in request {}.{} (sequence number {})",
            self.code,
            self.major_opcode,
            self.minor_opcode,
            self.sequence_number.value()
        )?;
        if self.code.has_bad_value() {
            write!(f, ", bad value 0x{:x}", self.bad_value)?;
        }
        Ok(())
    }
}
