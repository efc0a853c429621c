use crate::error::Error;
use std::{fs, io};

/// Authorization scheme understood by every X server we are likely to meet
pub const MIT_MAGIC_COOKIE: &[u8] = b"MIT-MAGIC-COOKIE-1";

const FAMILY_LOCAL: u16 = 256;
const FAMILY_WILD: u16 = 0xffff;

/// Single entry of an Xauthority file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XAuth {
    pub family: u16,
    pub address: Vec<u8>,
    /// Display number as decimal ASCII
    pub number: Vec<u8>,
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

impl XAuth {
    /// Entries are big-endian: family, then four length-prefixed strings
    fn parse_entry(raw: &mut &[u8]) -> Option<Self> {
        fn take<'a>(raw: &mut &'a [u8], len: usize) -> Option<&'a [u8]> {
            if raw.len() < len {
                return None;
            }
            let (head, tail) = raw.split_at(len);
            *raw = tail;
            Some(head)
        }
        fn take_u16(raw: &mut &[u8]) -> Option<u16> {
            take(raw, 2).map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
        }
        fn take_field(raw: &mut &[u8]) -> Option<Vec<u8>> {
            let len = take_u16(raw)? as usize;
            take(raw, len).map(<[u8]>::to_vec)
        }

        Some(Self {
            family: take_u16(raw)?,
            address: take_field(raw)?,
            number: take_field(raw)?,
            name: take_field(raw)?,
            data: take_field(raw)?,
        })
    }

    /// Decode all entries of an Xauthority file
    pub fn entries_from_bytes(mut raw: &[u8]) -> Option<Vec<Self>> {
        let mut entries = Vec::new();
        while !raw.is_empty() {
            entries.push(Self::parse_entry(&mut raw)?);
        }
        Some(entries)
    }

    fn matches_display(&self, display_sequence: u32) -> bool {
        let number_matches = self.number.is_empty()
            || self.number == display_sequence.to_string().as_bytes();
        let family_matches = self.family == FAMILY_LOCAL || self.family == FAMILY_WILD;
        number_matches && family_matches && self.name == MIT_MAGIC_COOKIE
    }

    /// Pick the cookie for a local display. Falls back to the first cookie for that display
    /// number when no entry is marked as local.
    pub fn select(entries: Vec<Self>, display_sequence: u32) -> Option<Self> {
        let number = display_sequence.to_string();
        let (local, rest): (Vec<Self>, Vec<Self>) = entries
            .into_iter()
            .partition(|entry| entry.matches_display(display_sequence));

        local.into_iter().next().or_else(|| {
            rest.into_iter()
                .find(|entry| entry.number == number.as_bytes() && entry.name == MIT_MAGIC_COOKIE)
        })
    }

    pub fn from_file(path: &str, display_sequence: u32) -> Result<Option<Self>, Error> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::CouldNotReadXAuthFile(path.to_string(), err)),
        };
        let entries =
            Self::entries_from_bytes(&raw).ok_or(Error::InvalidXAuthFile(path.to_string()))?;
        Ok(Self::select(entries, display_sequence))
    }

    fn home_path() -> Option<String> {
        std::env::var("HOME")
            .ok()
            .map(|home| format!("{home}/.Xauthority"))
    }

    /// Read `$XAUTHORITY` (or `~/.Xauthority`). Missing file means no authorization which
    /// some servers accept for local connections.
    pub fn from_env(display_sequence: u32) -> Result<Option<Self>, Error> {
        let file_path = match std::env::var("XAUTHORITY") {
            Ok(file_path) if !file_path.is_empty() => file_path,
            _ => match Self::home_path() {
                Some(file_path) => file_path,
                None => return Ok(None),
            },
        };
        Self::from_file(&file_path, display_sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(family: u16, number: &[u8], name: &[u8], data: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&family.to_be_bytes());
        for field in [b"host".as_slice(), number, name, data] {
            raw.extend_from_slice(&(field.len() as u16).to_be_bytes());
            raw.extend_from_slice(field);
        }
        raw
    }

    #[test]
    fn decode_many_entries() {
        let mut raw = encode(FAMILY_LOCAL, b"0", MIT_MAGIC_COOKIE, &[1, 2, 3]);
        raw.extend(encode(FAMILY_LOCAL, b"1", MIT_MAGIC_COOKIE, &[4, 5, 6]));

        let entries = XAuth::entries_from_bytes(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].number, b"1");
        assert_eq!(entries[1].data, vec![4, 5, 6]);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let raw = encode(FAMILY_LOCAL, b"0", MIT_MAGIC_COOKIE, &[1, 2, 3]);
        assert!(XAuth::entries_from_bytes(&raw[..raw.len() - 1]).is_none());
    }

    #[test]
    fn select_prefers_local_entry_for_display() {
        let mut raw = encode(0, b"1", MIT_MAGIC_COOKIE, &[9]);
        raw.extend(encode(FAMILY_LOCAL, b"0", MIT_MAGIC_COOKIE, &[1]));
        raw.extend(encode(FAMILY_LOCAL, b"1", MIT_MAGIC_COOKIE, &[2]));
        let entries = XAuth::entries_from_bytes(&raw).unwrap();

        let selected = XAuth::select(entries, 1).unwrap();
        assert_eq!(selected.data, vec![2]);
    }

    #[test]
    fn select_falls_back_to_matching_number() {
        let raw = encode(0, b"3", MIT_MAGIC_COOKIE, &[7]);
        let entries = XAuth::entries_from_bytes(&raw).unwrap();

        assert_eq!(XAuth::select(entries.clone(), 3).unwrap().data, vec![7]);
        assert!(XAuth::select(entries, 4).is_none());
    }
}
