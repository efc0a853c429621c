use crate::{atoms::AtomId, connection::XConnection, error::Error, xerror::XError};

/// Reply type that can be taken out of [`SomeReply`]
pub trait XReply: Sized {
    fn from_reply(reply: SomeReply) -> Option<Self>;
}

/// Kind of reply the server will send for a request, recorded when the request is sent so the
/// reply can be decoded when it arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyType {
    InternAtom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SomeReply {
    InternAtom(InternAtom),
}

impl SomeReply {
    /// Bytes must start after the reply length field, header is decoded by the caller
    pub(crate) fn from_le_bytes(
        conn: &mut XConnection,
        reply_type: ReplyType,
    ) -> Result<Self, Error> {
        match reply_type {
            ReplyType::InternAtom => Ok(Self::InternAtom(InternAtom::from_le_bytes(conn)?)),
        }
    }
}

/// State of a request that expects a reply
#[derive(Debug, Clone)]
pub(crate) enum AwaitingReply {
    NotReceived(ReplyType),
    Received(SomeReply),
    Failed(XError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternAtom {
    /// `None` if the atom does not exist and request had `only_if_exists` set
    pub atom: Option<AtomId>,
}

impl InternAtom {
    fn from_le_bytes(conn: &mut XConnection) -> Result<Self, Error> {
        let atom = match conn.read_le_u32()? {
            0 => None,
            atom => Some(AtomId::from(atom)),
        };
        conn.skip(20)?;

        Ok(Self { atom })
    }
}

impl XReply for InternAtom {
    fn from_reply(reply: SomeReply) -> Option<Self> {
        let SomeReply::InternAtom(reply) = reply;
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intern_atom_reply(atom: u32) -> Vec<u8> {
        let mut raw = atom.to_le_bytes().to_vec();
        raw.extend_from_slice(&[0u8; 20]);
        raw
    }

    #[test]
    fn decode_intern_atom() {
        let mut conn = XConnection::scripted(intern_atom_reply(301));
        let reply = SomeReply::from_le_bytes(&mut conn, ReplyType::InternAtom).unwrap();
        assert_eq!(
            InternAtom::from_reply(reply),
            Some(InternAtom {
                atom: Some(AtomId::from(301))
            })
        );
        assert!(conn.is_drained());
    }

    #[test]
    fn decode_missing_atom() {
        let mut conn = XConnection::scripted(intern_atom_reply(0));
        let reply = SomeReply::from_le_bytes(&mut conn, ReplyType::InternAtom).unwrap();
        assert_eq!(reply, SomeReply::InternAtom(InternAtom { atom: None }));
    }
}
