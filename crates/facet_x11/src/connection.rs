use crate::{error::Error, requests::Encode};
use std::{
    collections::VecDeque,
    fmt,
    io::{self, Read, Write},
    os::unix::net::UnixStream,
    str::FromStr,
};

const SOCKET_DIR: &str = "/tmp/.X11-unix";

/// Bytes taken from the socket in one read
const READ_CHUNK: usize = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Block,
    Poll,
}

/// Where server bytes come from and where requests go
enum Transport {
    Unix(UnixStream),
    /// Server that sends exactly what was queued in `incoming` and records every request
    #[cfg(any(test, feature = "test-utils"))]
    Scripted { sent: Vec<u8>, hung_up: bool },
}

impl Transport {
    /// `Ok(0)` means the server hung up
    fn receive(&mut self, chunk: &mut [u8], wait: Wait) -> io::Result<usize> {
        match self {
            Transport::Unix(stream) if wait == Wait::Poll => stream.read(chunk),
            Transport::Unix(stream) => {
                stream.set_nonblocking(false)?;
                let received = stream.read(chunk);
                stream.set_nonblocking(true)?;
                received
            }
            #[cfg(any(test, feature = "test-utils"))]
            Transport::Scripted { hung_up: true, .. } => Ok(0),
            #[cfg(any(test, feature = "test-utils"))]
            Transport::Scripted { .. } if wait == Wait::Poll => {
                Err(io::ErrorKind::WouldBlock.into())
            }
            #[cfg(any(test, feature = "test-utils"))]
            Transport::Scripted { .. } => Ok(0),
        }
    }

    /// Socket stays nonblocking for reads, so writes retry until everything is taken
    fn transmit(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        match self {
            Transport::Unix(stream) => {
                while !bytes.is_empty() {
                    match stream.write(bytes) {
                        Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                        Ok(written) => bytes = &bytes[written..],
                        Err(err)
                            if matches!(
                                err.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                            ) =>
                        {
                            std::thread::yield_now()
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            }
            #[cfg(any(test, feature = "test-utils"))]
            Transport::Scripted { sent, .. } => {
                sent.extend_from_slice(bytes);
                Ok(())
            }
        }
    }
}

/// Byte level connection to the X server. Requests are buffered until [`XConnection::flush`],
/// replies and events are buffered as they are read.
pub struct XConnection {
    transport: Transport,
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
    chunk: Box<[u8]>,
}

impl XConnection {
    fn from_stream(stream: UnixStream) -> Result<Self, Error> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            transport: Transport::Unix(stream),
            incoming: VecDeque::new(),
            outgoing: Vec::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        })
    }

    /// Connection that reads `data` and nothing more
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn scripted(data: impl Into<VecDeque<u8>>) -> Self {
        Self {
            transport: Transport::Scripted {
                sent: Vec::new(),
                hung_up: false,
            },
            incoming: data.into(),
            outgoing: Vec::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Queue more server bytes on a scripted connection
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn script(&mut self, data: &[u8]) {
        self.incoming.extend(data);
    }

    /// Make a scripted connection fail every read once buffered bytes run out
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn hang_up(&mut self) {
        if let Transport::Scripted { hung_up, .. } = &mut self.transport {
            *hung_up = true;
        }
    }

    /// Everything flushed to a scripted connection so far
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn sent(&self) -> &[u8] {
        match &self.transport {
            Transport::Scripted { sent, .. } => sent,
            Transport::Unix(_) => &[],
        }
    }

    /// Bytes of requests not flushed yet
    #[cfg(test)]
    pub(crate) fn outgoing(&self) -> &[u8] {
        &self.outgoing
    }

    #[cfg(test)]
    pub(crate) fn is_drained(&self) -> bool {
        self.incoming.is_empty()
    }

    /// Open a connection with details from `$DISPLAY` environment variable
    pub fn open() -> Result<(Self, DisplayVar), Error> {
        let display = DisplayVar::from_env()?;
        let connection = Self::with_display(&display)?;
        Ok((connection, display))
    }

    pub fn with_display(display: &DisplayVar) -> Result<Self, Error> {
        if !display.is_local() {
            return Err(Error::UnsupportedTransport(display.to_string()));
        }

        let socket_path = format!("{}/X{}", SOCKET_DIR, display.display_sequence);
        match UnixStream::connect(&socket_path) {
            Ok(stream) => Self::from_stream(stream),
            Err(err) => Err(Error::CouldNotOpenUnixSocket(socket_path, err)),
        }
    }

    fn receive(&mut self, wait: Wait) -> Result<bool, Error> {
        match self.transport.receive(&mut self.chunk, wait) {
            Ok(0) => Err(Error::ConnectionClosed),
            Ok(received) => {
                self.incoming.extend(&self.chunk[..received]);
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(Error::IOError(err)),
        }
    }

    /// `true` if there is something to decode, either left over from earlier reads or just
    /// arrived. Never blocks.
    pub(crate) fn poll_readable(&mut self) -> Result<bool, Error> {
        if !self.incoming.is_empty() {
            return Ok(true);
        }
        self.receive(Wait::Poll)
    }

    /// Block until at least `len` bytes are buffered
    fn fill_to(&mut self, len: usize) -> Result<(), Error> {
        while self.incoming.len() < len {
            self.receive(Wait::Block)?;
        }
        Ok(())
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.fill_to(len)?;
        self.incoming.drain(..len);
        Ok(())
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        self.fill_to(len)?;
        Ok(self.incoming.drain(..len).collect())
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let len = buf.len();
        self.fill_to(len)?;
        for (dst, src) in buf.iter_mut().zip(self.incoming.drain(..len)) {
            *dst = src;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        self.fill_to(1)?;
        self.incoming.pop_front().ok_or(Error::ConnectionClosed)
    }

    pub(crate) fn read_le_u16(&mut self) -> Result<u16, Error> {
        let mut raw = [0u8; 2];
        self.read_exact(&mut raw)?;
        Ok(u16::from_le_bytes(raw))
    }

    pub(crate) fn read_le_u32(&mut self) -> Result<u32, Error> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Decode `count` consecutive items with `decode`
    pub(crate) fn read_list<T>(
        &mut self,
        count: usize,
        decode: impl Fn(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(decode(self)?);
        }
        Ok(items)
    }

    pub(crate) fn send<R: Encode>(&mut self, request: &R) -> Result<(), Error> {
        request.encode(&mut self.outgoing)?;
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        self.transport.transmit(&self.outgoing)?;
        self.outgoing.clear();
        Ok(())
    }
}

/// Parsed `$DISPLAY`: `[hostname]:display[.screen]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayVar {
    pub hostname: String,
    pub display_sequence: u32,
    pub screen: Option<u32>,
}

impl DisplayVar {
    const ENV: &'static str = "DISPLAY";

    /// Read and parse `$DISPLAY` environment variable
    pub fn from_env() -> Result<Self, Error> {
        let value = std::env::var(Self::ENV).map_err(|_| Error::NoEnv(Self::ENV))?;
        value.parse()
    }

    /// Empty hostname and `unix` both mean the local Unix socket
    pub fn is_local(&self) -> bool {
        matches!(self.hostname.as_str(), "" | "unix")
    }
}

impl FromStr for DisplayVar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidDisplayEnv(s.to_string());
        let number = |raw: &str| raw.parse::<u32>().map_err(|_| invalid());

        let (hostname, rest) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (display_sequence, screen) = match rest.split_once('.') {
            Some((display_sequence, screen)) => (number(display_sequence)?, Some(number(screen)?)),
            None => (number(rest)?, None),
        };

        Ok(Self {
            hostname: hostname.to_owned(),
            display_sequence,
            screen,
        })
    }
}

impl fmt::Display for DisplayVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.screen {
            Some(screen) => write!(f, "{}:{}.{}", self.hostname, self.display_sequence, screen),
            None => write!(f, "{}:{}", self.hostname, self.display_sequence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::MapWindow;

    #[test]
    fn parse_display_var() {
        let display = DisplayVar::from_str(":1").unwrap();
        assert_eq!(display.hostname, "");
        assert_eq!(display.display_sequence, 1);
        assert_eq!(display.screen, None);
        assert!(display.is_local());

        let display = DisplayVar::from_str("unix:0.2").unwrap();
        assert_eq!(display.display_sequence, 0);
        assert_eq!(display.screen, Some(2));
        assert!(display.is_local());
        assert_eq!(display.to_string(), "unix:0.2");

        let display = DisplayVar::from_str("example.org:10").unwrap();
        assert!(!display.is_local());
    }

    #[test]
    fn parse_invalid_display_var() {
        assert!(DisplayVar::from_str("").is_err());
        assert!(DisplayVar::from_str(":").is_err());
        assert!(DisplayVar::from_str(":a").is_err());
        assert!(DisplayVar::from_str(":0.").is_err());
    }

    #[test]
    fn remote_display_is_refused() {
        let display = DisplayVar::from_str("example.org:0").unwrap();
        assert!(matches!(
            XConnection::with_display(&display),
            Err(Error::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn reading_past_buffer_fails() {
        let mut conn = XConnection::scripted(vec![1, 0]);
        assert!(conn.poll_readable().unwrap());
        assert_eq!(conn.read_le_u16().unwrap(), 1);
        assert!(conn.is_drained());
        assert!(!conn.poll_readable().unwrap());
        assert!(matches!(conn.read_u8(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn requests_wait_for_flush() {
        let mut conn = XConnection::scripted(Vec::new());
        conn.send(&MapWindow {
            window: crate::WindowId::from(0x0060_0001),
        })
        .unwrap();
        assert_eq!(conn.outgoing(), &[8, 0, 2, 0, 1, 0, 0x60, 0]);
        assert!(conn.sent().is_empty());

        conn.flush().unwrap();
        assert!(conn.outgoing().is_empty());
        assert_eq!(conn.sent(), &[8, 0, 2, 0, 1, 0, 0x60, 0]);
    }

    #[test]
    fn hung_up_server_fails_polls_after_buffer() {
        let mut conn = XConnection::scripted(vec![7]);
        conn.hang_up();
        assert!(conn.poll_readable().unwrap());
        assert_eq!(conn.read_u8().unwrap(), 7);
        assert!(matches!(conn.poll_readable(), Err(Error::ConnectionClosed)));

        conn.script(&[9]);
        assert_eq!(conn.read_u8().unwrap(), 9);
    }
}
