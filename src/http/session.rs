//! Session operations abstraction
//!
//! The HTTP server and client talk to a `SessionOps` rather than a socket,
//! so the same request handling runs over TCP (`FdSessionOps`) or over an
//! in-memory transport (`MemorySessionOps`) that can simulate a peer
//! dropping the connection part way through a response.

use super::{Error, Result};
use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over the transport.
pub trait SessionOps {
    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush anything buffered below the session
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// HTTP session wrapping a transport with session operations
pub struct HttpSession<S: SessionOps> {
    session: S,
    timeout: Option<Duration>,
}

impl<S: SessionOps> HttpSession<S> {
    /// Create a new HTTP session
    pub fn new(session: S) -> Self {
        HttpSession {
            session,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Read data with timeout
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        // Poll first
        if !self.session.poll(PollEvents::Read, self.timeout)? {
            return Err(Error::Timeout);
        }

        self.session.read(buf)
    }

    /// Write data with timeout
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // Poll first
        if !self.session.poll(PollEvents::Write, self.timeout)? {
            return Err(Error::Timeout);
        }

        self.session.write(buf)
    }

    /// Write the whole buffer, polling before every partial write
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }
        Ok(())
    }

    /// Flush the underlying transport
    pub fn flush(&mut self) -> Result<()> {
        self.session.flush()
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    /// Get a reference to the underlying session
    pub fn get_ref(&self) -> &S {
        &self.session
    }

    /// Get a mutable reference to the underlying session
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

/// Convert a timeout to `poll(2)` milliseconds, saturating at `i32::MAX`
fn poll_timeout_ms(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
}

/// Plain file descriptor session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Create a new FD session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
                PollEvents::Both => POLLIN | POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(poll_timeout_ms)
            .unwrap_or(-1); // -1 = infinite

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        // Shutdown the connection
        use std::net::Shutdown;
        self.stream
            .shutdown(Shutdown::Both)
            .map_err(Error::from)
    }
}

/// Helper to create an HTTP session from a TCP stream
pub fn from_tcp_stream(stream: TcpStream) -> HttpSession<FdSessionOps> {
    HttpSession::new(FdSessionOps::new(stream))
}

/// In-memory session operations
///
/// Reads come from a fixed input buffer and writes are captured. Each
/// `write` call is recorded separately so callers can see the write
/// granularity, and the session can be told to fail once a number of
/// writes have succeeded.
#[derive(Debug, Default)]
pub struct MemorySessionOps {
    input: Cursor<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    flushes: usize,
    fail_after: Option<usize>,
    closed: bool,
}

impl MemorySessionOps {
    /// Create a session that will read `input`
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        MemorySessionOps {
            input: Cursor::new(input.into()),
            ..Default::default()
        }
    }

    /// Fail every write after `writes` successful ones with a broken pipe
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    /// Everything written so far, concatenated
    pub fn output(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Individual write calls, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of flush calls seen
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SessionOps for MemorySessionOps {
    fn poll(&self, _events: PollEvents, _timeout: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.input.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if self.fail_after.is_some_and(|limit| self.writes.len() >= limit) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer went away",
            )));
        }
        self.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_poll_timeout_saturates() {
        assert_eq!(poll_timeout_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(poll_timeout_ms(Duration::from_secs(2_147_483)), 2_147_483_000);
        assert_eq!(poll_timeout_ms(Duration::from_secs(3_000_000)), i32::MAX);
        assert_eq!(poll_timeout_ms(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn test_fd_session_ops() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = FdSessionOps::new(stream);

        // Poll for read
        assert!(session.poll(PollEvents::Read, Some(Duration::from_secs(1))).unwrap());

        // Read data
        let mut buf = [0u8; 5];
        let n = session.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"Hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_memory_session_records_writes() {
        let mut session = HttpSession::new(MemorySessionOps::new(b"ping".to_vec()));

        let mut buf = [0u8; 8];
        assert_eq!(session.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
        assert_eq!(session.read(&mut buf).unwrap(), 0);

        session.write_all(b"po").unwrap();
        session.write_all(b"ng").unwrap();
        session.flush().unwrap();

        assert_eq!(session.get_ref().writes(), &[b"po".to_vec(), b"ng".to_vec()]);
        assert_eq!(session.get_ref().output(), b"pong");
        assert_eq!(session.get_ref().flushes(), 1);
    }

    #[test]
    fn test_memory_session_fails_after_limit() {
        let mut session = MemorySessionOps::new(Vec::new()).fail_after(1);

        assert_eq!(session.write(b"a").unwrap(), 1);
        let err = session.write(b"b").unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(session.output(), b"a");
    }

    #[test]
    fn test_http_session_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Don't send anything - test timeout
        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            // Don't send anything
            thread::sleep(Duration::from_secs(2));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = from_tcp_stream(stream);
        session.set_timeout(Some(Duration::from_millis(100)));

        let mut buf = [0u8; 10];
        let result = session.read(&mut buf);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }
}
