//! HTTP server implementation
//!
//! This module provides the server side of a connection: reading requests
//! and writing either fixed-length or streamed chunked responses.

use super::{
    Error, HttpRequest, HttpResponse, HttpSession, RequestParser, Result, SessionOps, Status, CRLF,
};
use bytes::BytesMut;

/// HTTP server
///
/// Provides methods for receiving requests and sending responses.
pub struct HttpServer<S: SessionOps> {
    session: HttpSession<S>,
    parser: RequestParser,
    pending: Vec<u8>,
}

impl<S: SessionOps> HttpServer<S> {
    /// Create a new HTTP server with a session
    pub fn new(session: S) -> Self {
        HttpServer {
            session: HttpSession::new(session),
            parser: RequestParser::new(),
            pending: Vec::new(),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Receive an HTTP request
    ///
    /// Returns `Ok(None)` when the peer closes the connection cleanly before
    /// sending any part of a new request.
    pub fn receive_request(&mut self) -> Result<Option<HttpRequest>> {
        self.parser = RequestParser::new();

        let pending = std::mem::take(&mut self.pending);
        let mut seen_bytes = !pending.is_empty();
        if let Some(request) = self.parser.parse(&pending)? {
            self.pending = self.parser.take_remaining();
            return Ok(Some(request));
        }

        let mut temp = vec![0u8; 4096];
        loop {
            let n = self.session.read(&mut temp)?;

            if n == 0 {
                if seen_bytes {
                    return Err(Error::ConnectionClosed);
                }
                return Ok(None);
            }
            seen_bytes = true;

            if let Some(request) = self.parser.parse(&temp[..n])? {
                self.pending = self.parser.take_remaining();
                return Ok(Some(request));
            }
        }
    }

    /// Send an HTTP response
    pub fn send_response(&mut self, response: &HttpResponse) -> Result<()> {
        self.session.write_all(&response.to_wire())
    }

    /// Send a plain-text response with a fixed body
    pub fn send_error(&mut self, status: Status, message: &str) -> Result<()> {
        let response = HttpResponse::builder()
            .status(status)
            .header("Content-Length", message.len().to_string())
            .header("Content-Type", "text/plain")
            .body(message.as_bytes().to_vec())
            .build();

        self.send_response(&response)
    }

    /// Send response headers only
    pub fn send_response_headers(&mut self, response: &HttpResponse) -> Result<()> {
        self.session.write_all(&response.head_to_wire())
    }

    /// Start a chunked response
    ///
    /// Sends the headers of `response` with `Transfer-Encoding: chunked`
    /// (any `Content-Length` is dropped) and returns a writer for the body.
    /// The body of `response` itself is ignored.
    pub fn start_chunked_response(&mut self, response: &HttpResponse) -> Result<ChunkedBody<'_, S>> {
        let mut head = response.clone();
        head.headers_mut().remove("Content-Length");
        head.headers_mut().remove("Transfer-Encoding");
        head.headers_mut().insert("Transfer-Encoding", "chunked");

        self.send_response_headers(&head)?;

        Ok(ChunkedBody {
            session: &mut self.session,
            frame: BytesMut::with_capacity(64),
            chunks_written: 0,
        })
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    /// Get a reference to the underlying session
    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }

    /// Get a mutable reference to the underlying session
    pub fn session_mut(&mut self) -> &mut HttpSession<S> {
        &mut self.session
    }
}

/// Body writer for a chunked response in progress
///
/// Every [`write_chunk`](Self::write_chunk) call is framed and handed to the
/// session as a single write, so one call is one chunk on the wire.
pub struct ChunkedBody<'a, S: SessionOps> {
    session: &'a mut HttpSession<S>,
    frame: BytesMut,
    chunks_written: u64,
}

impl<S: SessionOps> ChunkedBody<'_, S> {
    /// Write one chunk. Empty data writes nothing.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.frame.clear();
        self.frame
            .extend_from_slice(format!("{:x}{}", data.len(), CRLF).as_bytes());
        self.frame.extend_from_slice(data);
        self.frame.extend_from_slice(CRLF.as_bytes());

        self.session.write_all(&self.frame)?;
        self.chunks_written += 1;
        Ok(())
    }

    /// Flush the transport without writing a frame
    pub fn flush(&mut self) -> Result<()> {
        self.session.flush()
    }

    /// Number of chunks written so far
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Write the terminating zero-sized chunk
    pub fn finish(self) -> Result<()> {
        self.session.write_all(format!("0{}{}", CRLF, CRLF).as_bytes())?;
        self.session.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::chunked::split_chunks;
    use crate::http::session::{FdSessionOps, MemorySessionOps};
    use crate::http::Method;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_receive_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"GET /random_chunk?1,2 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .unwrap();

            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let mut server = HttpServer::new(FdSessionOps::new(stream));

        let request = server.receive_request().unwrap().unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/random_chunk");
        assert_eq!(request.headers().get("Host"), Some("localhost"));

        server.send_error(Status::NOT_FOUND, "Not Found").unwrap();

        handle.join().unwrap();
    }

    #[test]
    fn test_receive_request_clean_eof() {
        let mut server = HttpServer::new(MemorySessionOps::new(Vec::new()));
        assert!(server.receive_request().unwrap().is_none());
    }

    #[test]
    fn test_receive_request_truncated() {
        let mut server = HttpServer::new(MemorySessionOps::new(b"GET / HTTP/1.1\r\n".to_vec()));
        assert!(matches!(server.receive_request(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_receive_pipelined_requests() {
        let input = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n".to_vec();
        let mut server = HttpServer::new(MemorySessionOps::new(input));

        assert_eq!(server.receive_request().unwrap().unwrap().uri(), "/a");
        assert_eq!(server.receive_request().unwrap().unwrap().uri(), "/b");
        assert!(server.receive_request().unwrap().is_none());
    }

    #[test]
    fn test_chunked_response_one_write_per_chunk() {
        let mut server = HttpServer::new(MemorySessionOps::new(Vec::new()));

        let response = HttpResponse::builder()
            .status(Status::OK)
            .header("Content-Type", "text/html")
            .header("Content-Length", "99")
            .build();

        let mut body = server.start_chunked_response(&response).unwrap();
        body.write_chunk(b"1").unwrap();
        body.write_chunk(b"").unwrap();
        body.write_chunk(b"555").unwrap();
        assert_eq!(body.chunks_written(), 2);
        body.finish().unwrap();

        let session = server.session().get_ref();
        let writes = session.writes();
        // headers, two chunks, terminator
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[1], b"1\r\n1\r\n");
        assert_eq!(writes[2], b"3\r\n555\r\n");
        assert_eq!(writes[3], b"0\r\n\r\n");

        let head = String::from_utf8_lossy(&writes[0]);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!head.contains("Content-Length"));

        let body: Vec<u8> = writes[1..].concat();
        assert_eq!(
            split_chunks(&body).unwrap(),
            vec![b"1".to_vec(), b"555".to_vec()]
        );
    }
}
