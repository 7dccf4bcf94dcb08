//! HTTP client implementation
//!
//! A small client used to fetch generated streams and look at them frame by
//! frame. Chunked responses are read back with [`ChunkedDecoder`], keeping the
//! raw framing so callers can inspect individual chunks.

use super::chunked::{self, ChunkedDecoder};
use super::parser::is_chunked;
use super::{Error, HttpRequest, HttpResponse, HttpSession, Method, ResponseParser, Result, SessionOps};

/// HTTP client
///
/// Provides methods for sending requests and receiving responses.
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
    pending: Vec<u8>,
}

/// A response whose chunked body was kept frame by frame
#[derive(Debug, Clone)]
pub struct ChunkedResponse {
    /// Status line and headers; the body is the decoded payload
    pub response: HttpResponse,
    /// Payload of every chunk, in arrival order, terminator excluded
    pub chunks: Vec<Vec<u8>>,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            parser: ResponseParser::new(),
            pending: Vec::new(),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Send an HTTP request
    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.session.write_all(&request.to_wire())
    }

    /// Receive an HTTP response, decoding a chunked body if present
    pub fn receive_response(&mut self) -> Result<HttpResponse> {
        let (mut response, raw) = self.receive_with_raw_body(false)?;
        if let Some(raw) = raw {
            response.set_body(chunked::decode_chunked_body(&raw)?);
        }
        Ok(response)
    }

    /// Receive the response to a HEAD request (headers only)
    pub fn receive_head_response(&mut self) -> Result<HttpResponse> {
        let (response, _) = self.receive_with_raw_body(true)?;
        Ok(response)
    }

    /// Receive a chunked response and keep its frame boundaries
    pub fn receive_chunked_response(&mut self) -> Result<ChunkedResponse> {
        let (mut response, raw) = self.receive_with_raw_body(false)?;
        let raw = raw.ok_or_else(|| {
            Error::Protocol("response is not chunked-encoded".to_string())
        })?;

        let chunks = chunked::split_chunks(&raw)?;
        response.set_body(chunks.concat());
        Ok(ChunkedResponse { response, chunks })
    }

    /// Read status line and headers, then the raw chunked body if any
    fn receive_with_raw_body(&mut self, head_only: bool) -> Result<(HttpResponse, Option<Vec<u8>>)> {
        self.parser.reset();
        self.parser.set_head_only(head_only);

        let pending = std::mem::take(&mut self.pending);
        let mut parsed = self.parser.parse(&pending)?;
        let mut temp = vec![0u8; 4096];

        while parsed.is_none() {
            let n = self.session.read(&mut temp)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            parsed = self.parser.parse(&temp[..n])?;
        }

        let response = parsed.ok_or(Error::Incomplete)?;
        let remaining = self.parser.take_remaining();

        if head_only || !is_chunked(response.headers()) {
            self.pending = remaining;
            return Ok((response, None));
        }

        let raw = self.read_raw_chunked(remaining)?;
        Ok((response, Some(raw)))
    }

    /// Read exactly one chunked body, returning its raw bytes
    ///
    /// Bytes past the end of the body are kept for the next response.
    fn read_raw_chunked(&mut self, initial: Vec<u8>) -> Result<Vec<u8>> {
        let mut decoder = ChunkedDecoder::new();
        let mut input = initial;
        let mut raw = Vec::new();
        let mut scratch = vec![0u8; 8192];
        let mut temp = vec![0u8; 4096];

        loop {
            if !input.is_empty() {
                let (consumed, _, complete) = decoder.decode(&input, &mut scratch)?;
                raw.extend_from_slice(&input[..consumed]);
                input.drain(..consumed);

                if complete {
                    self.pending = input;
                    return Ok(raw);
                }
                if consumed > 0 {
                    continue;
                }
            }

            let n = self.session.read(&mut temp)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            input.extend_from_slice(&temp[..n]);
        }
    }

    /// Send a simple GET request
    pub fn get(&mut self, uri: &str) -> Result<HttpResponse> {
        self.send_request(&simple_request(Method::Get, uri))?;
        self.receive_response()
    }

    /// Send a GET request and keep the chunk boundaries of the answer
    pub fn get_chunked(&mut self, uri: &str) -> Result<ChunkedResponse> {
        self.send_request(&simple_request(Method::Get, uri))?;
        self.receive_chunked_response()
    }

    /// Send a HEAD request
    pub fn head(&mut self, uri: &str) -> Result<HttpResponse> {
        self.send_request(&simple_request(Method::Head, uri))?;
        self.receive_head_response()
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

fn simple_request(method: Method, uri: &str) -> HttpRequest {
    HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header("Host", "localhost")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::{FdSessionOps, MemorySessionOps};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_send_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]);

            assert!(request.contains("GET /random_chunk?0,10 HTTP/1.1"));
            assert!(request.contains("Host: localhost"));

            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK")
                .unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = HttpClient::new(FdSessionOps::new(stream));

        let response = client.get("/random_chunk?0,10").unwrap();
        assert_eq!(response.status().code(), 200);
        assert_eq!(response.body(), b"OK");

        handle.join().unwrap();
    }

    #[test]
    fn test_receive_chunked_response() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                     1\r\n1\r\n3\r\n555\r\n9\r\n__END__:4\r\n0\r\n\r\n"
            .to_vec();
        let mut client = HttpClient::new(MemorySessionOps::new(wire));

        let chunked = client.receive_chunked_response().unwrap();
        assert_eq!(
            chunked.chunks,
            vec![b"1".to_vec(), b"555".to_vec(), b"__END__:4".to_vec()]
        );
        assert_eq!(chunked.response.body(), b"1555__END__:4");
    }

    #[test]
    fn test_receive_two_chunked_responses() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nab\r\n0\r\n\r\n\
                     HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1\r\nc\r\n0\r\n\r\n"
            .to_vec();
        let mut client = HttpClient::new(MemorySessionOps::new(wire));

        assert_eq!(client.receive_response().unwrap().body(), b"ab");
        assert_eq!(client.receive_response().unwrap().body(), b"c");
    }

    #[test]
    fn test_head_response_has_no_body() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/html\r\n\r\n".to_vec();
        let mut client = HttpClient::new(MemorySessionOps::new(wire));

        let response = client.head("/random_chunk?0,10").unwrap();
        assert_eq!(response.status().code(), 200);
        assert!(response.body().is_empty());

        let sent = String::from_utf8(client.session().get_ref().output()).unwrap();
        assert!(sent.starts_with("HEAD /random_chunk?0,10 HTTP/1.1\r\n"));
    }

    #[test]
    fn test_truncated_chunked_body() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nab".to_vec();
        let mut client = HttpClient::new(MemorySessionOps::new(wire));

        assert!(matches!(
            client.receive_response(),
            Err(Error::ConnectionClosed)
        ));
    }
}
