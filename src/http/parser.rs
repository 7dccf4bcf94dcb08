//! Incremental HTTP/1.1 message parsing
//!
//! Both parsers accept input in arbitrary pieces and return the message once
//! its head (and fixed-length body, if any) is complete. Bytes past the end
//! of the message stay in the parser for [`take_remaining`](RequestParser::take_remaining).
//! Chunked bodies are never consumed here; the caller decodes them.

use super::{
    Error, Headers, HttpRequest, HttpResponse, Method, Result, Status, Version, MAX_HEAD_SIZE,
};

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_content_length(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", value)))
}

/// Check whether a message uses chunked transfer encoding
pub fn is_chunked(headers: &Headers) -> bool {
    headers.has_token("Transfer-Encoding", "chunked")
}

/// Parse `METHOD URI VERSION`
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(uri), Some(version), None) => {
            Ok((method.parse()?, uri.to_string(), version.parse()?))
        }
        _ => Err(Error::Parse(format!("Invalid request line: {:?}", line))),
    }
}

/// Parse `VERSION CODE [REASON]`
///
/// A missing reason falls back to the canonical phrase for the code.
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let mut parts = line.splitn(3, ' ');
    let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
        return Err(Error::Parse(format!("Invalid status line: {:?}", line)));
    };

    let version = version.parse::<Version>()?;
    let code = code
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", code)))?;
    let status = Status::new(code)?;
    let reason = match parts.next() {
        Some(reason) => reason.to_string(),
        None => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Start line plus header block, read line by line
struct HeadReader<T> {
    buffer: Vec<u8>,
    head_len: usize,
    start: Option<T>,
    headers: Headers,
    done: bool,
}

impl<T> HeadReader<T> {
    fn new() -> Self {
        HeadReader {
            buffer: Vec::new(),
            head_len: 0,
            start: None,
            headers: Headers::new(),
            done: false,
        }
    }

    /// Buffer `data` and consume complete lines until the blank line
    ///
    /// Returns whether the head is complete. A head that grows past
    /// [`MAX_HEAD_SIZE`] without ending is a parse error.
    fn feed(&mut self, data: &[u8], parse_start: fn(&str) -> Result<T>) -> Result<bool> {
        self.buffer.extend_from_slice(data);

        while !self.done {
            let Some(end) = find_crlf(&self.buffer) else { break };
            let line = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
            self.buffer.drain(..end + 2);
            self.head_len += end + 2;

            if self.start.is_none() {
                self.start = Some(parse_start(&line)?);
            } else if line.is_empty() {
                self.done = true;
            } else {
                let (name, value) = Headers::parse_header_line(&line)?;
                self.headers.insert(name, value);
            }
        }

        if !self.done && self.head_len + self.buffer.len() > MAX_HEAD_SIZE {
            return Err(Error::Parse(format!(
                "Message head exceeds {} bytes",
                MAX_HEAD_SIZE
            )));
        }

        Ok(self.done)
    }

    /// Take a `Content-Length` body once fully buffered
    fn fixed_body(&mut self) -> Result<Option<Vec<u8>>> {
        match self.headers.get("Content-Length") {
            Some(value) => {
                let len = parse_content_length(value)?;
                if self.buffer.len() < len {
                    return Ok(None);
                }
                Ok(Some(self.buffer.drain(..len).collect()))
            }
            None => Ok(Some(Vec::new())),
        }
    }
}

/// HTTP request parser
pub struct RequestParser {
    head: HeadReader<(Method, String, Version)>,
    complete: bool,
}

impl RequestParser {
    pub fn new() -> Self {
        RequestParser {
            head: HeadReader::new(),
            complete: false,
        }
    }

    /// Feed data to the parser
    ///
    /// Returns `Ok(Some(request))` once, when the request is complete.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpRequest>> {
        if self.complete {
            self.head.buffer.extend_from_slice(data);
            return Ok(None);
        }
        if !self.head.feed(data, parse_request_line)? {
            return Ok(None);
        }
        let Some(body) = self.head.fixed_body()? else {
            return Ok(None);
        };

        let (method, uri, version) = self.head.start.take().ok_or(Error::Incomplete)?;
        self.complete = true;

        let mut request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .version(version)
            .body(body)
            .build();
        *request.headers_mut() = std::mem::take(&mut self.head.headers);

        Ok(Some(request))
    }

    /// Take bytes received past the end of the parsed request
    ///
    /// Pipelined clients may send the next request in the same read; the
    /// caller feeds these bytes to a fresh parser.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.head.buffer)
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP response parser
pub struct ResponseParser {
    head: HeadReader<(Version, Status, String)>,
    head_only: bool,
    complete: bool,
}

impl ResponseParser {
    pub fn new() -> Self {
        ResponseParser {
            head: HeadReader::new(),
            head_only: false,
            complete: false,
        }
    }

    /// Feed data to the parser
    ///
    /// Chunked and HEAD responses complete as soon as the headers end, with
    /// an empty body.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        if self.complete {
            self.head.buffer.extend_from_slice(data);
            return Ok(None);
        }
        if !self.head.feed(data, parse_status_line)? {
            return Ok(None);
        }

        let body = if self.head_only || is_chunked(&self.head.headers) {
            Vec::new()
        } else {
            match self.head.fixed_body()? {
                Some(body) => body,
                None => return Ok(None),
            }
        };

        let (version, status, reason) = self.head.start.take().ok_or(Error::Incomplete)?;
        self.complete = true;

        let mut response = HttpResponse::builder()
            .version(version)
            .status(status)
            .reason(reason)
            .body(body)
            .build();
        *response.headers_mut() = std::mem::take(&mut self.head.headers);

        Ok(Some(response))
    }

    /// Treat the next response as the answer to a HEAD request
    pub fn set_head_only(&mut self, head_only: bool) {
        self.head_only = head_only;
    }

    /// Take bytes received past the parsed part of the response
    pub fn take_remaining(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.head.buffer)
    }

    /// Forget everything, including buffered bytes and the HEAD flag
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
