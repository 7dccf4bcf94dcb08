//! HTTP/1.1 implementation for random-chunk
//!
//! This module provides the HTTP/1.1 server side that serves generated
//! traffic, plus a client used to fetch and inspect it.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction so the same code can
//! run over a socket or an in-memory transport:
//!
//! - `SessionOps` trait defines operations (poll, read, write, close)
//! - `HttpSession` wraps a `SessionOps` with a poll based timeout
//! - All HTTP I/O code is transparent to the underlying transport
//!
//! # Examples
//!
//! ```no_run
//! use random_chunk::http::{HttpClient, HttpRequest, Method};
//! use random_chunk::http::session::FdSessionOps;
//! use std::net::TcpStream;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut client = HttpClient::new(FdSessionOps::new(stream));
//!
//! let request = HttpRequest::builder()
//!     .method(Method::Get)
//!     .uri("/random_chunk?0,1000")
//!     .header("Host", "localhost")
//!     .build();
//! client.send_request(&request).unwrap();
//!
//! let response = client.receive_response().unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;

pub use client::HttpClient;
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{RequestParser, ResponseParser};
pub use server::HttpServer;
pub use session::{HttpSession, SessionOps};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Maximum size of a message head, start line and headers included
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
