//! random-chunk - HTTP chunked transfer-encoding traffic generator
//!
//! This crate produces reproducible, oddly shaped chunked response bodies for
//! exercising chunked readers, writers and proxies. A seed and a count drive
//! a [`generator`] that yields segment descriptors; the [`emitter`] writes
//! each segment as one chunk and finishes with an `__END__:<total>` trailer.
//!
//! The [`http`] module carries the small HTTP/1.1 stack the generator is
//! served over, and [`listener`] mounts the [`handler`] on a TCP socket.

pub mod config;
pub mod emitter;
pub mod generator;
pub mod handler;
pub mod http;
pub mod listener;
