//! Segment emission
//!
//! The emitter turns a segment sequence into sink writes: one write per
//! non-empty segment, in generation order, followed by one trailer write of
//! the form `__END__:<total>`. Against a chunked sink every write is one
//! chunk, so the segment sequence is the chunk layout the peer sees.
//!
//! A failed write stops emission immediately. Nothing is retried and nothing
//! already written is taken back.

use crate::generator::{Segment, MAX_SEGMENT};
use crate::http::chunked::ChunkedEncoder;
use crate::http::server::ChunkedBody;
use crate::http::{self, SessionOps};
use bytes::Bytes;
use std::io::{self, Write};

/// Prefix of the trailer line
pub const TRAILER_PREFIX: &str = "__END__:";

/// Destination for emitted payloads
///
/// Each `write_chunk` call carries exactly one segment (or the trailer) and
/// is expected to become one chunk frame.
pub trait ChunkSink {
    /// Write one payload. Never called with empty data.
    fn write_chunk(&mut self, data: &[u8]) -> http::Result<()>;

    /// Signal a boundary without payload
    ///
    /// Only called for empty segments when
    /// [`EmitOptions::flush_on_empty`] is set.
    fn boundary(&mut self) -> http::Result<()> {
        Ok(())
    }
}

impl<W: Write> ChunkSink for ChunkedEncoder<W> {
    fn write_chunk(&mut self, data: &[u8]) -> http::Result<()> {
        ChunkedEncoder::write_chunk(self, data)
    }

    fn boundary(&mut self) -> http::Result<()> {
        ChunkedEncoder::flush(self)
    }
}

impl<S: SessionOps> ChunkSink for ChunkedBody<'_, S> {
    fn write_chunk(&mut self, data: &[u8]) -> http::Result<()> {
        ChunkedBody::write_chunk(self, data)
    }

    fn boundary(&mut self) -> http::Result<()> {
        ChunkedBody::flush(self)
    }
}

/// Sink writing bare payloads with no framing, e.g. to a file
pub struct RawSink<W: Write> {
    writer: W,
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W) -> Self {
        RawSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ChunkSink for RawSink<W> {
    fn write_chunk(&mut self, data: &[u8]) -> http::Result<()> {
        self.writer.write_all(data)?;
        Ok(())
    }

    fn boundary(&mut self) -> http::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink keeping every write separately
///
/// Can be told to fail after a number of successful writes to simulate a
/// peer that disconnects mid-stream.
#[derive(Debug, Default)]
pub struct RecordingSink {
    chunks: Vec<Bytes>,
    boundaries: usize,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after `writes` successful ones
    pub fn fail_after(writes: usize) -> Self {
        RecordingSink {
            fail_after: Some(writes),
            ..Default::default()
        }
    }

    /// Recorded writes, in order
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Number of boundary signals received
    pub fn boundaries(&self) -> usize {
        self.boundaries
    }

    /// All recorded payload bytes, concatenated
    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl ChunkSink for RecordingSink {
    fn write_chunk(&mut self, data: &[u8]) -> http::Result<()> {
        if self.fail_after.is_some_and(|limit| self.chunks.len() >= limit) {
            return Err(http::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated peer disconnect",
            )));
        }
        self.chunks.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn boundary(&mut self) -> http::Result<()> {
        self.boundaries += 1;
        Ok(())
    }
}

/// Emission behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Call [`ChunkSink::boundary`] for every empty segment
    pub flush_on_empty: bool,
}

/// Outcome of a completed emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionResult {
    /// Payload bytes written for segments; the trailer is not counted
    pub total_bytes_written: u64,
    /// Segments consumed
    pub segments: u64,
    /// Payload writes issued for segments; the trailer is not counted
    pub writes: u64,
}

impl EmissionResult {
    /// The trailer line for this result
    pub fn trailer(&self) -> String {
        format!("{}{}", TRAILER_PREFIX, self.total_bytes_written)
    }
}

/// Emission aborted by a failing sink
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("write of segment {segment} failed after {written} bytes: {source}")]
    Transport {
        segment: u64,
        written: u64,
        source: http::Error,
    },

    #[error("trailer write failed after {written} bytes: {source}")]
    Trailer { written: u64, source: http::Error },
}

impl EmitError {
    /// Segment bytes successfully written before the failure
    pub fn bytes_written(&self) -> u64 {
        match *self {
            EmitError::Transport { written, .. } | EmitError::Trailer { written, .. } => written,
        }
    }
}

/// Writes segment sequences to a sink
#[derive(Debug, Clone, Copy, Default)]
pub struct Emitter {
    options: EmitOptions,
}

impl Emitter {
    pub fn new(options: EmitOptions) -> Self {
        Emitter { options }
    }

    /// Write every segment, then the trailer
    pub fn emit<I, K>(&self, segments: I, sink: &mut K) -> Result<EmissionResult, EmitError>
    where
        I: IntoIterator<Item = Segment>,
        K: ChunkSink + ?Sized,
    {
        let mut result = EmissionResult::default();
        let mut buf = [0u8; MAX_SEGMENT as usize];

        for segment in segments {
            let index = result.segments;
            let payload = segment.payload(&mut buf);

            let written = if payload.is_empty() {
                if self.options.flush_on_empty {
                    sink.boundary()
                } else {
                    Ok(())
                }
            } else {
                sink.write_chunk(payload).map(|()| result.writes += 1)
            };

            if let Err(source) = written {
                tracing::debug!(segment = index, error = %source, "segment write failed");
                return Err(EmitError::Transport {
                    segment: index,
                    written: result.total_bytes_written,
                    source,
                });
            }

            tracing::trace!(index, %segment, "segment emitted");
            result.total_bytes_written += payload.len() as u64;
            result.segments += 1;
        }

        sink.write_chunk(result.trailer().as_bytes())
            .map_err(|source| EmitError::Trailer {
                written: result.total_bytes_written,
                source,
            })?;

        Ok(result)
    }
}

/// Emit with default options
pub fn emit<I, K>(segments: I, sink: &mut K) -> Result<EmissionResult, EmitError>
where
    I: IntoIterator<Item = Segment>,
    K: ChunkSink + ?Sized,
{
    Emitter::default().emit(segments, sink)
}
