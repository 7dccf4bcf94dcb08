//! Chunked transfer encoding support
//!
//! The encoder is the write side the generator relies on: every call to
//! [`ChunkedEncoder::write_chunk`] produces exactly one chunk frame, so the
//! caller's write granularity is the chunk layout the peer observes.
//!
//! The decoder and [`split_chunks`] exist to read back the crate's own output
//! in clients and tests.

use super::{Error, Result, CRLF};
use std::io::Write;

/// Writes chunk frames to `W`
pub struct ChunkedEncoder<W: Write> {
    writer: W,
    chunks_written: u64,
}

impl<W: Write> ChunkedEncoder<W> {
    pub fn new(writer: W) -> Self {
        ChunkedEncoder {
            writer,
            chunks_written: 0,
        }
    }

    /// Write `data` as one chunk frame
    ///
    /// Empty input writes nothing: a zero-sized chunk is the end-of-body
    /// marker and may only be produced by [`finish`](Self::finish).
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        write!(self.writer, "{:x}{}", data.len(), CRLF)?;
        self.writer.write_all(data)?;
        self.writer.write_all(CRLF.as_bytes())?;

        self.chunks_written += 1;
        Ok(())
    }

    /// Flush the underlying writer without emitting a frame
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Non-empty chunks written so far
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Write the terminating zero-sized chunk and flush
    pub fn finish(&mut self) -> Result<()> {
        write!(self.writer, "0{}{}", CRLF, CRLF)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse a chunk size line (without its CRLF), ignoring extensions
fn parse_size_line(line: &[u8]) -> Result<usize> {
    let line = String::from_utf8_lossy(line);
    let size = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(size, 16).map_err(|_| Error::InvalidChunkSize(size.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailer,
    Done,
}

/// Incremental chunked body decoder
///
/// Input may arrive in arbitrary pieces; [`decode`](Self::decode) consumes
/// what it can and reports how far it got.
#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: DecoderState,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::Size,
        }
    }

    /// Decode as much of `input` as possible into `output`
    ///
    /// Returns `(consumed, decoded, complete)`. Stops early when `output` is
    /// full or a frame is cut off; feed the unconsumed bytes again together
    /// with more input.
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool)> {
        let mut consumed = 0;
        let mut decoded = 0;

        loop {
            let rest = &input[consumed..];
            match self.state {
                DecoderState::Size => {
                    let Some(end) = find_crlf(rest) else { break };
                    let size = parse_size_line(&rest[..end])?;
                    consumed += end + 2;
                    self.state = if size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::Data { remaining: size }
                    };
                }
                DecoderState::Data { remaining } => {
                    let n = remaining.min(rest.len()).min(output.len() - decoded);
                    if n == 0 {
                        break;
                    }
                    output[decoded..decoded + n].copy_from_slice(&rest[..n]);
                    consumed += n;
                    decoded += n;
                    self.state = if n == remaining {
                        DecoderState::DataEnd
                    } else {
                        DecoderState::Data {
                            remaining: remaining - n,
                        }
                    };
                }
                DecoderState::DataEnd => {
                    if rest.len() < 2 {
                        break;
                    }
                    if &rest[..2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    consumed += 2;
                    self.state = DecoderState::Size;
                }
                DecoderState::Trailer => {
                    // trailer fields are skipped up to the empty line
                    let Some(end) = find_crlf(rest) else { break };
                    consumed += end + 2;
                    if end == 0 {
                        self.state = DecoderState::Done;
                    }
                }
                DecoderState::Done => break,
            }
        }

        Ok((consumed, decoded, self.is_complete()))
    }

    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Done
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a complete chunked body into its payload
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    Ok(split_chunks(input)?.concat())
}

/// Split a complete chunked body into its individual chunk payloads
///
/// Unlike [`decode_chunked_body`] this keeps frame boundaries, which is what
/// matters when checking the shape of a generated stream. The terminating
/// zero-sized chunk is not included.
pub fn split_chunks(input: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    loop {
        let end = find_crlf(&input[pos..]).ok_or(Error::Incomplete)?;
        let size = parse_size_line(&input[pos..pos + end])?;
        pos += end + 2;

        if size == 0 {
            break;
        }
        if input.len() < pos + size + 2 {
            return Err(Error::Incomplete);
        }

        chunks.push(input[pos..pos + size].to_vec());
        pos += size;

        if &input[pos..pos + 2] != b"\r\n" {
            return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
        }
        pos += 2;
    }

    loop {
        let end = find_crlf(&input[pos..]).ok_or(Error::Incomplete)?;
        pos += end + 2;
        if end == 0 {
            break;
        }
    }

    Ok(chunks)
}
