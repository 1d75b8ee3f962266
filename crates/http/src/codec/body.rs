//! Payload framing: `Content-Length` and chunked transfer encoding, both ways.

use std::cmp;
use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem, PayloadSize, SendError};

/// Upper bound for a single trailer line after the last chunk.
const MAX_TRAILER_LINE: usize = 8 * 1024;

/// Decodes one request payload into chunks followed by [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: DecodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeKind {
    Length(u64),
    Chunked(ChunkedState),
    NoBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    Size,
    Data(u64),
    DataCrlf,
    Trailer,
    End,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: DecodeKind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: DecodeKind::Chunked(ChunkedState::Size) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: DecodeKind::Length(size) }
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => Self::fix_length(size),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::UntilClose | PayloadSize::Empty => Self::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            DecodeKind::NoBody => Ok(Some(PayloadItem::Eof)),
            DecodeKind::Length(remaining) => decode_length(remaining, src),
            DecodeKind::Chunked(state) => decode_chunked(state, src),
        }
    }
}

fn decode_length(remaining: &mut u64, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
    if *remaining == 0 {
        return Ok(Some(PayloadItem::Eof));
    }

    if src.is_empty() {
        return Ok(None);
    }

    let len = cmp::min(*remaining, src.len() as u64);
    let bytes = src.split_to(len as usize).freeze();
    *remaining -= len;
    Ok(Some(PayloadItem::Chunk(bytes)))
}

fn decode_chunked(state: &mut ChunkedState, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
    loop {
        match *state {
            ChunkedState::Size => match httparse::parse_chunk_size(src) {
                Ok(httparse::Status::Complete((consumed, size))) => {
                    src.advance(consumed);
                    trace!(size, "read chunk size");
                    *state = if size == 0 { ChunkedState::Trailer } else { ChunkedState::Data(size) };
                }
                Ok(httparse::Status::Partial) => return Ok(None),
                Err(_) => return Err(ParseError::invalid_body("invalid chunk size line")),
            },

            ChunkedState::Data(remaining) => {
                if src.is_empty() {
                    return Ok(None);
                }
                let len = cmp::min(remaining, src.len() as u64);
                let bytes = src.split_to(len as usize).freeze();
                *state = if remaining == len { ChunkedState::DataCrlf } else { ChunkedState::Data(remaining - len) };
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            ChunkedState::DataCrlf => {
                if src.len() < 2 {
                    return Ok(None);
                }
                ensure!(&src[..2] == b"\r\n", ParseError::invalid_body("missing CRLF after chunk data"));
                src.advance(2);
                *state = ChunkedState::Size;
            }

            ChunkedState::Trailer => match src.windows(2).position(|window| window == b"\r\n") {
                Some(0) => {
                    src.advance(2);
                    *state = ChunkedState::End;
                }
                Some(line_end) => src.advance(line_end + 2),
                None => {
                    ensure!(src.len() <= MAX_TRAILER_LINE, ParseError::invalid_body("trailer line too long"));
                    return Ok(None);
                }
            },

            ChunkedState::End => return Ok(Some(PayloadItem::Eof)),
        }
    }
}

/// Encodes one response payload according to the framing announced in its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: EncodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncodeKind {
    Length(u64),
    Chunked { eof: bool },
    UntilClose { eof: bool },
    NoBody,
}

impl PayloadEncoder {
    pub fn empty() -> Self {
        Self { kind: EncodeKind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: EncodeKind::Chunked { eof: false } }
    }

    pub fn until_close() -> Self {
        Self { kind: EncodeKind::UntilClose { eof: false } }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: EncodeKind::Length(size) }
    }

    pub fn is_finish(&self) -> bool {
        match self.kind {
            EncodeKind::Length(remaining) => remaining == 0,
            EncodeKind::Chunked { eof } | EncodeKind::UntilClose { eof } => eof,
            EncodeKind::NoBody => true,
        }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => Self::fix_length(size),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::UntilClose => Self::until_close(),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match (&mut self.kind, item) {
            (EncodeKind::NoBody, _) => Ok(()),

            (EncodeKind::Length(remaining), PayloadItem::Chunk(bytes)) => {
                if *remaining == 0 {
                    warn!("encode payload_item but no need to encode anymore");
                    return Ok(());
                }
                let len = cmp::min(*remaining, bytes.remaining() as u64);
                dst.extend_from_slice(&bytes.chunk()[..len as usize]);
                *remaining -= len;
                Ok(())
            }
            (EncodeKind::Length(_), PayloadItem::Eof) => Ok(()),

            (EncodeKind::Chunked { eof: true } | EncodeKind::UntilClose { eof: true }, _) => Ok(()),

            (EncodeKind::Chunked { .. }, PayloadItem::Chunk(bytes)) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                write!(Writer(dst), "{:X}\r\n", bytes.remaining())?;
                dst.reserve(bytes.remaining() + 2);
                dst.extend_from_slice(bytes.chunk());
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }
            (EncodeKind::Chunked { eof }, PayloadItem::Eof) => {
                *eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }

            (EncodeKind::UntilClose { .. }, PayloadItem::Chunk(bytes)) => {
                dst.extend_from_slice(bytes.chunk());
                Ok(())
            }
            (EncodeKind::UntilClose { eof }, PayloadItem::Eof) => {
                *eof = true;
                Ok(())
            }
        }
    }
}

struct Writer<'a>(&'a mut BytesMut);

impl std::io::Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
