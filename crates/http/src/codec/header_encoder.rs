//! Serializes a response head: status line, framing headers and header fields.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, StatusCode, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Statuses that never carry a body, whatever the handler asked for.
pub fn is_bodyless_status(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = match head.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        let status = head.status();
        write!(FastWrite(dst), "{} {} {}\r\n", version, status.as_str(), status.canonical_reason().unwrap_or(""))?;

        let headers = head.headers_mut();
        if is_bodyless_status(status) {
            headers.remove(header::CONTENT_LENGTH);
            headers.remove(header::TRANSFER_ENCODING);
        } else {
            match payload_size {
                PayloadSize::Length(n) => {
                    headers.remove(header::TRANSFER_ENCODING);
                    headers.insert(header::CONTENT_LENGTH, n.into());
                }
                PayloadSize::Chunked => {
                    const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
                    headers.remove(header::CONTENT_LENGTH);
                    headers.insert(header::TRANSFER_ENCODING, CHUNKED);
                }
                PayloadSize::UntilClose => {
                    headers.remove(header::CONTENT_LENGTH);
                    headers.remove(header::TRANSFER_ENCODING);
                }
                PayloadSize::Empty => {
                    const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                    headers.remove(header::TRANSFER_ENCODING);
                    headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
                }
            }
        }

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writes formatted output straight into a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(status: StatusCode, version: Version) -> ResponseHead {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        *head.version_mut() = version;
        head
    }

    #[test]
    fn writes_length_framing() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head(StatusCode::OK, Version::HTTP_11), PayloadSize::Length(11)), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 11\r\n\r\n");
    }

    #[test]
    fn http10_streaming_has_no_framing_headers() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head(StatusCode::OK, Version::HTTP_10), PayloadSize::UntilClose), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.0 200 OK\r\n\r\n");
    }

    #[test]
    fn no_content_drops_length() {
        let mut response = head(StatusCode::NO_CONTENT, Version::HTTP_11);
        response.headers_mut().insert(header::CONTENT_LENGTH, 5.into());

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((response, PayloadSize::Empty), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 204 No Content\r\n\r\n");
    }
}
