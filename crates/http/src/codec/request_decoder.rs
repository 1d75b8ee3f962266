//! HTTP request decoder module
//!
//! Decodes a byte stream into request heads followed by their payload items,
//! one request after another on the same connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header_decoder::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
///
/// Requests without a body yield only the [`Message::Header`].
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // no need payload decoder in this request now
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                if !payload_size.is_empty() {
                    self.payload_decoder = Some(payload_size.into());
                }
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn pipelined_requests() {
        let raw = concat!(
            "POST /upload HTTP/1.1\r\n",
            "Transfer-Encoding: chunked\r\n\r\n",
            "3\r\nabc\r\n0\r\n\r\n",
            "GET /next HTTP/1.1\r\n\r\n",
        );
        let mut buf = BytesMut::from(raw);
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else { panic!("expect header") };
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(size, PayloadSize::Chunked);

        let Some(Message::Payload(PayloadItem::Chunk(bytes))) = decoder.decode(&mut buf).unwrap() else { panic!("expect chunk") };
        assert_eq!(&bytes[..], b"abc");

        let Some(Message::Payload(PayloadItem::Eof)) = decoder.decode(&mut buf).unwrap() else { panic!("expect eof") };

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else { panic!("expect header") };
        assert_eq!(header.uri().path(), "/next");
        assert!(size.is_empty());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
