use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header_encoder::{HeaderEncoder, is_bodyless_status};
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes response heads and their payload items.
///
/// When the response answers a `HEAD` request, or its status forbids a body,
/// the head still announces the framing but no payload bytes are written.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    head_request: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks whether the next response answers a `HEAD` request.
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.as_ref().is_some_and(|encoder| !encoder.is_finish()) {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let suppress_body = self.head_request || is_bodyless_status(head.status());
                self.payload_encoder = Some(if suppress_body { PayloadEncoder::empty() } else { payload_size.into() });
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);

                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}
