//! HTTP codec module for encoding and decoding HTTP messages
//!
//! - Request handling: [`RequestDecoder`] yields a [`Message::Header`](crate::protocol::Message)
//!   for every request head, followed by its payload items when it has a body.
//! - Response handling: [`ResponseEncoder`] writes the head with the framing
//!   headers that match its [`PayloadSize`](crate::protocol::PayloadSize), then the payload.
//!
//! Both plug into `tokio_util::codec::{FramedRead, FramedWrite}`.

mod body;
mod header_decoder;
mod header_encoder;
mod request_decoder;
mod response_encoder;

pub use body::{PayloadDecoder, PayloadEncoder};
pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::{HeaderEncoder, is_bodyless_status};
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
