//! Protocol types shared by the codec, the connection and handlers.
//!
//! - [`message`]: [`Message`], [`PayloadItem`] and [`PayloadSize`], the units the codec works in
//! - [`request`]: [`RequestHeader`] and the buffered [`RawRequest`] handed to a handler
//! - [`response`]: [`RawResponse`], the write side a handler owns, and the
//!   [`ResponseReceiver`] the connection drains
//! - [`completion`]: how the connection reports that a response was flushed or failed
//! - [`error`]: [`ParseError`], [`SendError`] and [`TransportError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RawRequest;
pub use request::RequestHeader;
pub use request::version_major;

mod response;
pub use response::BodyStream;
pub use response::CollectedResponse;
pub use response::Outgoing;
pub use response::RawResponse;
pub use response::ResponseHead;
pub use response::ResponseReceiver;

mod completion;
pub use completion::Completion;
pub use completion::CompletionNotifier;
pub use completion::CompletionWatch;
pub use completion::completion;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
