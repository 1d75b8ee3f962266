//! The outbound half of one exchange.
//!
//! [`RawResponse`] is what a handler writes to. It never touches the socket:
//! every write becomes an [`Outgoing`] message on an unbounded channel that the
//! connection drains and encodes. That keeps all writes synchronous for the
//! handler while the connection keeps control of framing and flushing.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::{HeaderMap, Method, Response, StatusCode, Version, header};
use tokio::sync::mpsc;

use crate::protocol::completion::{CompletionNotifier, CompletionWatch, completion};
use crate::protocol::request::version_major;
use crate::protocol::{PayloadSize, SendError, TransportError};

/// Type alias for HTTP response headers.
///
/// `http::Response<()>` with an empty body placeholder: the payload follows as
/// separate messages.
pub type ResponseHead = Response<()>;

/// A streamed response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// One write emitted by a [`RawResponse`], in emission order.
pub enum Outgoing {
    Head(ResponseHead, PayloadSize),
    Chunk(Bytes),
    Stream(BodyStream),
    End,
}

impl fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outgoing::Head(head, size) => f.debug_tuple("Head").field(&head.status()).field(size).finish(),
            Outgoing::Chunk(bytes) => f.debug_tuple("Chunk").field(&bytes.len()).finish(),
            Outgoing::Stream(_) => f.write_str("Stream"),
            Outgoing::End => f.write_str("End"),
        }
    }
}

/// The writable handle of one response.
#[derive(Debug)]
pub struct RawResponse {
    version: Version,
    head_request: bool,
    status: StatusCode,
    headers: HeaderMap,
    headers_sent: bool,
    ended: bool,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    completion: CompletionWatch,
}

/// The connection side of a [`RawResponse`].
#[derive(Debug)]
pub struct ResponseReceiver {
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    notifier: CompletionNotifier,
}

impl RawResponse {
    /// Creates the response handle for a request with the given version and method.
    pub fn channel(version: Version, method: &Method) -> (RawResponse, ResponseReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notifier, watch) = completion();

        let response = RawResponse {
            version,
            head_request: method == Method::HEAD,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            headers_sent: false,
            ended: false,
            outgoing: tx,
            completion: watch,
        };

        (response, ResponseReceiver { outgoing: rx, notifier })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn version_major(&self) -> u8 {
        version_major(self.version)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// False once the response ended, the connection went away or reported a failure.
    pub fn writable(&self) -> bool {
        !self.ended && !self.outgoing.is_closed() && !self.completion.is_failed()
    }

    /// A watcher for the outcome of this response on its connection.
    pub fn completion(&self) -> CompletionWatch {
        self.completion.clone()
    }

    /// Sends the head now, framed for a body of unknown size unless a
    /// `Content-Length` header is set.
    pub fn write_head(&mut self) -> Result<(), SendError> {
        if self.headers_sent {
            return Ok(());
        }
        let size = self.streaming_size();
        self.send_head(size)
    }

    /// Writes one chunk of the body, sending the head first if needed.
    pub fn write(&mut self, chunk: Bytes) -> Result<(), SendError> {
        if self.ended {
            return Err(SendError::AlreadyEnded);
        }
        self.write_head()?;
        if chunk.is_empty() {
            return Ok(());
        }
        self.send(Outgoing::Chunk(chunk))
    }

    /// Ends the response, optionally with a last piece of body.
    ///
    /// When the head was not sent yet, `Some(body)` is framed with its exact
    /// length and `None` with an empty body. Responses to HEAD keep the
    /// `Content-Length` the handler declared.
    pub fn end(&mut self, body: Option<Bytes>) -> Result<(), SendError> {
        if self.ended {
            return Err(SendError::AlreadyEnded);
        }

        if !self.headers_sent {
            let size = match &body {
                Some(bytes) => PayloadSize::Length(bytes.len() as u64),
                None if self.head_request => self.declared_length().map_or(PayloadSize::Empty, PayloadSize::Length),
                None => PayloadSize::Empty,
            };
            self.send_head(size)?;
        }

        if let Some(bytes) = body.filter(|bytes| !bytes.is_empty()) {
            self.send(Outgoing::Chunk(bytes))?;
        }

        self.ended = true;
        self.send(Outgoing::End)
    }

    /// Hands the whole remaining body to the connection as a stream and ends the response.
    pub fn pipe(&mut self, stream: BodyStream) -> Result<(), SendError> {
        if self.ended {
            return Err(SendError::AlreadyEnded);
        }
        self.write_head()?;
        self.send(Outgoing::Stream(stream))?;
        self.ended = true;
        self.send(Outgoing::End)
    }

    fn declared_length(&self) -> Option<u64> {
        self.headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
    }

    fn streaming_size(&self) -> PayloadSize {
        match self.declared_length() {
            Some(length) => PayloadSize::Length(length),
            None if self.version == Version::HTTP_11 => PayloadSize::Chunked,
            None => PayloadSize::UntilClose,
        }
    }

    fn send_head(&mut self, size: PayloadSize) -> Result<(), SendError> {
        let mut head = ResponseHead::new(());
        *head.status_mut() = self.status;
        *head.version_mut() = self.version;
        *head.headers_mut() = self.headers.clone();

        self.send(Outgoing::Head(head, size))?;
        self.headers_sent = true;
        Ok(())
    }

    fn send(&self, item: Outgoing) -> Result<(), SendError> {
        self.outgoing.send(item).map_err(|_closed| SendError::Closed)
    }
}

/// Everything a response emitted, drained from its [`ResponseReceiver`].
#[derive(Debug, Default)]
pub struct CollectedResponse {
    pub head: Option<ResponseHead>,
    pub payload_size: Option<PayloadSize>,
    pub body: Bytes,
    pub ended: bool,
}

impl CollectedResponse {
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(Response::status)
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.head.as_ref()?.headers().get(name)?.to_str().ok()
    }
}

impl ResponseReceiver {
    /// Receives the next emitted write, `None` once the handle is dropped and drained.
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.outgoing.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Outgoing> {
        self.outgoing.try_recv().ok()
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    /// Drains every write until the [`RawResponse`] is dropped, reading streams to the end.
    ///
    /// Used by in-process callers that want the response without a socket.
    pub async fn collect(mut self) -> io::Result<CollectedResponse> {
        let mut collected = CollectedResponse::default();
        let mut body = BytesMut::new();

        while let Some(item) = self.outgoing.recv().await {
            match item {
                Outgoing::Head(head, size) => {
                    collected.head = Some(head);
                    collected.payload_size = Some(size);
                }
                Outgoing::Chunk(bytes) => body.extend_from_slice(&bytes),
                Outgoing::Stream(mut stream) => {
                    while let Some(chunk) = stream.next().await {
                        match chunk {
                            Ok(bytes) => body.extend_from_slice(&bytes),
                            Err(e) => {
                                self.notifier.fail(TransportError::io(io::Error::new(e.kind(), e.to_string())));
                                return Err(e);
                            }
                        }
                    }
                }
                Outgoing::End => {
                    collected.ended = true;
                    self.notifier.finish();
                }
            }
        }

        collected.body = body.freeze();
        Ok(collected)
    }
}
