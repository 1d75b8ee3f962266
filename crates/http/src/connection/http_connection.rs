use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::{HeaderValue, Method, StatusCode, Version, header};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::date::DateService;
use crate::ensure;
use crate::handler::Handler;
use crate::protocol::{
    HttpError, Message, Outgoing, ParseError, PayloadItem, PayloadSize, RawRequest, RawResponse, RequestHeader, ResponseHead,
    ResponseReceiver, SendError, TransportError,
};

/// Default upper bound for a buffered request body.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

type OutMessage = Message<(ResponseHead, PayloadSize)>;

/// An HTTP/1.x connection that feeds requests to a [`Handler`] one at a time.
///
/// `HttpConnection` handles the full lifecycle of a connection:
/// - Reading and decoding request heads, buffering their bodies
/// - Answering `Expect: 100-continue`
/// - Writing whatever the handler emits through its [`RawResponse`]
/// - Reporting to the handler when the response was flushed, or failed because
///   the socket errored or the peer stopped reading
/// - Keep-alive and pipelined requests
///
/// A response the handler never ended is answered with an empty 500 when
/// nothing was written yet, otherwise the connection is closed.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    remote_addr: Option<SocketAddr>,
    max_body_size: usize,
    /// next request read while the previous one was still being answered
    pending: Option<Result<(RequestHeader, PayloadSize), ParseError>>,
}

/// Bookkeeping for one request/response exchange.
#[derive(Debug)]
struct Exchange {
    keep_alive: bool,
    handled: bool,
    drained: bool,
    reading: bool,
    head_sent: bool,
    ended: bool,
    write_error: Option<SendError>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            remote_addr: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            pending: None,
        }
    }

    #[must_use]
    pub fn with_remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            let next = match self.pending.take() {
                Some(next) => Some(next),
                None => self.read_head().await,
            };

            let (header, payload_size) = match next {
                Some(Ok(next)) => next,
                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    self.reject(&e).await;
                    return Err(e.into());
                }
                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            };

            if !self.do_process(header, payload_size, handler.as_ref()).await? {
                debug!("connection not kept alive, shutdown");
                let _ = self.framed_write.get_mut().shutdown().await;
                return Ok(());
            }
        }
    }

    async fn read_head(&mut self) -> Option<Result<(RequestHeader, PayloadSize), ParseError>> {
        match self.framed_read.next().await? {
            Ok(Message::Header(next)) => Some(Ok(next)),
            Ok(Message::Payload(_)) => Some(Err(ParseError::invalid_body("need header while receive body"))),
            Err(e) => Some(Err(e)),
        }
    }

    /// Answers one request. Returns whether the connection stays open.
    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<bool, HttpError>
    where
        H: Handler + ?Sized,
    {
        let body = match self.receive_body(&header, payload_size).await {
            Ok(body) => body,
            Err(e) => {
                error!(cause = %e, "can't receive request body");
                self.reject(&e).await;
                return Err(e.into());
            }
        };

        let version = header.version();
        let keep_alive = header.keep_alive();
        let head_request = header.method() == Method::HEAD;
        self.framed_write.encoder_mut().set_head_request(head_request);

        let (response, mut receiver) = RawResponse::channel(version, header.method());
        let request = RawRequest::new(header, body).with_remote_addr(self.remote_addr);

        let mut exchange = Exchange {
            keep_alive,
            handled: false,
            drained: false,
            reading: true,
            head_sent: false,
            ended: false,
            write_error: None,
        };

        let handle = handler.handle(request, response);
        tokio::pin!(handle);

        while !(exchange.handled && exchange.drained) {
            select! {
                biased;

                () = &mut handle, if !exchange.handled => {
                    exchange.handled = true;
                }

                outgoing = receiver.recv(), if !exchange.drained => match outgoing {
                    Some(outgoing) => self.write_outgoing(outgoing, &receiver, &mut exchange).await,
                    None => exchange.drained = true,
                },

                next = self.framed_read.next(), if exchange.reading => {
                    exchange.reading = false;
                    match next {
                        Some(Ok(Message::Header(next))) => self.pending = Some(Ok(next)),
                        Some(Ok(Message::Payload(_))) => {
                            self.pending = Some(Err(ParseError::invalid_body("need header while receive body")));
                        }
                        Some(Err(ParseError::Io { source })) => {
                            warn!(cause = %source, "connection error while answering request");
                            receiver.notifier().fail(TransportError::io(source));
                            exchange.keep_alive = false;
                        }
                        Some(Err(e)) => self.pending = Some(Err(e)),
                        // half-close: the peer is done sending but still reads the response
                        None => {
                            debug!("peer closed its write side while answering request");
                            exchange.keep_alive = false;
                        }
                    }
                }
            }
        }

        if let Some(e) = exchange.write_error {
            return Err(e.into());
        }

        if !exchange.ended {
            exchange.keep_alive = false;
            if exchange.head_sent {
                warn!("response was not finished, closing connection");
            } else if receiver.notifier().current().is_pending() {
                warn!("handler left the response unanswered, responding 500");
                self.send_status(StatusCode::INTERNAL_SERVER_ERROR, version).await?;
            }
        }

        Ok(exchange.keep_alive)
    }

    async fn receive_body(&mut self, header: &RequestHeader, payload_size: PayloadSize) -> Result<Bytes, ParseError> {
        if payload_size.is_empty() {
            return Ok(Bytes::new());
        }

        if let PayloadSize::Length(length) = payload_size {
            ensure!(length <= self.max_body_size as u64, ParseError::too_large_body(self.max_body_size));
        }

        if header.expects_continue() {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            writer.flush().await?;
            info!("receive expect request header, sent continue response");
        }

        let mut body = BytesMut::new();
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    ensure!(body.len() + bytes.len() <= self.max_body_size, ParseError::too_large_body(self.max_body_size));
                    body.extend_from_slice(&bytes);
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => return Ok(body.freeze()),
                Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("receive request head while reading body")),
                Some(Err(e)) => return Err(e),
                None => return Err(ParseError::io(io::Error::from(io::ErrorKind::UnexpectedEof))),
            }
        }
    }

    async fn write_outgoing(&mut self, outgoing: Outgoing, receiver: &ResponseReceiver, exchange: &mut Exchange) {
        // once writing failed everything else the handler emits is dropped
        if exchange.write_error.is_some() {
            return;
        }

        let result = match outgoing {
            Outgoing::Head(mut head, payload_size) => {
                prepare_head(&mut head, payload_size, &mut exchange.keep_alive);
                exchange.head_sent = true;
                let message: OutMessage = Message::Header((head, payload_size));
                self.framed_write.feed(message).await
            }
            Outgoing::Chunk(bytes) => self.framed_write.send(Message::Payload(PayloadItem::Chunk(bytes))).await,
            Outgoing::Stream(mut stream) => {
                let mut result = Ok(());
                while let Some(chunk) = stream.next().await {
                    result = match chunk {
                        Ok(bytes) => self.framed_write.send(Message::Payload(PayloadItem::Chunk(bytes))).await,
                        Err(e) => Err(SendError::io(e)),
                    };
                    if result.is_err() {
                        break;
                    }
                }
                result
            }
            Outgoing::End => {
                let message: OutMessage = Message::Payload(PayloadItem::Eof);
                match self.framed_write.send(message).await {
                    Ok(()) => {
                        exchange.ended = true;
                        receiver.notifier().finish();
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = result {
            error!(cause = %e, "failed to write response");
            receiver.notifier().fail(TransportError::from(e));
            exchange.keep_alive = false;
            exchange.write_error = Some(SendError::Closed);
        }
    }

    /// Answers a request that could not be read and gives up on the connection.
    async fn reject(&mut self, e: &ParseError) {
        if matches!(e, ParseError::Io { .. }) {
            return;
        }
        if let Err(send_error) = self.send_status(e.status_code(), Version::HTTP_11).await {
            warn!(cause = %send_error, "failed to send error response");
        }
    }

    async fn send_status(&mut self, status: StatusCode, version: Version) -> Result<(), SendError> {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        *head.version_mut() = version;
        head.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
        head.headers_mut().insert(header::DATE, DateService::global().http_date());

        self.framed_write.encoder_mut().set_head_request(false);
        let message: OutMessage = Message::Header((head, PayloadSize::Empty));
        self.framed_write.send(message).await
    }
}

/// Adds `Date` and the `Connection` header matching the keep-alive decision.
fn prepare_head(head: &mut ResponseHead, payload_size: PayloadSize, keep_alive: &mut bool) {
    let version = head.version();
    let headers = head.headers_mut();

    if !headers.contains_key(header::DATE) {
        headers.insert(header::DATE, DateService::global().http_date());
    }

    let handler_closes = headers
        .get(header::CONNECTION)
        .is_some_and(|value| value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close")));
    if handler_closes || payload_size == PayloadSize::UntilClose {
        *keep_alive = false;
    }

    match version {
        Version::HTTP_11 if !*keep_alive => {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        Version::HTTP_10 if *keep_alive => {
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        }
        _ => {}
    }
}
