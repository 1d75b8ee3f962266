//! Turns a settled context into the bytes of its response.

use bytes::Bytes;
use http::{Method, header};
use onion_http::protocol::SendError;
use tracing::{debug, warn};

use crate::body::Body;
use crate::context::Context;
use crate::response::TEXT_PLAIN;
use crate::status;

/// Writes the response of a context whose chain settled successfully.
///
/// The first rule that applies wins:
/// 1. `respond` is off: nothing
/// 2. the response is not writable: nothing
/// 3. the status forbids a body: the head only
/// 4. `HEAD`: the head only, with the body's length when known
/// 5. no body: the status message as text
/// 6. bytes or text: as they are
/// 7. a stream: piped
/// 8. JSON: serialized
pub fn respond(ctx: &mut Context) {
    if !ctx.respond() {
        debug!("respond disabled, leaving the response to middleware");
        return;
    }

    if !ctx.writable() {
        return;
    }

    let code = ctx.status();
    let is_head = *ctx.method() == Method::HEAD;
    let version_major = ctx.request().version_major();
    let response = ctx.response_mut();

    let result = if status::is_empty_body(code) {
        response.clear_body();
        response.raw_mut().end(None)
    } else if is_head {
        if !response.headers_sent() && !response.has_header(header::CONTENT_LENGTH) {
            if let Some(length) = response.length() {
                response.set_length(length);
            }
        }
        response.raw_mut().end(None)
    } else {
        match response.take_body() {
            None => {
                let text = if version_major >= 2 || response.message().is_empty() {
                    code.as_str().to_owned()
                } else {
                    response.message().to_owned()
                };
                if !response.headers_sent() {
                    response.set_content_type_str(TEXT_PLAIN);
                    response.set_length(text.len() as u64);
                }
                response.raw_mut().end(Some(Bytes::from(text)))
            }
            Some(Body::Bytes(bytes)) => response.raw_mut().end(Some(bytes)),
            Some(Body::Text(text)) => response.raw_mut().end(Some(Bytes::from(text))),
            Some(Body::Stream(stream)) => response.raw_mut().pipe(stream),
            Some(Body::Json(value)) => {
                let json = value.to_string();
                if !response.headers_sent() {
                    response.set_length(json.len() as u64);
                }
                response.raw_mut().end(Some(Bytes::from(json)))
            }
        }
    };

    log_send_error(result);
}

fn log_send_error(result: Result<(), SendError>) {
    if let Err(e) = result {
        warn!(cause = %e, "failed to write response");
    }
}
