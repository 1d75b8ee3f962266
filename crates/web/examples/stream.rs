//! Streams a server-sent event every second.
//!
//! ```text
//! curl -N http://127.0.0.1:3000/
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use http::header::{self, HeaderValue};
use onion_web::{Application, Body, Context, MiddlewareResult, Next, middleware_fn};
use tokio::sync::mpsc;

async fn events(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
    let (tx, mut rx) = mpsc::channel::<std::io::Result<Bytes>>(2);

    tokio::spawn(async move {
        for i in 0..5 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if tx.send(Ok(Bytes::from(format!("data: {i}\n\n")))).await.is_err() {
                break;
            }
        }
    });

    ctx.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    ctx.set_header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    ctx.set_body(Body::stream(stream::poll_fn(move |cx| rx.poll_recv(cx))));
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mut app = Application::new();
    app.register(middleware_fn(events)).expect("events is a middleware");
    app.listen("127.0.0.1:3000").await
}
