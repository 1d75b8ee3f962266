use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use http::StatusCode;
use onion_http::handler::make_handler;
use onion_http::{
    codec::{RequestDecoder, ResponseEncoder},
    connection::HttpConnection,
    protocol::{Message, PayloadSize, RawRequest, RawResponse, ResponseHead},
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

async fn test_handler(_request: RawRequest, mut response: RawResponse) {
    let _ = response.end(Some(Bytes::from_static(b"Hello World!")));
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let mut head = ResponseHead::new(());
            *head.status_mut() = StatusCode::OK;
            let message = Message::<_, Bytes>::Header((head, PayloadSize::Length(12)));
            black_box(encoder.encode(message, &mut bytes).unwrap());
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let handler = Arc::new(make_handler(test_handler));

    c.bench_function("process_simple_request", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = handler.clone();
            async move {
                let (mut client, server) = tokio::io::duplex(8 * 1024);
                let (reader, writer) = tokio::io::split(server);
                let connection = HttpConnection::new(reader, writer);
                let task = tokio::spawn(connection.process(handler));

                client.write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n").await.unwrap();
                let mut response = Vec::new();
                client.read_to_end(&mut response).await.unwrap();
                black_box(task.await.unwrap().unwrap());
                black_box(response);
            }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
