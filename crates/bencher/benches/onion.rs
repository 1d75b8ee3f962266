use std::hint::black_box;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::{Method, Version};
use onion_http::handler::Handler;
use onion_http::protocol::{RawRequest, RawResponse};
use onion_web::{Application, Context, Dispatcher, MiddlewareResult, Next, middleware_fn};

async fn pass(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
    next.run(ctx).await
}

async fn hello(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
    ctx.set_body("Hello World!");
    Ok(())
}

fn dispatcher(depth: usize) -> Dispatcher {
    let mut app = Application::builder().silent(true).build();
    for _ in 0..depth {
        app.register(middleware_fn(pass)).expect("pass is a middleware");
    }
    app.register(middleware_fn(hello)).expect("hello is a middleware");
    app.callback()
}

fn request() -> RawRequest {
    let request = http::Request::builder()
        .method(Method::GET)
        .uri("/")
        .header(http::header::HOST, "localhost")
        .body(Bytes::new())
        .expect("static request should be valid");
    RawRequest::from(request)
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime should build");
    let mut group = criterion.benchmark_group("dispatch");

    for depth in [0_usize, 4, 16] {
        let dispatcher = dispatcher(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &dispatcher, |b, dispatcher| {
            b.to_async(&runtime).iter(|| async {
                let (response, receiver) = RawResponse::channel(Version::HTTP_11, &Method::GET);
                dispatcher.handle(request(), response).await;
                black_box(receiver.collect().await.expect("response should be collected"));
            });
        });
    }

    group.finish();
}

criterion_group!(onion, benchmark_dispatch);
criterion_main!(onion);
