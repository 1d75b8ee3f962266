use onion_web::{Application, Context, MiddlewareResult, Next, middleware_fn};
use tracing::info;

async fn hello_world(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
    info!(path = ctx.path(), "hello world");
    ctx.set_body("Hello world");
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mut app = Application::new();
    app.register(middleware_fn(hello_world)).expect("hello_world is a middleware");
    app.listen("127.0.0.1:3000").await
}
