//! Several layers working together.
//!
//! ```text
//! curl -v http://127.0.0.1:3000/
//! curl -v http://127.0.0.1:3000/users?id=7
//! curl -v http://127.0.0.1:3000/admin
//! ```

use std::time::Instant;

use async_trait::async_trait;
use http::StatusCode;
use http::header::HeaderValue;
use onion_web::middleware::Interceptor;
use onion_web::{
    Application, BoxError, Context, Failure, MiddlewareResult, NonErrorThrownError, Next, legacy, listener_fn,
    middleware_fn,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
struct RequestId(u64);

#[derive(Deserialize)]
struct UserQuery {
    id: u64,
}

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn response_time(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
    let start = Instant::now();
    next.run(ctx).await?;
    let elapsed = format!("{}us", start.elapsed().as_micros());
    ctx.set_header("x-response-time", HeaderValue::from_str(&elapsed)?);
    Ok(())
}

async fn request_id(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
    let id = ctx.header("x-request-id").and_then(|id| id.parse().ok()).unwrap_or_default();
    ctx.state_mut().insert(RequestId(id));
    next.run(ctx).await
}

async fn users(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
    if ctx.path() != "/users" {
        return next.run(ctx).await;
    }

    let query: UserQuery = ctx.request().query().map_err(|e| ctx.throw(StatusCode::BAD_REQUEST, e.to_string()))?;
    let user = User { id: query.id, name: format!("user-{}", query.id) };
    ctx.set_body(onion_web::Body::json(&user)?);
    Ok(())
}

async fn admin(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
    if ctx.path() == "/admin" {
        let authorized = ctx.header("authorization").is_some();
        ctx.assert(authorized, StatusCode::UNAUTHORIZED, "credentials required")?;
        ctx.set_body("welcome");
        return Ok(());
    }
    next.run(ctx).await
}

async fn home(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
    if ctx.path() == "/" {
        let RequestId(id) = ctx.state().get::<RequestId>().cloned().unwrap_or(RequestId(0));
        ctx.set_body(format!("<h1>home</h1><p>request {id}</p>"));
    }
    Ok(())
}

struct PoweredBy;

#[async_trait]
impl Interceptor for PoweredBy {
    async fn on_response(&self, ctx: &mut Context) -> Result<(), BoxError> {
        ctx.set_header("x-powered-by", HeaderValue::from_static("onion"));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mut app = Application::builder().proxy(true).build();

    app.register(middleware_fn(response_time))
        .and_then(|app| app.register(legacy(PoweredBy)))
        .and_then(|app| app.register(middleware_fn(request_id)))
        .and_then(|app| app.register(middleware_fn(users)))
        .and_then(|app| app.register(middleware_fn(admin)))
        .and_then(|app| app.register(middleware_fn(home)))
        .expect("all entries are middleware");

    app.on_error(listener_fn(|failure: &Failure, ctx: &Context| {
        if !failure.is_error() {
            return Err(NonErrorThrownError::new(failure.to_string()));
        }
        warn!(cause = %failure, path = ctx.path(), ip = %ctx.ip(), "request failed");
        Ok(())
    }));

    info!(app = ?app, "starting");
    app.listen("127.0.0.1:3000").await
}
