//! HTTP control surface.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | / | Service info |
//! | GET | /api/whatsapp/status | Status snapshot |
//! | POST | /api/whatsapp/init | Start the session |
//! | POST | /api/whatsapp/send | Send a message |
//! | POST | /api/whatsapp/disconnect | Tear the session down |
//! | POST | /api/whatsapp/reconnect | Force a fresh session |
//! | POST | /api/whatsapp/logout | Disconnect and forget credentials |

pub mod envelope;
pub mod handlers;
pub mod validate;

use std::future::Future;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use chatgate::LifecycleManager;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
	pub manager: LifecycleManager,
}

impl AppState {
	pub fn new(manager: LifecycleManager) -> Self {
		Self { manager }
	}
}

pub fn create_router(state: AppState) -> Router {
	let api = Router::new()
		.route("/status", get(handlers::status))
		.route("/init", post(handlers::init))
		.route("/send", post(handlers::send))
		.route("/disconnect", post(handlers::disconnect))
		.route("/reconnect", post(handlers::reconnect))
		.route("/logout", post(handlers::logout));

	Router::new()
		.route("/", get(handlers::index))
		.nest("/api/whatsapp", api)
		.fallback(handlers::not_found)
		.layer(middleware::from_fn(log_request))
		.with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
	let method = request.method().clone();
	let path = request.uri().path().to_string();
	let started = Instant::now();

	let response = next.run(request).await;
	info!(
		target = "chatgate.http",
		%method,
		path,
		status = response.status().as_u16(),
		elapsed_ms = started.elapsed().as_millis() as u64,
		"request"
	);
	response
}

/// Serves until `shutdown` resolves, then disconnects the session.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
	F: Future<Output = ()> + Send + 'static,
{
	let manager = state.manager.clone();
	if let Ok(addr) = listener.local_addr() {
		info!(target = "chatgate.http", %addr, "listening");
	}

	axum::serve(listener, create_router(state)).with_graceful_shutdown(shutdown).await?;

	debug!(target = "chatgate.http", "server stopped; disconnecting session");
	manager.disconnect().await;
	Ok(())
}
