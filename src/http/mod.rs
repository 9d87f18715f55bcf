//! HTTP surface: routing, Basic authentication and request handlers.

mod auth;
mod form;
mod handlers;
mod request_id;
mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span};

use crate::Result;
use crate::config::HttpSettings;
use crate::error::Error;
use crate::sink::CommandSink;
use crate::types::RouteName;
use crate::util::time::{Clock, SystemClock};

pub use auth::authorize;
pub use form::FormFields;
pub use request_id::REQUEST_ID_HEADER;
pub use response::{ApiError, Queued, Status};

/// Path kept for clients built against the historical misspelling.
pub const LEGACY_JSON_PATH: &str = "/push_check_result_jfon";

/// Everything a handler needs, passed explicitly.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<HttpSettings>,
    pub sink: CommandSink,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(settings: HttpSettings, sink: CommandSink) -> Self {
        Self {
            settings: Arc::new(settings),
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

/// Paths served for a route name.
pub const fn paths(route: RouteName) -> &'static [&'static str] {
    match route {
        RouteName::PushCheckResult => &["/push_check_result"],
        RouteName::PushChecksPerfdata => &["/push_checks_perfdata"],
        RouteName::PushCheckResultJson => &[LEGACY_JSON_PATH, "/push_check_result_json"],
        RouteName::Restart => &["/restart"],
        RouteName::Reload => &["/reload"],
        RouteName::Acknowledge => &["/acknowledge"],
        RouteName::Downtime => &["/downtime"],
        RouteName::Recheck => &["/recheck"],
    }
}

/// Builds the router. Routes missing from the allow-list are not registered.
pub fn router(state: AppState) -> Router {
    let mut commands: Router<AppState> = Router::new();
    let mut registered = 0_usize;
    for route in RouteName::ALL {
        if !state.settings.routes.is_enabled(route) {
            debug!(route = %route, "route disabled");
            continue;
        }
        for &path in paths(route) {
            commands = commands.route(path, command_handler(route));
            registered += 1;
        }
    }
    if registered > 0 {
        commands = commands.route_layer(from_fn_with_state(
            state.clone(),
            auth::require_credentials,
        ));
    }

    Router::new()
        .route("/status", get(handlers::status))
        .merge(commands)
        .layer(DefaultBodyLimit::max(state.settings.max_body_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(from_fn(request_id::propagate))
        .with_state(state)
}

fn command_handler(route: RouteName) -> axum::routing::MethodRouter<AppState> {
    match route {
        RouteName::PushCheckResult => post(handlers::push_check_result),
        RouteName::PushChecksPerfdata => post(handlers::push_checks_perfdata),
        RouteName::PushCheckResultJson => post(handlers::push_check_result_json),
        RouteName::Restart => post(handlers::restart),
        RouteName::Reload => post(handlers::reload),
        RouteName::Acknowledge => post(handlers::acknowledge),
        RouteName::Downtime => post(handlers::downtime),
        RouteName::Recheck => post(handlers::recheck),
    }
}

/// # Errors
///
/// Returns [`Error::Server`] when the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Server { source })
}

/// Serves `app` until `shutdown` is cancelled, then drains in-flight requests.
///
/// # Errors
///
/// Returns [`Error::Server`] if the server stops on an I/O error.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|source| Error::Server { source })?;
    info!("HTTP server stopped");
    Ok(())
}
