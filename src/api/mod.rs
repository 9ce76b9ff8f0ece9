//! HTTP server wiring.

use crate::{
    api::handlers::{account, auth, health},
    cli::globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub mod email;
pub mod error;
pub mod handlers;
pub mod openapi;

/// Avatar uploads are small images; cap the request body accordingly.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mailer = Arc::new(email::Mailer::new(globals)?);
    if !mailer.is_enabled() {
        info!("No SMTP relay configured, OTP delivery runs in log-only mode");
    }

    let app = app(pool, globals, mailer)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Assemble the router, middleware stack and shared state. Kept separate from
/// `new` so tests can exercise the full stack without a listener.
///
/// # Errors
///
/// Returns an error if an allowed origin cannot be parsed.
pub fn app(
    pool: sqlx::PgPool,
    globals: &GlobalArgs,
    mailer: Arc<email::Mailer>,
) -> Result<Router> {
    let cors = cors_layer(&globals.allowed_origins)?;

    Ok(router()
        .nest_service("/uploads", ServeDir::new(&globals.uploads_dir))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(Extension(Arc::new(globals.clone())))
                .layer(Extension(mailer))
                .layer(Extension(pool)),
        ))
}

/// All documented routes.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/send-otp", post(auth::register::send_otp))
        .route("/auth/verify-otp", post(auth::register::verify_otp))
        .route("/auth/login", post(auth::login::login))
        .route("/auth/reset/send-otp", post(auth::reset::send_otp))
        .route("/auth/reset/verify-otp", post(auth::reset::verify_otp))
        .route(
            "/auth/:account_id",
            get(account::get_account).put(account::update_account),
        )
        .route("/api-docs/openapi.json", get(openapi::serve))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    if allowed_origins.is_empty() {
        return Ok(cors.allow_origin(AllowOrigin::any()));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| parse_origin(origin))
        .collect::<Result<Vec<_>>>()?;

    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

fn parse_origin(raw: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid allowed origin: {raw}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Allowed origin must include a valid host: {raw}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
