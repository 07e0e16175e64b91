use crate::{
    api::{
        email::EmailSender,
        handlers::{
            auth::AuthState,
            health,
            submissions::{ExportLimit, NotificationRecipients, StoragePaths},
            uploads::UPLOADS_DIR,
        },
    },
    cli::telemetry,
    db::{self, AdminSeed},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    routing::options,
};
use sqlx::{PgPool, postgres::PgPoolOptions};
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
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod email;
pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;
#[cfg(test)]
pub(crate) mod testing;

pub use openapi::openapi;

/// Request bodies (multipart uploads included) are capped at 20 MiB.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Shared handler dependencies, each exposed as an axum `Extension`.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthState>,
    pub storage: Arc<StoragePaths>,
    pub email: Arc<dyn EmailSender>,
    pub recipients: Arc<NotificationRecipients>,
    pub export_limit: ExportLimit,
}

/// Assemble the full application: documented routes, static uploads, and layers.
#[must_use]
pub fn app(pool: PgPool, services: Services, frontend_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .expose_headers([CONTENT_DISPOSITION])
        .allow_origin(AllowOrigin::exact(frontend_origin));

    let uploads = ServeDir::new(services.storage.public_root.join(UPLOADS_DIR));

    // `/uploads` and preflight-only `OPTIONS /health` stay out of the OpenAPI document.
    let (router, _openapi) = router().split_for_parts();
    router
        .route("/health", options(health::health))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
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
                .layer(Extension(services.auth))
                .layer(Extension(services.storage))
                .layer(Extension(services.email))
                .layer(Extension(services.recipients))
                .layer(Extension(services.export_limit))
                .layer(Extension(pool)),
        )
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable, bootstrapping fails, or the
/// listener cannot bind.
pub async fn new(
    port: u16,
    dsn: String,
    frontend_origin: &str,
    services: Services,
    admin_seed: Option<AdminSeed>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    db::apply_schema(&pool).await?;
    if let Some(seed) = &admin_seed {
        let iterations = services.auth.config().password_iterations();
        db::seed_admin(&pool, seed, iterations).await?;
    }

    let app = app(pool, services, frontend_origin_header(frontend_origin)?);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Gracefully shutdown");
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

/// Reduce a frontend URL to the `scheme://host[:port]` origin CORS compares against.
///
/// # Errors
/// Returns an error if the URL does not parse or has no host.
pub fn frontend_origin_header(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend origin: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_keeps_port() -> Result<()> {
        assert_eq!(
            frontend_origin_header("http://localhost:5173/admin/")?,
            "http://localhost:5173"
        );
        assert_eq!(
            frontend_origin_header("https://purplecrunch.test")?,
            "https://purplecrunch.test"
        );
        Ok(())
    }

    #[test]
    fn origin_requires_host() {
        assert!(frontend_origin_header("not a url").is_err());
        assert!(frontend_origin_header("mailto:staff@purple.test").is_err());
    }
}
