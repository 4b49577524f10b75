use crate::{
    api::handlers::{
        accounts,
        auth::{self, AuthConfig, AuthState, PgCredentialStore, SystemClock, middleware::require_auth},
        health,
        memberships::{self, MembershipStore, PgMembershipStore},
        promotions::{self, PgPromotionStore, PromotionStore},
    },
    db,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post, put},
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod email;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Shared collaborators injected into every request.
#[derive(Clone)]
pub struct Services {
    pub pool: PgPool,
    pub auth_state: Arc<AuthState>,
    pub promotions: Arc<dyn PromotionStore>,
    pub memberships: Arc<dyn MembershipStore>,
    pub email_sender: Arc<dyn email::EmailSender>,
}

impl Services {
    /// Postgres-backed services sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool, auth_config: AuthConfig) -> Self {
        let auth_state = Arc::new(AuthState::new(
            auth_config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(SystemClock),
        ));
        Self {
            promotions: Arc::new(PgPromotionStore::new(pool.clone())),
            memberships: Arc::new(PgMembershipStore::new(pool.clone())),
            email_sender: Arc::new(email::LogEmailSender),
            auth_state,
            pool,
        }
    }
}

/// Build the full HTTP application.
///
/// # Errors
/// Returns an error if the configured app domain is not a valid origin.
pub fn router(services: Services, request_timeout: Duration) -> Result<Router> {
    let frontend_origin = frontend_origin(services.auth_state.config().app_domain())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin));

    let public = Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/v1/auth/login", post(auth::login::login))
        .route(
            "/v1/auth/forgot-password",
            post(auth::password::forgot_password),
        );

    let protected = Router::new()
        .route("/v1/auth/account", get(auth::login::account))
        .route("/v1/auth/set-password", post(auth::password::set_password))
        .route(
            "/v1/promotions/:id/permission",
            get(promotions::redeem::permission),
        )
        .route("/v1/promotions/:id/redeem", post(promotions::redeem::redeem))
        .route("/v1/promotions", post(promotions::manage::create))
        .route(
            "/v1/promotions/:id",
            put(promotions::manage::update).delete(promotions::manage::delete),
        )
        .route(
            "/v1/organizations/:id/promotions",
            get(promotions::manage::list_by_organization),
        )
        .route("/v1/accounts/:id/redemptions", get(accounts::redemptions))
        .route(
            "/v1/accounts/:id/promotions/:promotion_id/redemptions",
            get(accounts::promotion_redemptions),
        )
        .route(
            "/v1/memberships/:id/accounts",
            get(memberships::accounts::list).post(memberships::grant::grant),
        )
        .route(
            "/v1/memberships/:id/accounts/:account_id",
            put(memberships::accounts::update).delete(memberships::grant::revoke),
        )
        .route_layer(middleware::from_fn_with_state(
            services.auth_state.clone(),
            require_auth,
        ));

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
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
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors)
                .layer(Extension(services.auth_state))
                .layer(Extension(services.promotions))
                .layer(Extension(services.memberships))
                .layer(Extension(services.email_sender))
                .layer(Extension(services.pool)),
        );

    Ok(app)
}

/// Connect to the database and serve until Ctrl-C.
///
/// # Errors
/// Returns an error if the database, listener or server fails.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    request_timeout: Duration,
) -> Result<()> {
    let pool = db::connect(&dsn).await?;
    let app = router(Services::postgres(pool, auth_config), request_timeout)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
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

fn frontend_origin(app_domain: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(app_domain).with_context(|| format!("Invalid app domain: {app_domain}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("App domain must include a valid host: {app_domain}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
