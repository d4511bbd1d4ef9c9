/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use repute_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, None);
/// let app = repute_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use repute_shared::auth::middleware::{jwt_auth_middleware, JwtSecret};
use repute_shared::redis::StreamReader;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    pub jwt: JwtSecret,

    /// Absent when `REDIS_URL` is not configured
    pub notifications: Option<StreamReader>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, notifications: Option<StreamReader>) -> Self {
        Self {
            db,
            jwt: JwtSecret::new(&config.jwt.secret),
            config: Arc::new(config),
            notifications,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt.as_str()
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::days(self.config.invites.ttl_days)
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                  public
/// /v1/auth/{register,login,refresh}        public
/// /v1/verify/:token                        public, token is the credential
/// /v1/tenants/members                      admin+ to add
/// /v1/profile
/// /v1/{skills,educations,certifications,employments,client-projects}[/:id]
/// /v1/invites[/:id]
/// /v1/admin/questions[/:id]                admin+ to change
/// /v1/admin/reputation-weights             admin+ to change
/// /v1/reputation/{me,me/recompute,users/:user_id}
/// /v1/notifications/stream                 SSE
/// ```
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let verify_routes = Router::new().route(
        "/:token",
        get(routes::verify::show).post(routes::verify::submit),
    );

    let protected = Router::new()
        .route(
            "/tenants/members",
            get(routes::tenants::list_members).post(routes::tenants::add_member),
        )
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .nest("/skills", routes::skills::router())
        .nest("/educations", routes::records::education_router())
        .nest("/certifications", routes::records::certification_router())
        .nest("/employments", routes::records::employment_router())
        .nest("/client-projects", routes::records::client_project_router())
        .nest("/invites", routes::invites::router())
        .nest("/admin", routes::admin::router())
        .nest("/reputation", routes::reputation::router())
        .route("/notifications/stream", get(routes::notifications::stream))
        .layer(axum::middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/verify", verify_routes)
        .merge(protected);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("last-event-id"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
