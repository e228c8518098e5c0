use crate::auth;
use crate::handlers::{self, AppState};
use crate::openapi::ApiDoc;
use crate::web;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted request body (login form).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router.
///
/// With `rate_limited` the JSON API is limited to 10 req/s per client IP
/// (burst 20); the server must then be run with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn app(state: Arc<AppState>, rate_limited: bool) -> anyhow::Result<Router> {
    let mut api = Router::new()
        .route("/api/regions/", get(handlers::list_regions))
        .route("/api/states/", get(handlers::list_states))
        .route("/api/municipalities/", get(handlers::list_municipalities))
        .route("/api/districts/", get(handlers::list_districts))
        .route("/api/companies/", get(handlers::list_companies))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_login,
        ));

    if rate_limited {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(10)
                .burst_size(20)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
        );
        api = api.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let pages = Router::new()
        .route("/states/", get(web::states))
        .route("/municipalities/", get(web::municipalities))
        .route("/districts/", get(web::districts))
        .route("/companies/", get(web::companies))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));

    let app = Router::new()
        .route("/", get(web::index))
        .route("/health", get(handlers::health))
        .route(
            "/accounts/login/",
            get(auth::login_page).post(auth::login),
        )
        .route("/logout/", get(auth::logout))
        .merge(api)
        .merge(pages)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(auth::session_layer(state.sessions.clone(), &state.config))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}
