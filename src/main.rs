use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use services::ai_gateway::AiGateway;
use services::movement::MovementAnalyzer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub ai: AiGateway,
    pub analyzer: MovementAnalyzer,
    pub rate_limiter: RateLimitState,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulsefit_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    if config.dev_mode {
        tracing::info!("Development mode: AI gateway calls are bypassed");
    }

    // Database
    let db = db::create_pool(&config.database_url).await;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    let ai = AiGateway::new(&config);
    let analyzer = MovementAnalyzer::new(ai.clone(), config.dev_mode);
    let rate_limiter = RateLimitState::new();

    let state = AppState {
        db,
        config: config.clone(),
        ai,
        analyzer,
        rate_limiter,
    };

    // Auth routes with rate limiting
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route(
            "/api/billing/webhook",
            post(handlers::billing::stripe_webhook),
        )
        .merge(auth_routes);

    let protected_routes = Router::new()
        .route("/api/auth/user", get(handlers::auth::me))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/users/me", patch(handlers::users::update_profile))
        .route("/api/users/me", delete(handlers::users::delete_account))
        // Dashboard
        .route("/api/dashboard/stats", get(handlers::dashboard::get_stats))
        .route(
            "/api/dashboard/analytics",
            get(handlers::dashboard::get_analytics),
        )
        // Movement analysis
        .route(
            "/api/movement-analysis",
            post(handlers::analysis::analyze_movement),
        )
        .route(
            "/api/movement-analysis",
            get(handlers::analysis::list_analyses),
        )
        .route(
            "/api/movement-analysis/validate",
            post(handlers::analysis::validate_form),
        )
        // Workout plans
        .route(
            "/api/workout-plans/generate",
            post(handlers::plans::generate_plan),
        )
        .route("/api/workout-plans", get(handlers::plans::list_plans))
        .route("/api/workout-plans/:id", get(handlers::plans::get_plan))
        .route("/api/workout-plans/:id", put(handlers::plans::update_plan))
        .route(
            "/api/workout-plans/:id/adapt",
            post(handlers::plans::adapt_plan),
        )
        .route(
            "/api/workout-plans/:id/progression",
            post(handlers::plans::progression_plan),
        )
        .route(
            "/api/exercises/recommended",
            get(handlers::plans::recommended_exercises),
        )
        // Workout sessions
        .route(
            "/api/workout-sessions",
            post(handlers::sessions::create_session),
        )
        .route(
            "/api/workout-sessions",
            get(handlers::sessions::list_sessions),
        )
        // Gamification
        .route(
            "/api/achievements",
            get(handlers::achievements::list_achievements),
        )
        .route(
            "/api/achievements/check",
            post(handlers::achievements::check_achievements),
        )
        .route(
            "/api/gamification/level",
            get(handlers::achievements::get_level),
        )
        .route(
            "/api/gamification/message",
            get(handlers::achievements::get_motivational_message),
        )
        // Wearables & health data
        .route("/api/wearables/connect", post(handlers::wearables::connect))
        .route("/api/wearables/sync", post(handlers::wearables::sync))
        .route(
            "/api/wearables",
            get(handlers::wearables::list_integrations),
        )
        .route(
            "/api/wearables/providers",
            get(handlers::wearables::providers),
        )
        .route(
            "/api/wearables/:provider",
            delete(handlers::wearables::disconnect),
        )
        .route(
            "/api/health-data",
            get(handlers::wearables::list_health_data),
        )
        .route(
            "/api/health-data/summary",
            get(handlers::wearables::health_data_summary),
        )
        // Questionnaires
        .route(
            "/api/questionnaires",
            post(handlers::questionnaires::submit_questionnaire),
        )
        .route(
            "/api/questionnaires",
            get(handlers::questionnaires::list_questionnaires),
        )
        // Nutrition
        .route("/api/nutrition/advice", post(handlers::nutrition::get_advice))
        // Billing
        .route(
            "/api/billing/subscription",
            get(handlers::billing::get_subscription),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let allowed_origins: Vec<axum::http::HeaderValue> = {
        let mut origins = vec![config
            .frontend_url
            .parse::<axum::http::HeaderValue>()
            .unwrap()];
        // In dev, also allow LAN access (e.g. testing from another device)
        if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
            for o in extra.split(',') {
                if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                    origins.push(hv);
                }
            }
        }
        origins
    };
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    // Client IP is needed for rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .unwrap();
}
