pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, redis::RedisClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Arc<RedisClient>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    // Authentication is enforced per handler by the AuthUser extractor;
    // read endpoints take OptionalAuthUser.
    let routes = Router::new()
        // Topic routes
        .route("/api/topics", post(handlers::topics::create_topic))
        .route("/api/topics/{topic_id}", get(handlers::topics::get_topic))
        .route(
            "/api/topics/{topic_id}/vote",
            post(handlers::topics::vote_topic).delete(handlers::topics::retract_topic_vote),
        )
        // Comment routes
        .route(
            "/api/topics/{topic_id}/comments",
            get(handlers::comments::get_topic_comments).post(handlers::comments::create_comment),
        )
        .route(
            "/api/comments/{comment_id}",
            get(handlers::comments::get_comment),
        )
        .route(
            "/api/comments/{comment_id}/vote",
            post(handlers::comments::vote_comment),
        )
        // User routes
        .route("/api/users/me/karma", get(handlers::users::get_my_karma))
        .route(
            "/api/users/me/achievements",
            get(handlers::users::get_my_achievements),
        )
        .route("/api/achievements", get(handlers::users::list_achievements));

    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
