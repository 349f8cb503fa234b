//! tsi-identify library interface
//!
//! Exposes the router, pipeline and feature extractor for the binary and
//! for integration tests.

pub mod api;
pub mod error;
pub mod features;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use tsi_common::config::CorsConfig;
use tsi_common::ServiceConfig;

use crate::services::IdentificationPipeline;

const WILDCARD: &str = "*";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Bootstrap configuration (read-only after startup)
    pub config: Arc<ServiceConfig>,
    /// Stateless per-request pipeline
    pub pipeline: Arc<IdentificationPipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let pipeline = IdentificationPipeline::new(&config);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_upload_bytes;
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health_check))
        .route("/identify-sound", post(api::identify_sound))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cross-origin policy from configuration
///
/// Wildcards cannot be combined with credentials, so with credentials
/// enabled a `"*"` entry mirrors the request instead.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let credentials = config.allow_credentials;
    let has_wildcard = |values: &[String]| values.iter().any(|v| v.trim() == WILDCARD);

    let origins = if has_wildcard(&config.allowed_origins) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::from(Any)
        }
    } else {
        AllowOrigin::list(parse_entries::<HeaderValue>(
            &config.allowed_origins,
            "origin",
        ))
    };

    let methods = if has_wildcard(&config.allowed_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::from(Any)
        }
    } else {
        AllowMethods::list(parse_entries::<Method>(&config.allowed_methods, "method"))
    };

    let headers = if has_wildcard(&config.allowed_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::from(Any)
        }
    } else {
        AllowHeaders::list(parse_entries::<HeaderName>(
            &config.allowed_headers,
            "header",
        ))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials)
}

fn parse_entries<T: std::str::FromStr>(values: &[String], kind: &str) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match value.trim().parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(value = %value, kind, "Ignoring invalid CORS entry");
                None
            }
        })
        .collect()
}
