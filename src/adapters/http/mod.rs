//! HTTP adapters - REST surface for webhooks and session creation.

pub mod subscription;

use axum::Router;
use http::{header, HeaderName, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use subscription::{
    subscription_router, SubscriptionAppState, APP_STORE_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the service router with tracing, request ids and CORS applied.
///
/// Origins that do not parse as header values are skipped with a warning.
/// An empty list disables cross-origin access.
pub fn build_router(state: SubscriptionAppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    subscription_router()
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(cors),
        )
        .with_state(state)
}
