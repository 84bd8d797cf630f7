use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use store::{DocumentStore, LedgerStore, MapDirectory, NotificationStore};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_user_auth, trace_id};
use crate::routes::{health, maps, notifications, places, visits};
use crate::services::{IdentityProvider, NotificationFanout, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: MapDirectory,
    pub ledger: LedgerStore,
    pub notifications: NotificationStore,
    pub fanout: NotificationFanout,
    pub sessions: Arc<SessionManager>,
}

pub fn create_app(
    config: Config,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
) -> Router {
    let config = Arc::new(config);

    let directory = MapDirectory::new(store.clone(), config.directory_policy());
    let ledger = LedgerStore::new(store.clone(), directory.clone(), config.merge_config());
    let notification_store = NotificationStore::new(store.clone());
    let fanout = NotificationFanout::new(notification_store.clone());
    let sessions = Arc::new(SessionManager::new(store.clone(), config.merge_config()));

    let state = AppState {
        config: config.clone(),
        store,
        identity,
        directory,
        ledger,
        notifications: notification_store,
        fanout,
        sessions,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Authenticated routes under /api/v1
    let protected_routes = Router::new()
        // Map directory
        .route("/api/v1/maps", post(maps::create_shared_map))
        .route("/api/v1/maps", get(maps::list_maps))
        .route("/api/v1/maps/default", post(maps::ensure_default_map))
        .route("/api/v1/maps/join", post(maps::join_map))
        .route("/api/v1/maps/:map_id", delete(maps::delete_map))
        .route("/api/v1/maps/:map_id/leave", post(maps::leave_map))
        .route(
            "/api/v1/maps/:map_id/members/:member_uid",
            delete(maps::remove_member),
        )
        // Map selection and sync status
        .route("/api/v1/maps/:map_id/activate", post(maps::activate_map))
        .route("/api/v1/maps/:map_id/sync", get(maps::sync_status))
        .route("/api/v1/session/end", post(maps::end_session))
        // Places: listing, search, visit filters
        .route("/api/v1/maps/:map_id/places", get(places::list_places))
        .route(
            "/api/v1/maps/:map_id/places/filter",
            get(places::filter_visits),
        )
        .route("/api/v1/search", get(places::search))
        // Visit ledger
        .route("/api/v1/maps/:map_id/visits", post(visits::record_visit))
        .route(
            "/api/v1/maps/:map_id/places/:place_id/visits/:visit_id",
            put(visits::replace_visit),
        )
        .route(
            "/api/v1/maps/:map_id/places/:place_id/visits/:visit_id",
            delete(visits::remove_visit),
        )
        // Notifications
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(notifications::mark_read),
        )
        // Auth runs for every protected route
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
