//! Route definitions for the art catalog API
//!
//! This module configures all HTTP routes and maps them to their handlers.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    add_variation, create_group, create_lookup, delete_group, designer_stats, edit_variation_link,
    get_group, health, list_groups, list_lookups, record_download, remove_variation,
    replace_variation_image, set_primary, update_group,
};
use crate::middleware::{auth_middleware, caller_middleware};

/// Upload bodies carry base64 images
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Creates the application router
///
/// # Route Definitions
///
/// - `GET /health` - liveness probe (public)
/// - `GET|POST /api/groups` - list / create groups
/// - `GET|PATCH|DELETE /api/groups/{id}` - read / update / delete a group
/// - `POST /api/groups/{id}/downloads` - resolve and count a download
/// - `POST /api/groups/{id}/variations` - add a variation
/// - `PUT /api/groups/{id}/primary` - move the primary flag
/// - `PATCH|DELETE /api/groups/{id}/variations/{vid}` - edit link / delete a variation
/// - `PUT /api/groups/{id}/variations/{vid}/image` - replace a variation's image
/// - `GET /api/designers/{id}/stats` - designer statistics
/// - `GET|POST /api/lookups/{kind}` - categories, formats, file-types
///
/// Every `/api` route passes the shared-secret check first, then gets its
/// caller resolved.
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/{id}",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route("/groups/{id}/downloads", post(record_download))
        .route("/groups/{id}/variations", post(add_variation))
        .route("/groups/{id}/primary", put(set_primary))
        .route(
            "/groups/{id}/variations/{vid}",
            patch(edit_variation_link).delete(remove_variation),
        )
        .route("/groups/{id}/variations/{vid}/image", put(replace_variation_image))
        .route("/designers/{id}/stats", get(designer_stats))
        .route("/lookups/{kind}", get(list_lookups).post(create_lookup))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), caller_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .with_state(state)
}
