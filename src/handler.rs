//! HTTP request handlers for the art catalog API
//!
//! Handlers translate requests into catalog operations. The resolved
//! [`Caller`] arrives as a request extension set by `caller_middleware`;
//! every failure is an [`AppError`] rendered as `{ "code", "message" }`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use crate::access::Caller;
use crate::database::AppState;
use crate::error::{AppError, Result};
use crate::model::{
    AddVariationRequest, CreateGroupRequest, CreateLookupRequest, CreatedResponse, DownloadRequest,
    EditLinkRequest, GroupChanges, ImagePayload, ImageUpload, ListParams, LookupKind, NewGroup,
    NewVariation, SetPrimaryRequest,
};

/// Decodes a base64 image, tolerating a `data:<mime>;base64,` prefix
fn decode_image(payload: ImagePayload) -> Result<ImageUpload> {
    let raw = payload.data_base64.trim();
    let encoded = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    let data = BASE64
        .decode(encoded)
        .map_err(|e| AppError::Validation(format!("image is not valid base64: {e}")))?;
    Ok(ImageUpload { data, file_name: payload.file_name })
}

fn lookup_kind(segment: &str) -> Result<LookupKind> {
    LookupKind::from_path(segment)
        .ok_or_else(|| AppError::NotFound(format!("lookup kind '{segment}'")))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Lists groups with filters and pagination
///
/// # Example Request
///
/// `GET /api/groups?search=poster&format_id=2&page=1&page_size=20`
///
/// # Response
///
/// ```json
/// { "page": 1, "page_size": 20, "total": 42, "total_pages": 3, "items": [...] }
/// ```
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse> {
    let page = state.catalog.list_groups(&caller, &params)?;
    Ok(Json(page))
}

/// Creates a group with its first variation
///
/// This handler:
/// 1. Decodes the base64 image from the request body
/// 2. Hands the image to storage before any row is written
/// 3. Writes the group, its primary variation and the designer's art count in one transaction
/// 4. Returns the new group id
///
/// # Request Body
///
/// ```json
/// {
///   "title": "Summer sale",
///   "category_id": 1,
///   "format_id": 1,
///   "file_type_id": 1,
///   "image": { "file_name": "sale.png", "data_base64": "iVBORw0..." },
///   "designer_id": "dana",   // Optional, admins only
///   "is_premium": false,     // Optional
///   "edit_url": null         // Optional
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{ "id": 12 }`
/// - **404 Not Found** - unknown category, format or file type
/// - **502 Bad Gateway** - image storage failed
///
/// # Database Operations
///
/// Writes to four tables:
/// 1. `TABLE_GROUPS` - the new group row
/// 2. `TABLE_VARIATIONS` - the first variation, flagged primary
/// 3. `TABLE_GROUP_VARIATIONS` - membership index entry
/// 4. `TABLE_DESIGNER_STATS` - `art_count` incremented
pub async fn create_group(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse> {
    // Decode first so a malformed image never reaches storage
    let input = NewGroup {
        title: payload.title,
        category_id: payload.category_id,
        designer_id: payload.designer_id,
        is_premium: payload.is_premium,
        first_variation: NewVariation {
            format_id: payload.format_id,
            file_type_id: payload.file_type_id,
            image: decode_image(payload.image)?,
            edit_url: payload.edit_url,
        },
    };
    let id = state.catalog.create_group(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Returns a group with all of its variations, primary first
///
/// Hidden groups are only visible to their designer and admins; everyone else
/// gets **404 Not Found**. Each successful read counts as a view.
pub async fn get_group(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.get_group(&caller, id)?))
}

/// Updates group metadata
///
/// # Request Body
///
/// Any subset of the fields below; an empty body is rejected with `NO_OP`.
///
/// ```json
/// { "title": "Winter sale", "category_id": 2, "is_premium": true, "is_visible": false, "status": "inactive" }
/// ```
///
/// # Response
///
/// - **200 OK** - the updated group
/// - **400 Bad Request** - nothing to change or invalid title
/// - **403 Forbidden** - caller is neither the designer nor an admin
pub async fn update_group(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(changes): Json<GroupChanges>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.update_group(&caller, id, changes)?))
}

/// Deletes a group and every variation in it (admins only)
///
/// # Database Operations
///
/// In one transaction: removes the group row, its variation rows and index
/// entries, and decrements the designer's `art_count` (never below zero).
pub async fn delete_group(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    state.catalog.delete_group(&caller, id)?;
    Ok(Json(json!({
        "message": "Group deleted successfully",
        "deleted_id": id
    })))
}

/// Resolves a download and counts it
///
/// `POST /api/groups/{id}/downloads?variation_id=3`
///
/// Without `variation_id` the primary variation is returned. Premium groups
/// require a signed-in caller (**403 Forbidden** otherwise).
pub async fn record_download(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<DownloadRequest>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.record_download(&caller, id, params.variation_id)?))
}

/// Adds a variation in a format the group does not have yet
///
/// This handler:
/// 1. Decodes and stores the image
/// 2. Inserts the variation; with `make_primary` it takes the primary flag
///    from the current primary in the same transaction
/// 3. Returns the new variation id
///
/// # Request Body
///
/// ```json
/// {
///   "format_id": 2,
///   "file_type_id": 1,
///   "image": { "data_base64": "iVBORw0..." },
///   "make_primary": true   // Optional
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{ "id": 7 }`
/// - **400 Bad Request** - the group already has this format
/// - **502 Bad Gateway** - image storage failed
pub async fn add_variation(
    Path(group_id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<AddVariationRequest>,
) -> Result<impl IntoResponse> {
    let input = NewVariation {
        format_id: payload.format_id,
        file_type_id: payload.file_type_id,
        image: decode_image(payload.image)?,
        edit_url: payload.edit_url,
    };
    let id = state
        .catalog
        .add_variation(&caller, group_id, input, payload.make_primary)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Moves the primary flag to another variation of the same group
///
/// # Request Body
///
/// ```json
/// { "variation_id": 7 }
/// ```
///
/// Clearing the old flag and setting the new one commit together, so readers
/// never see a group with zero or two primaries.
pub async fn set_primary(
    Path(group_id): Path<u64>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<SetPrimaryRequest>,
) -> Result<impl IntoResponse> {
    state.catalog.set_primary(&caller, group_id, payload.variation_id)?;
    Ok(Json(json!({
        "message": "Primary variation updated",
        "group_id": group_id,
        "variation_id": payload.variation_id
    })))
}

/// Sets or clears a variation's external edit link
///
/// `{ "edit_url": null }` clears it. Only the link changes; the image and
/// the primary flag are untouched.
pub async fn edit_variation_link(
    Path((group_id, variation_id)): Path<(u64, u64)>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<EditLinkRequest>,
) -> Result<impl IntoResponse> {
    let variation = state.catalog.edit_variation_link(
        &caller,
        group_id,
        variation_id,
        payload.edit_url.as_deref(),
    )?;
    Ok(Json(variation))
}

/// Swaps a variation's image for a new upload
///
/// Width, height and aspect ratio are refreshed from the new image. The old
/// file is discarded once the new one is committed.
pub async fn replace_variation_image(
    Path((group_id, variation_id)): Path<(u64, u64)>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ImagePayload>,
) -> Result<impl IntoResponse> {
    let image = decode_image(payload)?;
    let variation = state
        .catalog
        .replace_variation_image(&caller, group_id, variation_id, image)
        .await?;
    Ok(Json(variation))
}

/// Deletes a variation
///
/// - **200 OK** - variation deleted (primary reassigned if needed)
/// - **409 Conflict** - `LAST_VARIATION`, delete the group instead
pub async fn remove_variation(
    Path((group_id, variation_id)): Path<(u64, u64)>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    state.catalog.remove_variation(&caller, group_id, variation_id)?;
    Ok(Json(json!({
        "message": "Variation deleted successfully",
        "deleted_id": variation_id
    })))
}

/// Returns a designer's counters; unknown designers get zeroed stats
pub async fn designer_stats(
    Path(designer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.designer_stats(&designer_id)?))
}

/// Lists categories, formats or file types
///
/// `GET /api/lookups/{kind}` where `kind` is `categories`, `formats` or `file-types`
pub async fn list_lookups(
    Path(kind): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.list_lookups(lookup_kind(&kind)?)?))
}

/// Adds a reference entry (admins only)
///
/// # Request Body
///
/// ```json
/// { "name": "square" }
/// ```
///
/// # Response
///
/// - **201 Created** - the new entry
/// - **400 Bad Request** - name is blank or already taken (case-insensitive)
pub async fn create_lookup(
    Path(kind): Path<String>,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateLookupRequest>,
) -> Result<impl IntoResponse> {
    let lookup = state
        .catalog
        .create_lookup(&caller, lookup_kind(&kind)?, &payload.name)?;
    Ok((StatusCode::CREATED, Json(lookup)))
}
