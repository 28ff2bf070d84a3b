//! Data models for the art catalog
//!
//! This module defines the persisted records (groups, variations, designer
//! statistics, reference lookups) and the request/response shapes used by the
//! HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted group
///
/// Drafts only exist client-side, so the stored states are these two.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    #[default]
    Active,
    Inactive,
}

/// A logical creative work, container for its format variations
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtGroup {
    pub id: u64,
    pub title: String,
    pub category_id: u64,

    /// Owning designer (caller id of the publisher)
    pub designer_id: String,

    pub is_premium: bool,

    /// Orthogonal to `status`; hidden groups are only visible to owner and admins
    pub is_visible: bool,

    #[serde(default)]
    pub status: GroupStatus,

    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One format-specific rendition of a group
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtVariation {
    pub id: u64,
    pub group_id: u64,
    pub format_id: u64,
    pub file_type_id: u64,
    pub image_url: String,

    /// External edit link (e.g. a design-tool template)
    pub edit_url: Option<String>,

    pub width: u32,
    pub height: u32,

    /// Reduced `W:H` ratio derived from width and height
    pub aspect_ratio: String,

    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counters per designer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DesignerStats {
    pub designer_id: String,
    pub art_count: u64,
    pub download_count: u64,
    pub view_count: u64,
    pub followers_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DesignerStats {
    pub fn empty(designer_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            designer_id: designer_id.to_string(),
            art_count: 0,
            download_count: 0,
            view_count: 0,
            followers_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kinds of shared reference data
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Category,
    Format,
    FileType,
}

impl LookupKind {
    pub fn label(self) -> &'static str {
        match self {
            LookupKind::Category => "category",
            LookupKind::Format => "format",
            LookupKind::FileType => "file type",
        }
    }

    /// Parses the plural path segment used by the HTTP API
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "categories" => Some(LookupKind::Category),
            "formats" => Some(LookupKind::Format),
            "file-types" => Some(LookupKind::FileType),
            _ => None,
        }
    }
}

/// A category, format or file type row
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lookup {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Raw image bytes handed to the storage collaborator
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

/// Image payload as carried in JSON requests
///
/// # Example
/// ```json
/// { "file_name": "feed.png", "data_base64": "iVBORw0KGgo..." }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImagePayload {
    pub file_name: Option<String>,
    pub data_base64: String,
}

/// Inputs describing one variation to upload
#[derive(Debug, Clone)]
pub struct NewVariation {
    pub format_id: u64,
    pub file_type_id: u64,
    pub image: ImageUpload,
    pub edit_url: Option<String>,
}

/// Inputs for group creation
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub category_id: u64,
    /// Defaults to the caller; only admins may publish on behalf of someone else
    pub designer_id: Option<String>,
    pub is_premium: bool,
    pub first_variation: NewVariation,
}

/// Partial group update; `None` leaves the field untouched
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GroupChanges {
    pub title: Option<String>,
    pub category_id: Option<u64>,
    pub is_premium: Option<bool>,
    pub is_visible: Option<bool>,
    pub status: Option<GroupStatus>,
}

impl GroupChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category_id.is_none()
            && self.is_premium.is_none()
            && self.is_visible.is_none()
            && self.status.is_none()
    }
}

/// Request body for `POST /api/groups`
#[derive(Deserialize, Debug)]
pub struct CreateGroupRequest {
    pub title: String,
    pub category_id: u64,
    pub designer_id: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    pub format_id: u64,
    pub file_type_id: u64,
    pub image: ImagePayload,
    pub edit_url: Option<String>,
}

/// Request body for `POST /api/groups/{id}/variations`
#[derive(Deserialize, Debug)]
pub struct AddVariationRequest {
    pub format_id: u64,
    pub file_type_id: u64,
    pub image: ImagePayload,
    pub edit_url: Option<String>,
    #[serde(default)]
    pub make_primary: bool,
}

/// Request body for `PUT /api/groups/{id}/primary`
#[derive(Deserialize, Debug)]
pub struct SetPrimaryRequest {
    pub variation_id: u64,
}

/// Request body for `PATCH /api/groups/{id}/variations/{vid}`
///
/// A `null` or empty `edit_url` clears the link.
#[derive(Deserialize, Debug)]
pub struct EditLinkRequest {
    pub edit_url: Option<String>,
}

/// Request body for `POST /api/groups/{id}/downloads`
#[derive(Deserialize, Debug, Default)]
pub struct DownloadRequest {
    pub variation_id: Option<u64>,
}

/// Request body for `POST /api/lookups/{kind}`
#[derive(Deserialize, Debug)]
pub struct CreateLookupRequest {
    pub name: String,
}

/// Response carrying a freshly issued identifier
#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedResponse {
    pub id: u64,
}

/// Filters for the group listing
///
/// # Example
/// Query string: `?search=poster&format_id=2&page=2&page_size=20`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListParams {
    pub search: Option<String>,
    pub category_id: Option<u64>,
    pub designer_id: Option<String>,
    pub format_id: Option<u64>,
    pub is_premium: Option<bool>,
    pub status: Option<GroupStatus>,

    /// Honored for admins only
    #[serde(default)]
    pub include_hidden: bool,

    /// Page number, starts from 1 (default: 1)
    pub page: Option<usize>,

    /// Items per page (default: 10, maximum: 100)
    pub page_size: Option<usize>,
}

/// A listed group annotated with its primary thumbnail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: ArtGroup,
    pub thumbnail_url: Option<String>,
    pub variation_count: usize,
}

/// One page of the listing plus the total match count
#[derive(Serialize, Deserialize, Debug)]
pub struct GroupPage {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub items: Vec<GroupSummary>,
}

/// A group with all of its variations, primary first
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: ArtGroup,
    pub variations: Vec<ArtVariation>,
}

/// What a download resolves to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadTarget {
    pub group_id: u64,
    pub variation_id: u64,
    pub image_url: String,
    pub edit_url: Option<String>,
}
