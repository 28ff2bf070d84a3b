//! The catalog service: shared plumbing for the group, variation and query
//! operations, plus reference data and designer statistics.
//!
//! Operations are split across modules as `impl Catalog` blocks:
//! - `group`: group lifecycle (create, update, delete, counters)
//! - `variation`: variation add/replace/remove and primary handling
//! - `query`: listing and single-group retrieval

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::Database;

use crate::access::{ensure_admin, Caller};
use crate::error::{AppError, Result};
use crate::model::{DesignerStats, ImageUpload, Lookup, LookupKind};
use crate::repository::{lookup_sequence, CatalogRead, CatalogStore, CatalogWriter};
use crate::storage::{ImageStorage, StoredImage};

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TITLE_LEN: usize = 255;

/// Entry point for every catalog operation
#[derive(Clone)]
pub struct Catalog {
    store: CatalogStore,
    images: Arc<dyn ImageStorage>,
    upload_timeout: Duration,
}

impl Catalog {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageStorage>) -> Self {
        Self {
            store: CatalogStore::new(db),
            images,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Hands an image to the storage collaborator, bounded by the upload timeout
    pub(crate) async fn upload(&self, image: &ImageUpload) -> Result<StoredImage> {
        if image.data.is_empty() {
            return Err(AppError::Validation("image is empty".into()));
        }

        let stored = match tokio::time::timeout(self.upload_timeout, self.images.store(image)).await {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Image upload failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.upload_timeout, "Image upload timed out");
                return Err(AppError::StorageFailure(format!(
                    "upload timed out after {:?}",
                    self.upload_timeout
                )));
            }
        };

        if stored.width == 0 || stored.height == 0 {
            self.discard_upload(&stored.url).await;
            return Err(AppError::Validation("image has no pixels".into()));
        }
        Ok(stored)
    }

    /// Drops an upload whose row never got committed
    pub(crate) async fn discard_upload(&self, url: &str) {
        if let Err(e) = self.images.discard(url).await {
            tracing::warn!(url, error = %e, "Could not discard orphaned upload");
        }
    }

    /// Registers a category, format or file type (admin only)
    pub fn create_lookup(&self, caller: &Caller, kind: LookupKind, name: &str) -> Result<Lookup> {
        ensure_admin(caller, "creating reference data")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(format!("{} name is required", kind.label())));
        }

        let writer = self.store.write()?;
        let taken = writer
            .lookups(kind)?
            .iter()
            .any(|existing| existing.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(AppError::Validation(format!(
                "{} '{}' already exists",
                kind.label(),
                name
            )));
        }

        let lookup = Lookup {
            id: writer.next_id(lookup_sequence(kind))?,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        writer.put_lookup(kind, &lookup)?;
        writer.commit()?;

        tracing::info!(kind = kind.label(), id = lookup.id, name = %lookup.name, "Lookup created");
        Ok(lookup)
    }

    pub fn list_lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>> {
        self.store.read()?.lookups(kind)
    }

    /// Stats row of a designer; designers who never published get zeros
    pub fn designer_stats(&self, designer_id: &str) -> Result<DesignerStats> {
        let stats = self.store.read()?.designer_stats(designer_id)?;
        Ok(stats.unwrap_or_else(|| DesignerStats::empty(designer_id, Utc::now())))
    }
}

pub(crate) fn ensure_lookup(repo: &impl CatalogRead, kind: LookupKind, id: u64) -> Result<()> {
    if repo.lookup_exists(kind, id)? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} {}", kind.label(), id)))
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Normalizes an edit link: blank clears it, anything else must be http(s)
pub(crate) fn normalize_edit_url(edit_url: Option<&str>) -> Result<Option<String>> {
    match edit_url.map(str::trim).filter(|url| !url.is_empty()) {
        None => Ok(None),
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
            Ok(Some(url.to_string()))
        }
        Some(url) => Err(AppError::Validation(format!("edit_url '{url}' is not an http(s) URL"))),
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Reduced `W:H` ratio, e.g. 1080x1920 → `9:16`
pub fn aspect_ratio(width: u32, height: u32) -> Result<String> {
    if width == 0 || height == 0 {
        return Err(AppError::Validation("image dimensions must be non-zero".into()));
    }
    let divisor = gcd(width, height);
    Ok(format!("{}:{}", width / divisor, height / divisor))
}

/// Applies a counter change to a designer's stats row, creating it if absent.
///
/// Runs inside the caller's write unit, which redb serializes against every
/// other writer, so concurrent creates and deletes cannot lose updates.
pub(crate) fn adjust_designer_stats(
    writer: &CatalogWriter,
    designer_id: &str,
    now: DateTime<Utc>,
    change: impl FnOnce(&mut DesignerStats),
) -> Result<()> {
    let mut stats = writer
        .designer_stats(designer_id)?
        .unwrap_or_else(|| DesignerStats::empty(designer_id, now));
    change(&mut stats);
    stats.updated_at = now;
    writer.put_designer_stats(&stats)
}

/// Best-effort variant of [`adjust_designer_stats`].
///
/// A failed stats update must not block the group mutation it accompanies;
/// the failure is logged and the counters are left for reconciliation.
pub(crate) fn sync_designer_stats(
    writer: &CatalogWriter,
    designer_id: &str,
    now: DateTime<Utc>,
    change: impl FnOnce(&mut DesignerStats),
) {
    if let Err(e) = adjust_designer_stats(writer, designer_id, now, change) {
        tracing::warn!(designer_id, error = %e, "Designer stats update skipped");
    }
}
