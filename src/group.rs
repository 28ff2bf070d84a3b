//! Group lifecycle: creation with a first variation, metadata updates,
//! deletion, and the best-effort counters.

use chrono::Utc;

use crate::access::{can_view, ensure_admin, ensure_authenticated, ensure_can_modify, Caller};
use crate::catalog::{ensure_lookup, normalize_edit_url, sync_designer_stats, validate_title, Catalog};
use crate::error::{AppError, Result};
use crate::model::{
    ArtGroup, DesignerStats, DownloadTarget, GroupChanges, GroupStatus, LookupKind, NewGroup,
};
use crate::query::visible_group;
use crate::repository::{CatalogRead, SEQ_GROUPS};
use crate::variation::{check_variation_refs, new_variation_row, PendingVariation};

/// Validated group fields waiting for the first variation's upload
struct PendingGroup {
    title: String,
    category_id: u64,
    designer_id: String,
    is_premium: bool,
}

/// Works out whose work is being published
fn publisher(caller: &Caller, requested: Option<&str>) -> Result<String> {
    let caller_id = ensure_authenticated(caller)?;
    match requested.map(str::trim).filter(|id| !id.is_empty()) {
        None => Ok(caller_id.to_string()),
        Some(id) if id == caller_id => Ok(id.to_string()),
        Some(id) if caller.is_admin() => Ok(id.to_string()),
        Some(_) => Err(AppError::PermissionDenied(
            "only admins may publish on behalf of another designer".into(),
        )),
    }
}

impl Catalog {
    /// Creates a group together with its first (primary) variation.
    ///
    /// Everything is validated before the image is uploaded; the group row,
    /// the variation row and the designer's art count are then written in a
    /// single unit, so a failed upload or write leaves no trace.
    pub async fn create_group(&self, caller: &Caller, input: NewGroup) -> Result<u64> {
        let pending_group = PendingGroup {
            designer_id: publisher(caller, input.designer_id.as_deref())?,
            title: validate_title(&input.title)?,
            category_id: input.category_id,
            is_premium: input.is_premium,
        };
        let first = input.first_variation;
        let edit_url = normalize_edit_url(first.edit_url.as_deref())?;
        {
            let reader = self.store().read()?;
            ensure_lookup(&reader, LookupKind::Category, pending_group.category_id)?;
            check_variation_refs(&reader, first.format_id, first.file_type_id)?;
        }

        let stored = self.upload(&first.image).await?;
        let pending_variation = PendingVariation {
            format_id: first.format_id,
            file_type_id: first.file_type_id,
            edit_url,
            stored,
        };

        let result = self.insert_group_unit(&pending_group, &pending_variation);
        if result.is_err() {
            self.discard_upload(&pending_variation.stored.url).await;
        }
        result
    }

    fn insert_group_unit(&self, pending: &PendingGroup, first: &PendingVariation) -> Result<u64> {
        let writer = self.store().write()?;
        ensure_lookup(&writer, LookupKind::Category, pending.category_id)?;
        check_variation_refs(&writer, first.format_id, first.file_type_id)?;

        let now = Utc::now();
        let group = ArtGroup {
            id: writer.next_id(SEQ_GROUPS)?,
            title: pending.title.clone(),
            category_id: pending.category_id,
            designer_id: pending.designer_id.clone(),
            is_premium: pending.is_premium,
            is_visible: true,
            status: GroupStatus::Active,
            download_count: 0,
            view_count: 0,
            like_count: 0,
            created_at: now,
            updated_at: now,
        };
        let variation = new_variation_row(&writer, group.id, first, true, now)?;

        writer.put_group(&group)?;
        writer.insert_variation(&variation)?;
        sync_designer_stats(&writer, &group.designer_id, now, |stats| stats.art_count += 1);
        writer.commit()?;

        tracing::info!(
            group_id = group.id,
            variation_id = variation.id,
            designer_id = %group.designer_id,
            "Group created"
        );
        Ok(group.id)
    }

    /// Partially updates a group.
    ///
    /// Title, category and premium flag need owner or admin rights; visibility
    /// and status are admin only.
    pub fn update_group(&self, caller: &Caller, group_id: u64, changes: GroupChanges) -> Result<ArtGroup> {
        if changes.is_empty() {
            return Err(AppError::NoOp);
        }
        let title = changes.title.as_deref().map(validate_title).transpose()?;

        let writer = self.store().write()?;
        let mut group = writer
            .find_group(group_id)?
            .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))?;
        ensure_can_modify(caller, &group)?;
        if changes.is_visible.is_some() {
            ensure_admin(caller, "changing visibility")?;
        }
        if changes.status.is_some() {
            ensure_admin(caller, "changing status")?;
        }
        if let Some(category_id) = changes.category_id {
            ensure_lookup(&writer, LookupKind::Category, category_id)?;
            group.category_id = category_id;
        }

        if let Some(title) = title {
            group.title = title;
        }
        if let Some(is_premium) = changes.is_premium {
            group.is_premium = is_premium;
        }
        if let Some(is_visible) = changes.is_visible {
            group.is_visible = is_visible;
        }
        if let Some(status) = changes.status {
            group.status = status;
        }
        group.updated_at = Utc::now();
        writer.put_group(&group)?;
        writer.commit()?;

        tracing::info!(group_id, ?changes, "Group updated");
        Ok(group)
    }

    /// Hard-deletes a group and all of its variations (admin only)
    pub fn delete_group(&self, caller: &Caller, group_id: u64) -> Result<()> {
        let writer = self.store().write()?;
        let group = writer
            .find_group(group_id)?
            .filter(|group| can_view(caller, group))
            .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))?;
        ensure_admin(caller, "deleting a group")?;

        let removed = writer.remove_group_variations(group_id)?;
        writer.remove_group(group_id)?;
        sync_designer_stats(&writer, &group.designer_id, Utc::now(), |stats| {
            stats.art_count = stats.art_count.saturating_sub(1);
        });
        writer.commit()?;

        tracing::info!(group_id, variations = removed, designer_id = %group.designer_id, "Group deleted");
        Ok(())
    }

    /// Counts a view; failures are logged, never surfaced
    pub fn increment_view_count(&self, group_id: u64) {
        let result = self.bump_counters(
            group_id,
            |group| group.view_count += 1,
            |stats| stats.view_count += 1,
        );
        if let Err(e) = result {
            tracing::warn!(group_id, error = %e, "View count not recorded");
        }
    }

    /// Resolves what to hand out for a download and counts it.
    ///
    /// Defaults to the primary variation. Premium groups require a signed-in
    /// caller. The counter update is best-effort.
    pub fn record_download(
        &self,
        caller: &Caller,
        group_id: u64,
        variation_id: Option<u64>,
    ) -> Result<DownloadTarget> {
        let target = {
            let reader = self.store().read()?;
            let group = visible_group(&reader, caller, group_id)?;
            if group.is_premium {
                ensure_authenticated(caller)?;
            }
            let variations = reader.variations_of(group_id)?;
            let chosen = match variation_id {
                Some(id) => variations.iter().find(|v| v.id == id),
                None => variations.iter().find(|v| v.is_primary),
            }
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "variation {} of group {group_id}",
                    variation_id.map_or_else(|| "primary".to_string(), |id| id.to_string())
                ))
            })?;
            DownloadTarget {
                group_id,
                variation_id: chosen.id,
                image_url: chosen.image_url.clone(),
                edit_url: chosen.edit_url.clone(),
            }
        };

        let result = self.bump_counters(
            group_id,
            |group| group.download_count += 1,
            |stats| stats.download_count += 1,
        );
        if let Err(e) = result {
            tracing::warn!(group_id, error = %e, "Download count not recorded");
        }
        Ok(target)
    }

    /// Counter updates commit without fsync; the next regular commit flushes them
    fn bump_counters(
        &self,
        group_id: u64,
        group_change: impl FnOnce(&mut ArtGroup),
        stats_change: impl FnOnce(&mut DesignerStats),
    ) -> Result<()> {
        let writer = self.store().write_relaxed()?;
        let Some(mut group) = writer.find_group(group_id)? else {
            return Ok(());
        };
        group_change(&mut group);
        writer.put_group(&group)?;
        sync_designer_stats(&writer, &group.designer_id, Utc::now(), stats_change);
        writer.commit()
    }
}
