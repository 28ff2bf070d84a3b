//! Variation management: every write that touches variation rows.
//!
//! Each group has exactly one primary variation at all observable times. Any
//! operation that may move the primary flag performs the demotion and the
//! promotion inside the same write unit, so readers (which see committed
//! snapshots only) can never observe zero or two primaries.

use chrono::{DateTime, Utc};

use crate::access::{ensure_can_modify, Caller};
use crate::catalog::{aspect_ratio, ensure_lookup, normalize_edit_url, Catalog};
use crate::error::{AppError, Result};
use crate::model::{ArtGroup, ArtVariation, ImageUpload, LookupKind, NewVariation};
use crate::repository::{CatalogRead, CatalogWriter, SEQ_VARIATIONS};
use crate::storage::StoredImage;

/// A variation whose image is already stored but whose row is not yet written
pub(crate) struct PendingVariation {
    pub format_id: u64,
    pub file_type_id: u64,
    pub edit_url: Option<String>,
    pub stored: StoredImage,
}

/// Loads a group the caller may modify
pub(crate) fn modifiable_group(
    repo: &impl CatalogRead,
    caller: &Caller,
    group_id: u64,
) -> Result<ArtGroup> {
    let group = repo
        .find_group(group_id)?
        .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))?;
    ensure_can_modify(caller, &group)?;
    Ok(group)
}

pub(crate) fn check_variation_refs(
    repo: &impl CatalogRead,
    format_id: u64,
    file_type_id: u64,
) -> Result<()> {
    ensure_lookup(repo, LookupKind::Format, format_id)?;
    ensure_lookup(repo, LookupKind::FileType, file_type_id)
}

/// A group holds at most one variation per format
pub(crate) fn ensure_format_free(existing: &[ArtVariation], format_id: u64) -> Result<()> {
    match existing.iter().find(|v| v.format_id == format_id) {
        Some(taken) => Err(AppError::Validation(format!(
            "group {} already has variation {} in format {}",
            taken.group_id, taken.id, format_id
        ))),
        None => Ok(()),
    }
}

fn member(variations: &[ArtVariation], group_id: u64, variation_id: u64) -> Result<&ArtVariation> {
    variations
        .iter()
        .find(|v| v.id == variation_id)
        .ok_or_else(|| AppError::NotFound(format!("variation {variation_id} of group {group_id}")))
}

/// Builds the row for a freshly stored variation, issuing its id
pub(crate) fn new_variation_row(
    writer: &CatalogWriter,
    group_id: u64,
    pending: &PendingVariation,
    is_primary: bool,
    now: DateTime<Utc>,
) -> Result<ArtVariation> {
    Ok(ArtVariation {
        id: writer.next_id(SEQ_VARIATIONS)?,
        group_id,
        format_id: pending.format_id,
        file_type_id: pending.file_type_id,
        image_url: pending.stored.url.clone(),
        edit_url: pending.edit_url.clone(),
        width: pending.stored.width,
        height: pending.stored.height,
        aspect_ratio: aspect_ratio(pending.stored.width, pending.stored.height)?,
        is_primary,
        created_at: now,
        updated_at: now,
    })
}

/// Rewrites primary flags so that only `primary_id` carries it
fn assign_primary(
    writer: &CatalogWriter,
    variations: &[ArtVariation],
    primary_id: u64,
    now: DateTime<Utc>,
) -> Result<()> {
    for variation in variations {
        let should_be_primary = variation.id == primary_id;
        if variation.is_primary != should_be_primary {
            let mut changed = variation.clone();
            changed.is_primary = should_be_primary;
            changed.updated_at = now;
            writer.put_variation(&changed)?;
        }
    }
    Ok(())
}

fn touch_group(writer: &CatalogWriter, mut group: ArtGroup, now: DateTime<Utc>) -> Result<()> {
    group.updated_at = now;
    writer.put_group(&group)
}

impl Catalog {
    /// Uploads an image and adds it to an existing group as a new variation.
    ///
    /// With `make_primary` the new variation takes over the primary flag in
    /// the same unit that inserts it.
    pub async fn add_variation(
        &self,
        caller: &Caller,
        group_id: u64,
        input: NewVariation,
        make_primary: bool,
    ) -> Result<u64> {
        let edit_url = normalize_edit_url(input.edit_url.as_deref())?;
        {
            let reader = self.store().read()?;
            let group = modifiable_group(&reader, caller, group_id)?;
            check_variation_refs(&reader, input.format_id, input.file_type_id)?;
            ensure_format_free(&reader.variations_of(group.id)?, input.format_id)?;
        }

        let stored = self.upload(&input.image).await?;
        let pending = PendingVariation {
            format_id: input.format_id,
            file_type_id: input.file_type_id,
            edit_url,
            stored,
        };

        let result = self.insert_variation_unit(caller, group_id, &pending, make_primary);
        if result.is_err() {
            self.discard_upload(&pending.stored.url).await;
        }
        result
    }

    fn insert_variation_unit(
        &self,
        caller: &Caller,
        group_id: u64,
        pending: &PendingVariation,
        make_primary: bool,
    ) -> Result<u64> {
        let writer = self.store().write()?;
        let group = modifiable_group(&writer, caller, group_id)?;
        check_variation_refs(&writer, pending.format_id, pending.file_type_id)?;
        let existing = writer.variations_of(group_id)?;
        ensure_format_free(&existing, pending.format_id)?;

        let now = Utc::now();
        let is_primary = make_primary || !existing.iter().any(|v| v.is_primary);
        let variation = new_variation_row(&writer, group_id, pending, is_primary, now)?;
        if is_primary {
            assign_primary(&writer, &existing, variation.id, now)?;
        }
        writer.insert_variation(&variation)?;
        touch_group(&writer, group, now)?;
        writer.commit()?;

        tracing::info!(
            group_id,
            variation_id = variation.id,
            format_id = variation.format_id,
            is_primary,
            "Variation added"
        );
        Ok(variation.id)
    }

    /// Moves the primary flag to `variation_id` in one unit
    pub fn set_primary(&self, caller: &Caller, group_id: u64, variation_id: u64) -> Result<()> {
        let writer = self.store().write()?;
        let group = modifiable_group(&writer, caller, group_id)?;
        let variations = writer.variations_of(group_id)?;
        member(&variations, group_id, variation_id)?;

        let primaries: Vec<u64> = variations.iter().filter(|v| v.is_primary).map(|v| v.id).collect();
        if primaries == [variation_id] {
            return Ok(());
        }

        let now = Utc::now();
        assign_primary(&writer, &variations, variation_id, now)?;
        touch_group(&writer, group, now)?;
        writer.commit()?;

        tracing::info!(group_id, variation_id, previous = ?primaries, "Primary variation changed");
        Ok(())
    }

    /// Deletes one variation.
    ///
    /// Removing the primary promotes the most recently created remaining
    /// variation within the same unit. The last variation of a group cannot be
    /// removed on its own; delete the group instead.
    pub fn remove_variation(&self, caller: &Caller, group_id: u64, variation_id: u64) -> Result<()> {
        let writer = self.store().write()?;
        let group = modifiable_group(&writer, caller, group_id)?;
        let variations = writer.variations_of(group_id)?;
        let target = member(&variations, group_id, variation_id)?.clone();

        if variations.len() <= 1 {
            return Err(AppError::LastVariation(group_id));
        }

        let now = Utc::now();
        let mut promoted = None;
        if target.is_primary {
            let successor = variations
                .iter()
                .filter(|v| v.id != target.id)
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            if let Some(successor) = successor {
                assign_primary(&writer, &variations, successor.id, now)?;
                promoted = Some(successor.id);
            }
        }
        writer.remove_variation(group_id, target.id)?;
        touch_group(&writer, group, now)?;
        writer.commit()?;

        tracing::info!(group_id, variation_id, promoted = ?promoted, "Variation removed");
        Ok(())
    }

    /// Sets or clears the external edit link of a variation
    pub fn edit_variation_link(
        &self,
        caller: &Caller,
        group_id: u64,
        variation_id: u64,
        edit_url: Option<&str>,
    ) -> Result<ArtVariation> {
        let edit_url = normalize_edit_url(edit_url)?;

        let writer = self.store().write()?;
        modifiable_group(&writer, caller, group_id)?;
        let variations = writer.variations_of(group_id)?;
        let mut variation = member(&variations, group_id, variation_id)?.clone();

        variation.edit_url = edit_url;
        variation.updated_at = Utc::now();
        writer.put_variation(&variation)?;
        writer.commit()?;

        tracing::debug!(group_id, variation_id, "Edit link updated");
        Ok(variation)
    }

    /// Swaps the image of a variation, refreshing its dimensions.
    ///
    /// The primary flag is untouched. If the store unit fails the new upload
    /// is discarded; once committed the previous image is discarded.
    pub async fn replace_variation_image(
        &self,
        caller: &Caller,
        group_id: u64,
        variation_id: u64,
        image: ImageUpload,
    ) -> Result<ArtVariation> {
        {
            let reader = self.store().read()?;
            modifiable_group(&reader, caller, group_id)?;
            member(&reader.variations_of(group_id)?, group_id, variation_id)?;
        }

        let stored = self.upload(&image).await?;
        match self.replace_image_unit(caller, group_id, variation_id, &stored) {
            Ok((variation, previous_url)) => {
                if previous_url != variation.image_url {
                    self.discard_upload(&previous_url).await;
                }
                Ok(variation)
            }
            Err(e) => {
                self.discard_upload(&stored.url).await;
                Err(e)
            }
        }
    }

    fn replace_image_unit(
        &self,
        caller: &Caller,
        group_id: u64,
        variation_id: u64,
        stored: &StoredImage,
    ) -> Result<(ArtVariation, String)> {
        let writer = self.store().write()?;
        modifiable_group(&writer, caller, group_id)?;
        let variations = writer.variations_of(group_id)?;
        let mut variation = member(&variations, group_id, variation_id)?.clone();

        let previous_url = std::mem::replace(&mut variation.image_url, stored.url.clone());
        variation.width = stored.width;
        variation.height = stored.height;
        variation.aspect_ratio = aspect_ratio(stored.width, stored.height)?;
        variation.updated_at = Utc::now();
        writer.put_variation(&variation)?;
        writer.commit()?;

        tracing::info!(group_id, variation_id, "Variation image replaced");
        Ok((variation, previous_url))
    }
}
