//! Read side: filtered listing and single-group retrieval.

use crate::access::{can_view, Caller};
use crate::catalog::Catalog;
use crate::error::{AppError, Result};
use crate::model::{ArtGroup, ArtVariation, GroupDetail, GroupPage, GroupSummary, ListParams};
use crate::repository::CatalogRead;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Loads a group the caller may see.
///
/// Hidden groups answer `NotFound` to everyone but the owner and admins, so
/// their existence never leaks.
pub(crate) fn visible_group(repo: &impl CatalogRead, caller: &Caller, group_id: u64) -> Result<ArtGroup> {
    repo.find_group(group_id)?
        .filter(|group| can_view(caller, group))
        .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))
}

/// Group-level filters; the format filter needs variations and is applied separately
fn matches_row(group: &ArtGroup, params: &ListParams, search: Option<&str>, include_hidden: bool) -> bool {
    if !group.is_visible && !include_hidden {
        return false;
    }
    if params.category_id.is_some_and(|id| id != group.category_id) {
        return false;
    }
    if params.designer_id.as_deref().is_some_and(|id| id != group.designer_id) {
        return false;
    }
    if params.is_premium.is_some_and(|premium| premium != group.is_premium) {
        return false;
    }
    if params.status.is_some_and(|status| status != group.status) {
        return false;
    }
    match search {
        Some(term) => group.title.to_lowercase().contains(term),
        None => true,
    }
}

fn summarize(group: ArtGroup, variations: &[ArtVariation]) -> GroupSummary {
    GroupSummary {
        thumbnail_url: variations
            .iter()
            .find(|v| v.is_primary)
            .map(|v| v.image_url.clone()),
        variation_count: variations.len(),
        group,
    }
}

impl Catalog {
    /// Lists groups newest first with offset pagination.
    ///
    /// Hidden groups appear only for admins that ask for them with
    /// `include_hidden`; everyone else never sees them here. Rows are streamed
    /// from the newest id down and only the requested window is summarized.
    pub fn list_groups(&self, caller: &Caller, params: &ListParams) -> Result<GroupPage> {
        let page = params.page.unwrap_or(1).max(1);
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        // Huge page numbers saturate and land past the last match
        let offset = (page - 1).saturating_mul(page_size);
        let window = offset..offset.saturating_add(page_size);
        let include_hidden = params.include_hidden && caller.is_admin();
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);

        // Every row matches: stop once the window is filled and take the
        // total from the table length
        let unfiltered = include_hidden
            && search.is_none()
            && params.category_id.is_none()
            && params.designer_id.is_none()
            && params.format_id.is_none()
            && params.is_premium.is_none()
            && params.status.is_none();

        let reader = self.store().read()?;
        let mut matched = 0usize;
        let mut items = Vec::new();
        reader.scan_groups_newest_first(|group| {
            if !matches_row(&group, params, search.as_deref(), include_hidden) {
                return Ok(true);
            }
            let variations = match params.format_id {
                Some(format_id) => {
                    let variations = reader.variations_of(group.id)?;
                    if !variations.iter().any(|v| v.format_id == format_id) {
                        return Ok(true);
                    }
                    Some(variations)
                }
                None => None,
            };

            if window.contains(&matched) {
                let variations = match variations {
                    Some(variations) => variations,
                    None => reader.variations_of(group.id)?,
                };
                items.push(summarize(group, &variations));
            }
            matched += 1;
            Ok(!(unfiltered && matched >= window.end))
        })?;

        let total = if unfiltered { reader.group_count()? } else { matched };
        Ok(GroupPage {
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
            items,
        })
    }

    /// Returns a group with all variations (primary first) and counts the view
    pub fn get_group(&self, caller: &Caller, group_id: u64) -> Result<GroupDetail> {
        let detail = {
            let reader = self.store().read()?;
            let group = visible_group(&reader, caller, group_id)?;
            GroupDetail {
                variations: reader.variations_of(group_id)?,
                group,
            }
        };

        self.increment_view_count(group_id);
        Ok(detail)
    }
}
