//! Per-user drive visibility rules.
//!
//! Two lists, two scopes:
//! - the deny list hides its drives everywhere: top level, folder
//!   contents, node metadata, search scope;
//! - the allow list restricts only the top level. Once a user is inside a
//!   visible drive, allow-list membership is not re-checked per node.

use drivegate_common::Result;
use drivegate_drive::{Drive, DriveCollection, DriveFile};

use crate::users::User;

/// Whether a drive id is visible to this user.
///
/// `top_level` enables allow-list enforcement; the deny list applies
/// regardless.
pub fn drive_visible(user: &User, drive_id: &str, top_level: bool) -> bool {
    if let Some(deny) = &user.deny_list {
        if deny.iter().any(|d| d == drive_id) {
            return false;
        }
    }
    if top_level {
        if let Some(allow) = &user.allow_list {
            return allow.iter().any(|d| d == drive_id);
        }
    }
    true
}

/// Filter a drive listing down to what this user may see.
pub fn filter_drives(
    user: &User,
    drives: Vec<DriveCollection>,
    top_level: bool,
) -> Vec<DriveCollection> {
    drives
        .into_iter()
        .filter(|drive| drive_visible(user, &drive.id, top_level))
        .collect()
}

/// Whether every known parent of a node is visible.
///
/// Nodes without parent metadata pass; only a positive deny-list hit
/// hides a node.
pub fn parents_visible(user: &User, file: &DriveFile) -> bool {
    match &file.parents {
        Some(parents) => parents.iter().all(|p| drive_visible(user, p, false)),
        None => true,
    }
}

/// Drive ids a search should fan out over for this user.
///
/// - deny list present and non-empty: enumerate the top-level drives and
///   keep only the visible ones (denied drives removed, and intersected
///   with the allow list when one is present), so a denied drive never
///   enters the upstream query;
/// - otherwise an allow list, if present, is the scope verbatim;
/// - otherwise empty, which the client treats as the global corpus.
pub async fn search_scope(user: &User, drive: &Drive) -> Result<Vec<String>> {
    if user.deny_list.as_ref().is_some_and(|d| !d.is_empty()) {
        let listing = drive.ls(None, None, None).await?;
        let drives = listing.drives.unwrap_or_default();
        return Ok(filter_drives(user, drives, true)
            .into_iter()
            .map(|d| d.id)
            .collect());
    }
    Ok(user.allow_list.clone().unwrap_or_default())
}
