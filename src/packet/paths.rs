//! Path resolution for packets.
//!
//! File paths travel with a marker token splitting the repository root from
//! the repository-relative part: `/repo/root/./2023/01/01/img.tif`. The
//! relative part is the layout inside the archive and the key used to match
//! source files with their re-imported copies.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::TransferError;
use crate::graph::ImageId;
use crate::service::RepositoryQuery;

/// Separates the original absolute prefix from the repository-relative path.
pub const PATH_MARKER: &str = "/./";

/// File path to the ascending ids of the images backed by that file.
pub type PathIdMap = BTreeMap<String, Vec<ImageId>>;

/// Picks the first managed repository of the instance as the packing root.
pub fn resolve_repo_root<S: RepositoryQuery + ?Sized>(session: &S) -> Result<PathBuf, TransferError> {
    session
        .managed_repository_roots()?
        .into_iter()
        .next()
        .ok_or(TransferError::NoManagedRepository)
}

/// Canonical key used to correlate a file across instances.
///
/// This is the suffix after the last [`PATH_MARKER`]. A path without a marker
/// falls back to its final component, so `/repo/2020/01/img.tif` and
/// `/staging/./img.tif` both yield `img.tif`.
pub fn join_key(path: &str) -> &str {
    match path.rfind(PATH_MARKER) {
        Some(idx) => &path[idx + PATH_MARKER.len()..],
        None => path.rsplit('/').next().unwrap_or(path),
    }
}

/// `<repo_root>/./<relative>` with forward slashes in the relative part.
pub fn marked_path(repo_root: &Path, relative: &Path) -> String {
    let root = repo_root.to_string_lossy();
    format!(
        "{}{}{}",
        root.trim_end_matches('/'),
        PATH_MARKER,
        slash_path(relative)
    )
}

/// Where a packet file is imported from: `<base_dir>/./<relative>`.
pub fn import_location(base_dir: &Path, relative: &str) -> PathBuf {
    let base = base_dir.to_string_lossy();
    PathBuf::from(format!(
        "{}{}{}",
        base.trim_end_matches('/'),
        PATH_MARKER,
        relative
    ))
}

/// Directory of `path` relative to `repo_root` (empty for files at the root).
pub fn relative_parent(path: &Path, repo_root: &Path) -> Result<PathBuf, TransferError> {
    let relative = path
        .strip_prefix(repo_root)
        .map_err(|_| TransferError::PathOutsideRepository {
            path: path.to_path_buf(),
            repo_root: repo_root.to_path_buf(),
        })?;
    Ok(relative
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default())
}

/// True if `relative` can be joined under a directory without escaping it.
pub fn is_contained_relative(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
