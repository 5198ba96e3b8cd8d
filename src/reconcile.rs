//! Cross-instance identity reconciliation.
//!
//! Numeric ids never survive a transfer: the destination assigns fresh ones
//! on import. The only correlation signal left is the file each image came
//! from. Both sides are therefore keyed by the path join key (the part after
//! the last `/./` marker) and, per file, the ascending source ids are paired
//! positionally with the ascending destination ids.
//!
//! Pairing by position is only sound if both instances enumerate the images
//! of a file in the same order. A file whose image counts differ is rejected
//! outright rather than paired up to the shorter list.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::TransferError;
use crate::graph::{GraphRef, ImageId, IMAGE_KIND};
use crate::packet::paths::join_key;
use crate::packet::PathIdMap;

/// `"Image:<sourceId>"` to destination image id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityMap {
    entries: BTreeMap<String, ImageId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: ImageId, dest: ImageId) {
        self.entries
            .insert(format!("{}:{}", IMAGE_KIND, source), dest);
    }

    /// Destination id for a graph reference such as `Image:501`.
    pub fn get(&self, reference: &GraphRef) -> Option<ImageId> {
        self.entries.get(&reference.to_string()).copied()
    }

    pub fn contains(&self, reference: &GraphRef) -> bool {
        self.get(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ImageId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// A source file that had no destination counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmappedFile {
    pub key: String,
    pub source_ids: Vec<ImageId>,
}

/// The outcome of reconciling one unpack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub identity: IdentityMap,
    pub unmapped: Vec<UnmappedFile>,
}

impl Reconciliation {
    /// Number of source image ids left without a destination id.
    pub fn unmapped_count(&self) -> usize {
        self.unmapped.iter().map(|u| u.source_ids.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty()
    }
}

/// Re-keys a path map by join key, merging lists whose keys collide.
pub fn normalize(map: &PathIdMap) -> BTreeMap<String, Vec<ImageId>> {
    let mut normalized: BTreeMap<String, Vec<ImageId>> = BTreeMap::new();
    for (path, ids) in map {
        normalized
            .entry(join_key(path).to_string())
            .or_default()
            .extend(ids.iter().copied());
    }
    for ids in normalized.values_mut() {
        ids.sort_unstable();
    }
    normalized
}

/// Builds the source-to-destination identity map.
///
/// Keys missing on the destination side are reported in
/// [`Reconciliation::unmapped`]. A key whose lists differ in length fails
/// with [`TransferError::ReconcileLengthMismatch`].
pub fn reconcile(
    source_paths: &PathIdMap,
    dest_paths: &PathIdMap,
) -> Result<Reconciliation, TransferError> {
    let source = normalize(source_paths);
    let dest = normalize(dest_paths);
    debug!("normalized source map: {:?}", source);
    debug!("normalized destination map: {:?}", dest);

    let mut result = Reconciliation::default();
    for (key, source_ids) in source {
        let Some(dest_ids) = dest.get(&key) else {
            warn!(
                "no imported file matches '{}'; {} image(s) left unmapped",
                key,
                source_ids.len()
            );
            result.unmapped.push(UnmappedFile { key, source_ids });
            continue;
        };

        if dest_ids.len() != source_ids.len() {
            return Err(TransferError::ReconcileLengthMismatch {
                key,
                source_count: source_ids.len(),
                dest_count: dest_ids.len(),
            });
        }

        for (source_id, dest_id) in source_ids.iter().zip(dest_ids) {
            result.identity.insert(*source_id, *dest_id);
        }
    }

    Ok(result)
}
