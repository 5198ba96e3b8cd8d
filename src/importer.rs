//! Sequential import of packet files into the destination.

use std::path::Path;

use tracing::{debug, info};

use crate::error::TransferError;
use crate::packet::paths::import_location;
use crate::packet::PathIdMap;
use crate::service::{ImageQuery, ImportOperation, LinkMode};

/// Imports every file of `files` from `base_dir`, one at a time and in list
/// order, and records which destination images each import produced.
///
/// The first failing import aborts the whole run. Files imported before it
/// stay on the destination.
pub fn import_all<S>(
    session: &mut S,
    base_dir: &Path,
    files: &[String],
    mode: LinkMode,
) -> Result<PathIdMap, TransferError>
where
    S: ImportOperation + ImageQuery + ?Sized,
{
    let mut dest_paths = PathIdMap::new();

    for (index, file) in files.iter().enumerate() {
        let location = import_location(base_dir, file);
        info!(
            "Importing {} ({}/{}, transfer={})",
            location.display(),
            index + 1,
            files.len(),
            mode
        );

        session
            .import(&location, mode)
            .map_err(|err| match err {
                TransferError::ImportFailed { .. } => err,
                other => TransferError::ImportFailed {
                    path: location.clone(),
                    message: other.to_string(),
                },
            })?;

        let client_path = location.to_string_lossy().into_owned();
        let mut image_ids = session.image_ids_by_client_path(&client_path)?;
        image_ids.sort_unstable();
        debug!("{} -> {:?}", client_path, image_ids);
        dest_paths.insert(client_path, image_ids);
    }

    Ok(dest_paths)
}
