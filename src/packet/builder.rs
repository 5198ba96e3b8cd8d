//! Export side: serialize a hierarchy and pack it with its files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::archive::zip_dir;
use super::paths::{relative_parent, resolve_repo_root};
use crate::error::TransferError;
use crate::graph::io_json::{write_graph_json, GRAPH_FILE_NAME};
use crate::graph::ObjectRef;
use crate::service::{FileDownload, GraphSerializer, RepositoryQuery};

/// Counts describing a freshly written packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackSummary {
    /// Where the archive was written (always with a `.zip` extension).
    pub archive: PathBuf,
    pub images: usize,
    pub annotations: usize,
    pub rois: usize,
    pub files: usize,
}

/// Scratch directory a packet is assembled in; removed when dropped.
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    fn create(path: PathBuf) -> Result<Self, TransferError> {
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(
                "could not remove staging directory {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// `<archive>_folder`, next to the archive.
fn staging_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push("_folder");
    PathBuf::from(name)
}

/// Builds a transfer packet for `root` at `archive`.
///
/// The archive holds the graph document plus every referenced file at its
/// repository-relative location.
pub fn build_packet<S>(
    session: &S,
    root: ObjectRef,
    archive: &Path,
) -> Result<PackSummary, TransferError>
where
    S: RepositoryQuery + GraphSerializer + FileDownload + ?Sized,
{
    let repo_root = resolve_repo_root(session)?;
    debug!("managed repository root: {}", repo_root.display());

    info!("Populating transfer graph for {}...", root);
    let (graph, source_paths) = session.serialize(root, &repo_root)?;

    let archive = archive.with_extension("zip");
    let staging = StagingDir::create(staging_path(&archive))?;
    let graph_path = staging.path.join(GRAPH_FILE_NAME);
    write_graph_json(&graph_path, &graph)?;
    info!("Graph saved at {}.", graph_path.display());

    info!("Starting file copy...");
    for (path, image_ids) in &source_paths {
        let path = Path::new(path);
        let subfolder = staging.path.join(relative_parent(path, &repo_root)?);
        fs::create_dir_all(&subfolder)?;
        debug!(
            "copying {} ({} image(s)) into {}",
            path.display(),
            image_ids.len(),
            subfolder.display()
        );
        session.download(path, &subfolder)?;
    }

    info!("Creating zip file...");
    zip_dir(&staging.path, &archive)?;

    info!("Cleaning up...");
    drop(staging);

    Ok(PackSummary {
        archive,
        images: graph.images.len(),
        annotations: graph.real_annotation_count(),
        rois: graph.rois.len(),
        files: source_paths.len(),
    })
}
