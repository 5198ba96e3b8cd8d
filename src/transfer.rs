//! Pack and unpack orchestration.
//!
//! `pack` = path resolution, serialization, packet building.
//! `unpack` = extraction, import, reconciliation, materialization, run
//! strictly in that order. A failed stage is never retried; the caller has to
//! start over from the archive.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::TransferError;
use crate::graph::io_json::{from_json_slice, GRAPH_FILE_NAME};
use crate::graph::{ObjectRef, TransferGraph};
use crate::importer::import_all;
use crate::packet::archive::read_entry;
use crate::packet::{build_packet, extract_packet, join_key, split_pending_files, PackSummary};
use crate::reconcile::{reconcile, UnmappedFile};
use crate::service::{
    FileDownload, GraphMaterializer, GraphSerializer, ImageQuery, ImportOperation, LinkMode,
    MaterializeSummary, RepositoryQuery,
};
use crate::validation::{
    validate_graph, validate_identity_coverage, ValidateOptions, ValidationReport,
};

/// Progress of an unpack. Each stage is entered at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnpackStage {
    Started,
    Extracted,
    Imported,
    Reconciled,
    Materialized,
}

impl fmt::Display for UnpackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnpackStage::Started => "started",
            UnpackStage::Extracted => "extracted",
            UnpackStage::Imported => "imported",
            UnpackStage::Reconciled => "reconciled",
            UnpackStage::Materialized => "materialized",
        };
        write!(f, "{}", name)
    }
}

/// Options for [`unpack`].
#[derive(Clone, Debug, Default)]
pub struct UnpackOptions {
    /// Where to unzip the packet. Defaults to a sibling of the archive.
    pub output: Option<PathBuf>,
    pub link_mode: LinkMode,
    pub validate: ValidateOptions,
}

/// What an unpack did.
#[derive(Clone, Debug)]
pub struct UnpackReport {
    pub output_dir: PathBuf,
    pub files_imported: usize,
    pub images_mapped: usize,
    pub unmapped: Vec<UnmappedFile>,
    pub created: MaterializeSummary,
    pub validation: ValidationReport,
}

impl fmt::Display for UnpackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unpacked into {}", self.output_dir.display())?;
        writeln!(
            f,
            "  {} file(s) imported, {} image(s) matched",
            self.files_imported, self.images_mapped
        )?;
        writeln!(
            f,
            "  created: {} project(s), {} dataset(s), {} annotation(s), {} ROI(s); linked {} image(s)",
            self.created.projects,
            self.created.datasets,
            self.created.annotations,
            self.created.rois,
            self.created.images
        )?;

        if !self.unmapped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Unmapped files ({}):", self.unmapped.len())?;
            for file in &self.unmapped {
                writeln!(f, "  - {} ({} image(s))", file.key, file.source_ids.len())?;
            }
        }

        if self.validation.warning_count() > 0 {
            writeln!(f)?;
            write!(f, "{}", self.validation)?;
        }
        Ok(())
    }
}

/// Writes a transfer packet for `root` to `archive`.
pub fn pack<S>(session: &S, root: ObjectRef, archive: &Path) -> Result<PackSummary, TransferError>
where
    S: RepositoryQuery + GraphSerializer + FileDownload + ?Sized,
{
    build_packet(session, root, archive)
}

/// Recreates the contents of `archive` on the session's instance.
pub fn unpack<S>(
    session: &mut S,
    archive: &Path,
    opts: &UnpackOptions,
) -> Result<UnpackReport, TransferError>
where
    S: ImportOperation + ImageQuery + GraphMaterializer + ?Sized,
{
    let mut stage = UnpackStage::Started;
    let fail = |stage: UnpackStage| {
        move |source: TransferError| TransferError::UnpackFailed {
            stage,
            source: Box::new(source),
        }
    };

    let packet = extract_packet(archive, opts.output.as_deref()).map_err(fail(stage))?;
    stage = UnpackStage::Extracted;
    let mut validation = validate_graph(&packet.graph, &opts.validate);
    if opts.validate.is_blocking(&validation) {
        return Err(fail(stage)(validation_failed(validation)));
    }

    info!("Importing data as orphans...");
    let dest_paths = import_all(session, &packet.dir, &packet.files, opts.link_mode)
        .map_err(fail(stage))?;
    stage = UnpackStage::Imported;

    info!("Matching source and destination images...");
    let reconciliation = reconcile(&packet.source_paths, &dest_paths).map_err(fail(stage))?;
    validate_identity_coverage(&packet.graph, &reconciliation.identity, &mut validation);
    if opts.validate.is_blocking(&validation) {
        return Err(fail(stage)(validation_failed(validation)));
    }
    stage = UnpackStage::Reconciled;

    info!("Creating and linking objects...");
    let images_mapped = reconciliation.identity.len();
    let created = session
        .materialize(packet.graph, reconciliation.identity)
        .map_err(fail(stage))?;
    stage = UnpackStage::Materialized;
    info!("Unpack {}", stage);

    Ok(UnpackReport {
        output_dir: packet.dir,
        files_imported: packet.files.len(),
        images_mapped,
        unmapped: reconciliation.unmapped,
        created,
        validation,
    })
}

fn validation_failed(report: ValidationReport) -> TransferError {
    TransferError::ValidationFailed {
        error_count: report.error_count(),
        warning_count: report.warning_count(),
        report,
    }
}

/// Contents of a packet, read without unpacking it.
#[derive(Clone, Debug, Serialize)]
pub struct PacketSummary {
    pub projects: usize,
    pub datasets: usize,
    pub images: usize,
    pub annotations: usize,
    pub rois: usize,
    /// Distinct files the packet would import.
    pub files: Vec<String>,
    pub validation: ValidationReport,
}

impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} project(s), {} dataset(s), {} image(s), {} annotation(s), {} ROI(s)",
            self.projects, self.datasets, self.images, self.annotations, self.rois
        )?;
        writeln!(f, "  {} file(s):", self.files.len())?;
        for file in &self.files {
            writeln!(f, "    {}", file)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.validation)
    }
}

/// Summarizes the graph document of `archive`.
pub fn inspect(archive: &Path, opts: &ValidateOptions) -> Result<PacketSummary, TransferError> {
    let bytes = read_entry(archive, GRAPH_FILE_NAME)?.ok_or_else(|| {
        TransferError::MissingGraphDocument {
            path: archive.to_path_buf(),
        }
    })?;
    let mut graph: TransferGraph =
        from_json_slice(&bytes).map_err(|source| TransferError::GraphParse {
            path: archive.join(GRAPH_FILE_NAME),
            source,
        })?;

    let (source_paths, _) = split_pending_files(&mut graph)?;
    let files: BTreeSet<String> = source_paths
        .keys()
        .map(|path| join_key(path).to_string())
        .collect();
    let validation = validate_graph(&graph, opts);

    Ok(PacketSummary {
        projects: graph.projects.len(),
        datasets: graph.datasets.len(),
        images: graph.images.len(),
        annotations: graph.annotations.len(),
        rois: graph.rois.len(),
        files: files.into_iter().collect(),
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(UnpackStage::Started < UnpackStage::Extracted);
        assert!(UnpackStage::Reconciled < UnpackStage::Materialized);
        assert_eq!(UnpackStage::Imported.to_string(), "imported");
    }

    #[test]
    fn unpack_of_missing_archive_fails_before_extraction() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let mut instance =
            crate::service::local::LocalInstance::create(temp.path().join("dest")).unwrap();
        let err = unpack(
            &mut instance,
            &temp.path().join("missing.zip"),
            &UnpackOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransferError::UnpackFailed {
                stage: UnpackStage::Started,
                ..
            }
        ));
    }
}
