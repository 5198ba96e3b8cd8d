//! Transfer graph validation.
//!
//! Checks the stripped graph before anything is created on the destination:
//! - Structural integrity (unique ids, every reference resolves)
//! - Extraction leftovers (sentinel entries or references)
//! - Content the materializer cannot carry (unsupported annotation kinds)
//! - Identity coverage (every image has a destination id)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{HashMap, HashSet};

use crate::graph::{GraphRef, TransferGraph};
use crate::reconcile::IdentityMap;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

impl ValidateOptions {
    /// True if `report` should stop the transfer under these options.
    pub fn is_blocking(&self, report: &ValidationReport) -> bool {
        report.error_count() > 0 || (self.strict && report.warning_count() > 0)
    }
}

/// Validates a stripped transfer graph and returns every issue found.
pub fn validate_graph(graph: &TransferGraph, _opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    let dataset_ids = collect_ids(
        graph.datasets.iter().map(|d| &d.id),
        IssueCode::DuplicateDatasetId,
        IssueContext::Dataset,
        &mut report,
    );
    let image_ids = collect_ids(
        graph.images.iter().map(|i| &i.id),
        IssueCode::DuplicateImageId,
        IssueContext::Image,
        &mut report,
    );
    let annotation_ids = collect_ids(
        graph.annotations.iter().map(|a| &a.id),
        IssueCode::DuplicateAnnotationId,
        IssueContext::Annotation,
        &mut report,
    );
    let roi_ids = collect_ids(
        graph.rois.iter().map(|r| &r.id),
        IssueCode::DuplicateRoiId,
        IssueContext::Roi,
        &mut report,
    );
    collect_ids(
        graph.projects.iter().map(|p| &p.id),
        IssueCode::DuplicateProjectId,
        IssueContext::Project,
        &mut report,
    );

    let mut referenced_annotations: HashSet<&GraphRef> = HashSet::new();

    for project in &graph.projects {
        let context = || IssueContext::Project(project.id.to_string());
        check_name(&project.name, context(), &mut report);
        check_refs(
            &project.dataset_refs,
            &dataset_ids,
            IssueCode::MissingDatasetRef,
            "dataset",
            context,
            &mut report,
        );
        check_refs(
            &project.annotation_refs,
            &annotation_ids,
            IssueCode::MissingAnnotationRef,
            "annotation",
            context,
            &mut report,
        );
        referenced_annotations.extend(project.annotation_refs.iter());
    }

    for dataset in &graph.datasets {
        let context = || IssueContext::Dataset(dataset.id.to_string());
        check_name(&dataset.name, context(), &mut report);
        check_refs(
            &dataset.image_refs,
            &image_ids,
            IssueCode::MissingImageRef,
            "image",
            context,
            &mut report,
        );
        check_refs(
            &dataset.annotation_refs,
            &annotation_ids,
            IssueCode::MissingAnnotationRef,
            "annotation",
            context,
            &mut report,
        );
        referenced_annotations.extend(dataset.annotation_refs.iter());
    }

    for image in &graph.images {
        let context = || IssueContext::Image(image.id.to_string());
        check_name(&image.name, context(), &mut report);
        check_refs(
            &image.annotation_refs,
            &annotation_ids,
            IssueCode::MissingAnnotationRef,
            "annotation",
            context,
            &mut report,
        );
        check_refs(
            &image.roi_refs,
            &roi_ids,
            IssueCode::MissingRoiRef,
            "ROI",
            context,
            &mut report,
        );
        referenced_annotations.extend(image.annotation_refs.iter());
    }

    for annotation in &graph.annotations {
        let context = IssueContext::Annotation(annotation.id.to_string());
        if annotation.id.is_sentinel() {
            report.add(ValidationIssue::error(
                IssueCode::ResidualSentinel,
                "Pending-file sentinel left in the annotation list",
                context,
            ));
            continue;
        }
        if annotation.kind().is_none() {
            report.add(ValidationIssue::error(
                IssueCode::UnsupportedAnnotationKind,
                format!(
                    "Kind '{}' is not transferable (supported: MapAnnotation, TagAnnotation)",
                    annotation.id.kind()
                ),
                context,
            ));
        } else if !referenced_annotations.contains(&annotation.id) {
            report.add(ValidationIssue::warning(
                IssueCode::UnreferencedAnnotation,
                "Not linked to any project, dataset or image",
                context,
            ));
        }
    }

    for roi in &graph.rois {
        if roi.shapes.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyRoi,
                "ROI has no shapes",
                IssueContext::Roi(roi.id.to_string()),
            ));
        }
    }

    if !graph.pending_files.is_empty() {
        report.add(ValidationIssue::error(
            IssueCode::ResidualSentinel,
            format!(
                "{} pending-file declaration(s) left in the graph",
                graph.pending_files.len()
            ),
            IssueContext::Graph,
        ));
    }

    report
}

/// Adds an error for every image of `graph` that has no destination id.
pub fn validate_identity_coverage(
    graph: &TransferGraph,
    identity: &IdentityMap,
    report: &mut ValidationReport,
) {
    for image in &graph.images {
        if !identity.contains(&image.id) {
            report.add(ValidationIssue::error(
                IssueCode::UnmappedImage,
                "No destination image matched this source image",
                IssueContext::Image(image.id.to_string()),
            ));
        }
    }
}

fn collect_ids<'a>(
    ids: impl Iterator<Item = &'a GraphRef>,
    duplicate: IssueCode,
    context: fn(String) -> IssueContext,
    report: &mut ValidationReport,
) -> HashSet<&'a GraphRef> {
    let mut seen: HashMap<&GraphRef, usize> = HashMap::new();
    for (idx, id) in ids.enumerate() {
        if let Some(first_idx) = seen.get(id) {
            report.add(ValidationIssue::error(
                duplicate,
                format!("Duplicate id {} (first seen at index {})", id, first_idx),
                context(id.to_string()),
            ));
        } else {
            seen.insert(id, idx);
        }
    }
    seen.into_keys().collect()
}

fn check_refs(
    refs: &[GraphRef],
    known: &HashSet<&GraphRef>,
    missing: IssueCode,
    what: &str,
    context: impl Fn() -> IssueContext,
    report: &mut ValidationReport,
) {
    for reference in refs {
        if reference.is_sentinel() {
            report.add(ValidationIssue::error(
                IssueCode::ResidualSentinel,
                format!("Reference to pending-file sentinel {}", reference),
                context(),
            ));
        } else if !known.contains(reference) {
            report.add(ValidationIssue::error(
                missing,
                format!("References non-existent {} {}", what, reference),
                context(),
            ));
        }
    }
}

fn check_name(name: &str, context: IssueContext, report: &mut ValidationReport) {
    if name.trim().is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptyName,
            "Empty name",
            context,
        ));
    }
}
