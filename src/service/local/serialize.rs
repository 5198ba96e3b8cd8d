//! Walks a local instance below one root and builds its transfer graph.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::state::{AnnotationBody, InstanceState};
use crate::error::TransferError;
use crate::graph::{
    Annotation, AnnotationId, Dataset, DatasetId, FilesetId, GraphRef, Image, ImageId, ObjectRef,
    PendingFile, Project, ProjectId, Roi, RoiId, TransferGraph, DATASET_KIND, IMAGE_KIND,
    MAP_ANNOTATION_KIND, PROJECT_KIND, ROI_KIND, TAG_ANNOTATION_KIND,
};
use crate::packet::paths::marked_path;
use crate::packet::PathIdMap;

/// Serializes the hierarchy below `root`.
///
/// Every object is emitted once even when several parents link it, and an
/// object's own annotations come before those of its children. Files are
/// reported with every image of their fileset, so a multi-image file
/// announces as many source ids as its re-import will produce.
pub(super) fn serialize_graph(
    state: &InstanceState,
    managed_root: &Path,
    repo_root: &Path,
    root: ObjectRef,
) -> Result<(TransferGraph, PathIdMap), TransferError> {
    let mut builder = GraphBuilder {
        state,
        managed_root,
        repo_root,
        graph: TransferGraph::default(),
        paths: PathIdMap::new(),
        projects: HashSet::new(),
        datasets: HashSet::new(),
        images: HashSet::new(),
        annotations: HashSet::new(),
        rois: HashSet::new(),
    };
    match root {
        ObjectRef::Project(id) => builder.visit_project(ProjectId(id))?,
        ObjectRef::Dataset(id) => builder.visit_dataset(DatasetId(id))?,
        ObjectRef::Image(id) => builder.visit_image(ImageId(id))?,
    };
    debug!(
        "serialized {}: {} image(s), {} file(s)",
        root,
        builder.graph.images.len(),
        builder.paths.len()
    );
    Ok((builder.graph, builder.paths))
}

struct GraphBuilder<'a> {
    state: &'a InstanceState,
    managed_root: &'a Path,
    repo_root: &'a Path,
    graph: TransferGraph,
    paths: PathIdMap,
    projects: HashSet<ProjectId>,
    datasets: HashSet<DatasetId>,
    images: HashSet<ImageId>,
    annotations: HashSet<AnnotationId>,
    rois: HashSet<RoiId>,
}

impl GraphBuilder<'_> {
    fn visit_project(&mut self, id: ProjectId) -> Result<GraphRef, TransferError> {
        let reference = graph_ref(PROJECT_KIND, id.as_u64())?;
        if !self.projects.insert(id) {
            return Ok(reference);
        }
        let row = self
            .state
            .project(id)
            .ok_or_else(|| TransferError::ObjectNotFound(ObjectRef::Project(id.0).to_string()))?;

        let annotation_refs = self.visit_annotations(&row.annotation_ids)?;
        let mut dataset_refs = Vec::with_capacity(row.dataset_ids.len());
        for dataset in &row.dataset_ids {
            dataset_refs.push(self.visit_dataset(*dataset)?);
        }

        self.graph.projects.push(Project {
            id: reference.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            dataset_refs,
            annotation_refs,
        });
        Ok(reference)
    }

    fn visit_dataset(&mut self, id: DatasetId) -> Result<GraphRef, TransferError> {
        let reference = graph_ref(DATASET_KIND, id.as_u64())?;
        if !self.datasets.insert(id) {
            return Ok(reference);
        }
        let row = self
            .state
            .dataset(id)
            .ok_or_else(|| TransferError::ObjectNotFound(ObjectRef::Dataset(id.0).to_string()))?;

        let annotation_refs = self.visit_annotations(&row.annotation_ids)?;
        let mut image_refs = Vec::with_capacity(row.image_ids.len());
        for image in &row.image_ids {
            image_refs.push(self.visit_image(*image)?);
        }

        self.graph.datasets.push(Dataset {
            id: reference.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            image_refs,
            annotation_refs,
        });
        Ok(reference)
    }

    fn visit_image(&mut self, id: ImageId) -> Result<GraphRef, TransferError> {
        let reference = graph_ref(IMAGE_KIND, id.as_u64())?;
        if !self.images.insert(id) {
            return Ok(reference);
        }
        let row = self
            .state
            .image(id)
            .ok_or_else(|| TransferError::ObjectNotFound(ObjectRef::Image(id.0).to_string()))?;

        let annotation_refs = self.visit_annotations(&row.annotation_ids)?;
        let mut roi_refs = Vec::with_capacity(row.roi_ids.len());
        for roi in &row.roi_ids {
            roi_refs.push(self.visit_roi(*roi)?);
        }
        self.record_file(id, row.fileset_id)?;

        self.graph.images.push(Image {
            id: reference.clone(),
            name: row.name.clone(),
            annotation_refs,
            roi_refs,
        });
        Ok(reference)
    }

    fn visit_annotations(&mut self, ids: &[AnnotationId]) -> Result<Vec<GraphRef>, TransferError> {
        let mut refs = Vec::with_capacity(ids.len());
        for id in ids {
            let row = self.state.annotation(*id).ok_or_else(|| {
                TransferError::ObjectNotFound(format!("Annotation:{}", id))
            })?;
            let (kind, value, pairs) = match &row.body {
                AnnotationBody::Map { pairs } => (MAP_ANNOTATION_KIND, String::new(), pairs.clone()),
                AnnotationBody::Tag { value } => (TAG_ANNOTATION_KIND, value.clone(), Vec::new()),
            };
            let reference = graph_ref(kind, id.as_u64())?;
            if self.annotations.insert(*id) {
                self.graph.annotations.push(Annotation {
                    id: reference.clone(),
                    namespace: row.namespace.clone(),
                    value,
                    pairs,
                });
            }
            refs.push(reference);
        }
        Ok(refs)
    }

    fn visit_roi(&mut self, id: RoiId) -> Result<GraphRef, TransferError> {
        let reference = graph_ref(ROI_KIND, id.as_u64())?;
        if self.rois.insert(id) {
            let row = self
                .state
                .roi(id)
                .ok_or_else(|| TransferError::ObjectNotFound(reference.to_string()))?;
            self.graph.rois.push(Roi {
                id: reference.clone(),
                name: row.name.clone(),
                shapes: row.shapes.clone(),
            });
        }
        Ok(reference)
    }

    /// Announces the file behind `image` and the images sharing it.
    fn record_file(
        &mut self,
        image: ImageId,
        fileset_id: FilesetId,
    ) -> Result<(), TransferError> {
        let fileset = self.state.fileset(fileset_id).ok_or_else(|| {
            TransferError::ObjectNotFound(format!("Fileset:{} of Image:{}", fileset_id, image))
        })?;
        let absolute: PathBuf = self.managed_root.join(&fileset.repo_path);
        let relative = absolute.strip_prefix(self.repo_root).map_err(|_| {
            TransferError::PathOutsideRepository {
                path: absolute.clone(),
                repo_root: self.repo_root.to_path_buf(),
            }
        })?;
        let marked = marked_path(self.repo_root, relative);
        let key = absolute.to_string_lossy().into_owned();
        if self.paths.contains_key(&key) {
            return Ok(());
        }

        let mut siblings: Vec<ImageId> = self
            .state
            .images
            .iter()
            .filter(|row| row.fileset_id == fileset_id)
            .map(|row| row.id)
            .collect();
        siblings.sort_unstable();
        for sibling in &siblings {
            self.graph.pending_files.push(PendingFile {
                image: GraphRef::image(*sibling)?,
                path: marked.clone(),
            });
        }
        self.paths.insert(key, siblings);
        Ok(())
    }
}

fn graph_ref(kind: &str, id: u64) -> Result<GraphRef, TransferError> {
    let id = i64::try_from(id).map_err(|_| TransferError::InvalidGraphRef {
        input: format!("{}:{}", kind, id),
        message: "id does not fit a signed 64-bit integer".to_string(),
    })?;
    GraphRef::new(kind, id)
}
