//! Recreates a stripped transfer graph on a local instance.

use std::collections::HashMap;

use tracing::debug;

use super::state::{AnnotationBody, AnnotationRow, DatasetRow, InstanceState, ProjectRow, RoiRow};
use crate::error::TransferError;
use crate::graph::{
    AnnotationId, AnnotationKind, DatasetId, GraphRef, ImageId, ProjectId, Roi, RoiId,
    TransferGraph,
};
use crate::reconcile::IdentityMap;
use crate::service::MaterializeSummary;

/// Applies `graph` to `state`. Images are never created here: every graph
/// image must already exist on the destination under the id `identity` maps
/// it to. On error `state` may be partially updated, so callers work on a
/// copy and only keep it on success.
pub(super) fn materialize_graph(
    state: &mut InstanceState,
    graph: TransferGraph,
    identity: &IdentityMap,
) -> Result<MaterializeSummary, TransferError> {
    let mut summary = MaterializeSummary::default();

    let mut annotations: HashMap<GraphRef, AnnotationId> = HashMap::new();
    for annotation in &graph.annotations {
        let body = match annotation.kind() {
            Some(AnnotationKind::Map) => AnnotationBody::Map {
                pairs: annotation.pairs.clone(),
            },
            Some(AnnotationKind::Tag) => AnnotationBody::Tag {
                value: annotation.value.clone(),
            },
            None => {
                return Err(TransferError::UnsupportedAnnotationKind {
                    kind: annotation.id.kind().to_string(),
                    reference: annotation.id.to_string(),
                })
            }
        };
        let id = AnnotationId(state.allocate());
        state.annotations.push(AnnotationRow {
            id,
            namespace: annotation.namespace.clone(),
            body,
        });
        annotations.insert(annotation.id.clone(), id);
        summary.annotations += 1;
    }
    let annotation_ids = |owner: &GraphRef, refs: &[GraphRef]| {
        resolve_all(owner, refs, |r| annotations.get(r).copied())
    };

    let rois: HashMap<&GraphRef, &Roi> =
        graph.rois.iter().map(|roi| (&roi.id, roi)).collect();

    for image in &graph.images {
        let dest = identity
            .get(&image.id)
            .ok_or_else(|| TransferError::UnmappedReference {
                reference: image.id.to_string(),
            })?;
        let image_annotations = annotation_ids(&image.id, &image.annotation_refs)?;

        let mut roi_ids = Vec::with_capacity(image.roi_refs.len());
        for reference in &image.roi_refs {
            let roi = rois
                .get(reference)
                .ok_or_else(|| dangling(&image.id, reference))?;
            let id = RoiId(state.allocate());
            state.rois.push(RoiRow {
                id,
                name: roi.name.clone(),
                shapes: roi.shapes.clone(),
            });
            roi_ids.push(id);
            summary.rois += 1;
        }

        let row = state.image_mut(dest).ok_or_else(|| {
            TransferError::ObjectNotFound(format!("Image:{} (mapped from {})", dest, image.id))
        })?;
        row.name = image.name.clone();
        row.annotation_ids.extend(image_annotations);
        row.roi_ids.extend(roi_ids);
        debug!("{} -> Image:{}", image.id, dest);
        summary.images += 1;
    }

    let mut datasets: HashMap<GraphRef, DatasetId> = HashMap::new();
    for dataset in &graph.datasets {
        let image_ids = dataset
            .image_refs
            .iter()
            .map(|reference| mapped_image(identity, reference))
            .collect::<Result<Vec<ImageId>, _>>()?;
        let id = DatasetId(state.allocate());
        state.datasets.push(DatasetRow {
            id,
            name: dataset.name.clone(),
            description: dataset.description.clone(),
            image_ids,
            annotation_ids: annotation_ids(&dataset.id, &dataset.annotation_refs)?,
        });
        datasets.insert(dataset.id.clone(), id);
        summary.datasets += 1;
    }

    for project in &graph.projects {
        let dataset_ids = resolve_all(&project.id, &project.dataset_refs, |r| {
            datasets.get(r).copied()
        })?;
        let id = ProjectId(state.allocate());
        state.projects.push(ProjectRow {
            id,
            name: project.name.clone(),
            description: project.description.clone(),
            dataset_ids,
            annotation_ids: annotation_ids(&project.id, &project.annotation_refs)?,
        });
        summary.projects += 1;
    }

    Ok(summary)
}

fn mapped_image(identity: &IdentityMap, reference: &GraphRef) -> Result<ImageId, TransferError> {
    identity
        .get(reference)
        .ok_or_else(|| TransferError::UnmappedReference {
            reference: reference.to_string(),
        })
}

fn resolve_all<T>(
    owner: &GraphRef,
    refs: &[GraphRef],
    lookup: impl Fn(&GraphRef) -> Option<T>,
) -> Result<Vec<T>, TransferError> {
    refs.iter()
        .map(|reference| lookup(reference).ok_or_else(|| dangling(owner, reference)))
        .collect()
}

fn dangling(owner: &GraphRef, reference: &GraphRef) -> TransferError {
    TransferError::DanglingReference {
        owner: owner.to_string(),
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Annotation, Dataset, FilesetId, Image, MapPair, Project, Shape};
    use crate::service::local::state::ImageRow;

    fn r(s: &str) -> GraphRef {
        s.parse().unwrap()
    }

    /// A destination holding two freshly imported orphans, ids 1 and 2.
    fn destination() -> InstanceState {
        let mut state = InstanceState {
            last_id: 2,
            ..Default::default()
        };
        for id in [1, 2] {
            state.images.push(ImageRow {
                id: ImageId(id),
                name: "orphan.tif".into(),
                fileset_id: FilesetId(100),
                series: 0,
                size_x: None,
                size_y: None,
                annotation_ids: vec![],
                roi_ids: vec![],
            });
        }
        state
    }

    fn graph() -> TransferGraph {
        TransferGraph {
            projects: vec![Project {
                id: r("Project:10"),
                name: "proj".into(),
                description: None,
                dataset_refs: vec![r("Dataset:20")],
                annotation_refs: vec![r("TagAnnotation:40")],
            }],
            datasets: vec![Dataset {
                id: r("Dataset:20"),
                name: "ds".into(),
                description: Some("desc".into()),
                image_refs: vec![r("Image:501"), r("Image:502")],
                annotation_refs: vec![],
            }],
            images: vec![
                Image {
                    id: r("Image:501"),
                    name: "first".into(),
                    annotation_refs: vec![r("MapAnnotation:41"), r("TagAnnotation:40")],
                    roi_refs: vec![r("ROI:60")],
                },
                Image {
                    id: r("Image:502"),
                    name: "second".into(),
                    annotation_refs: vec![],
                    roi_refs: vec![],
                },
            ],
            annotations: vec![
                Annotation {
                    id: r("TagAnnotation:40"),
                    namespace: String::new(),
                    value: "screen".into(),
                    pairs: vec![],
                },
                Annotation {
                    id: r("MapAnnotation:41"),
                    namespace: "ns".into(),
                    value: String::new(),
                    pairs: vec![MapPair::new("k", "v")],
                },
            ],
            rois: vec![Roi {
                id: r("ROI:60"),
                name: Some("cell".into()),
                shapes: vec![Shape::Rectangle {
                    x: 0.0,
                    y: 0.0,
                    width: 4.0,
                    height: 4.0,
                    text: None,
                }],
            }],
            ..Default::default()
        }
    }

    fn identity() -> IdentityMap {
        let mut identity = IdentityMap::new();
        identity.insert(ImageId(501), ImageId(1));
        identity.insert(ImageId(502), ImageId(2));
        identity
    }

    #[test]
    fn creates_and_links_everything() {
        let mut state = destination();
        let summary = materialize_graph(&mut state, graph(), &identity()).expect("materialize");
        assert_eq!(
            summary,
            MaterializeSummary {
                projects: 1,
                datasets: 1,
                images: 2,
                annotations: 2,
                rois: 1,
            }
        );

        let first = state.image(ImageId(1)).unwrap();
        assert_eq!(first.name, "first");
        assert_eq!(first.annotation_ids.len(), 2);
        assert_eq!(first.roi_ids.len(), 1);

        let dataset = &state.datasets[0];
        assert_eq!(dataset.image_ids, vec![ImageId(1), ImageId(2)]);
        assert_eq!(state.projects[0].dataset_ids, vec![dataset.id]);
        assert_eq!(state.projects[0].annotation_ids.len(), 1);
    }

    #[test]
    fn unmapped_image_is_an_error() {
        let mut state = destination();
        let mut identity = IdentityMap::new();
        identity.insert(ImageId(501), ImageId(1));
        let err = materialize_graph(&mut state, graph(), &identity).unwrap_err();
        assert!(matches!(
            err,
            TransferError::UnmappedReference { reference } if reference == "Image:502"
        ));
    }

    #[test]
    fn unsupported_annotation_kind_is_an_error() {
        let mut graph = graph();
        graph.annotations.push(Annotation {
            id: r("CommentAnnotation:42"),
            namespace: String::new(),
            value: "hi".into(),
            pairs: vec![],
        });
        let err = materialize_graph(&mut destination(), graph, &identity()).unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedAnnotationKind { .. }));
    }

    #[test]
    fn dangling_dataset_ref_is_an_error() {
        let mut graph = graph();
        graph.projects[0].dataset_refs.push(r("Dataset:99"));
        let err = materialize_graph(&mut destination(), graph, &identity()).unwrap_err();
        assert!(matches!(
            err,
            TransferError::DanglingReference { owner, .. } if owner == "Project:10"
        ));
    }
}
