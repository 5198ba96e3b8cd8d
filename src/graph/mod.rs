//! The portable transfer graph and its identifiers.
//!
//! A graph is produced by a [`GraphSerializer`](crate::service::GraphSerializer)
//! at pack time, travels as [`io_json::GRAPH_FILE_NAME`] inside the packet,
//! and is consumed by a [`GraphMaterializer`](crate::service::GraphMaterializer)
//! at unpack time. References inside it are `"Kind:<integer>"` strings scoped
//! to the source instance.

mod ids;
pub mod io_json;
mod model;
mod refs;

pub use ids::{AnnotationId, DatasetId, FilesetId, ImageId, ProjectId, RoiId};
pub use model::{
    Annotation, AnnotationKind, Dataset, Image, MapPair, PendingFile, Project, Roi, Shape,
    TransferGraph, FORMAT_VERSION,
};
pub use refs::{
    GraphRef, ObjectRef, DATASET_KIND, IMAGE_KIND, MAP_ANNOTATION_KIND, PROJECT_KIND, ROI_KIND,
    TAG_ANNOTATION_KIND,
};
