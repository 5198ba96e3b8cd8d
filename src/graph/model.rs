//! The portable transfer graph.
//!
//! A transfer graph is what travels inside a packet: the hierarchy below the
//! exported root, the annotations linked to it, the ROIs of its images and the
//! list of files that still have to be imported on the destination. All ids
//! inside the graph are source-scoped `GraphRef`s; they only become
//! destination ids once the materializer runs with an identity map.

use serde::{Deserialize, Serialize};

use super::refs::{GraphRef, MAP_ANNOTATION_KIND, TAG_ANNOTATION_KIND};

/// Current version of the transfer document layout.
pub const FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// A complete transfer graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferGraph {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub datasets: Vec<Dataset>,

    /// Images in the order the serializer visited them.
    #[serde(default)]
    pub images: Vec<Image>,

    /// Map and tag annotations. Legacy documents may also carry negative-id
    /// sentinel entries here.
    #[serde(default)]
    pub annotations: Vec<Annotation>,

    /// Files that must be imported on the destination, one entry per image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_files: Vec<PendingFile>,

    #[serde(default)]
    pub rois: Vec<Roi>,
}

impl Default for TransferGraph {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            projects: Vec::new(),
            datasets: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
            pending_files: Vec::new(),
            rois: Vec::new(),
        }
    }
}

impl TransferGraph {
    /// Number of annotations that are real metadata (not sentinels).
    pub fn real_annotation_count(&self) -> usize {
        self.annotations
            .iter()
            .filter(|a| !a.id.is_sentinel())
            .count()
    }

    /// Number of sentinel entries still present in the annotation list.
    pub fn sentinel_count(&self) -> usize {
        self.annotations.len() - self.real_annotation_count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: GraphRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dataset_refs: Vec<GraphRef>,
    #[serde(default)]
    pub annotation_refs: Vec<GraphRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: GraphRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub image_refs: Vec<GraphRef>,
    #[serde(default)]
    pub annotation_refs: Vec<GraphRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: GraphRef,
    pub name: String,
    #[serde(default)]
    pub annotation_refs: Vec<GraphRef>,
    #[serde(default)]
    pub roi_refs: Vec<GraphRef>,
}

/// Kind of a real annotation, derived from the prefix of its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    Map,
    Tag,
}

/// One entry of the annotation collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: GraphRef,
    #[serde(default)]
    pub namespace: String,
    /// Tag text for tags; the marked file path for legacy sentinels.
    #[serde(default)]
    pub value: String,
    /// Key/value pairs of a map annotation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<MapPair>,
}

impl Annotation {
    pub fn kind(&self) -> Option<AnnotationKind> {
        match self.id.kind() {
            MAP_ANNOTATION_KIND => Some(AnnotationKind::Map),
            TAG_ANNOTATION_KIND => Some(AnnotationKind::Tag),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPair {
    pub key: String,
    pub value: String,
}

impl MapPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Declares that the backing file of a source image must be imported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    /// The source image, e.g. `Image:501`.
    pub image: GraphRef,
    /// `<repoRoot>/./<repository-relative path>`.
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub id: GraphRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

/// The ROI shapes that travel in a packet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    Point {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Ellipse {
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}
