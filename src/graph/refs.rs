//! String references used inside the transfer document and on the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::ImageId;
use crate::error::TransferError;

pub const PROJECT_KIND: &str = "Project";
pub const DATASET_KIND: &str = "Dataset";
pub const IMAGE_KIND: &str = "Image";
pub const ROI_KIND: &str = "ROI";
pub const MAP_ANNOTATION_KIND: &str = "MapAnnotation";
pub const TAG_ANNOTATION_KIND: &str = "TagAnnotation";

/// A `"Kind:<integer>"` reference inside a transfer graph.
///
/// The integer is source-scoped. A negative integer marks a legacy
/// pending-file sentinel rather than a real object; zero is never valid.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GraphRef {
    kind: String,
    id: i64,
}

impl GraphRef {
    /// Creates a reference, rejecting empty kinds and a zero id.
    pub fn new(kind: impl Into<String>, id: i64) -> Result<Self, TransferError> {
        let kind = kind.into();
        if kind.is_empty() || kind.contains(':') {
            return Err(TransferError::InvalidGraphRef {
                input: format!("{}:{}", kind, id),
                message: "kind must be non-empty and must not contain ':'".to_string(),
            });
        }
        if id == 0 {
            return Err(TransferError::InvalidGraphRef {
                input: format!("{}:{}", kind, id),
                message: "id must be non-zero".to_string(),
            });
        }
        Ok(Self { kind, id })
    }

    /// Reference to a source-side image, e.g. `Image:501`.
    ///
    /// Ids beyond `i64::MAX` are rejected rather than wrapped into sentinels.
    pub fn image(id: ImageId) -> Result<Self, TransferError> {
        let signed = i64::try_from(id.as_u64()).map_err(|_| TransferError::InvalidGraphRef {
            input: format!("{}:{}", IMAGE_KIND, id),
            message: "id does not fit a signed 64-bit integer".to_string(),
        })?;
        Self::new(IMAGE_KIND, signed)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// True for the negative-id entries that only announce a pending file.
    pub fn is_sentinel(&self) -> bool {
        self.id < 0
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// The id as an unsigned value, if this is a real (positive) reference.
    pub fn positive_id(&self) -> Option<u64> {
        u64::try_from(self.id).ok()
    }
}

impl FromStr for GraphRef {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| TransferError::InvalidGraphRef {
                input: s.to_string(),
                message: "expected '<Kind>:<integer>'".to_string(),
            })?;
        let id: i64 = id.parse().map_err(|_| TransferError::InvalidGraphRef {
            input: s.to_string(),
            message: format!("'{}' is not an integer", id),
        })?;
        GraphRef::new(kind, id).map_err(|_| TransferError::InvalidGraphRef {
            input: s.to_string(),
            message: "kind must be non-empty and id non-zero".to_string(),
        })
    }
}

impl TryFrom<String> for GraphRef {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GraphRef> for String {
    fn from(value: GraphRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl fmt::Debug for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphRef({})", self)
    }
}

/// The root of an export: a project, a dataset, or a single image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Project(u64),
    Dataset(u64),
    Image(u64),
}

impl ObjectRef {
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectRef::Project(_) => PROJECT_KIND,
            ObjectRef::Dataset(_) => DATASET_KIND,
            ObjectRef::Image(_) => IMAGE_KIND,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            ObjectRef::Project(id) | ObjectRef::Dataset(id) | ObjectRef::Image(id) => *id,
        }
    }
}

impl FromStr for ObjectRef {
    type Err = TransferError;

    /// Parses `<Kind>:<id>`; a bare `<id>` means `Project:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, raw_id) = s.split_once(':').unwrap_or((PROJECT_KIND, s));

        let constructor: fn(u64) -> ObjectRef = match kind {
            PROJECT_KIND => ObjectRef::Project,
            DATASET_KIND => ObjectRef::Dataset,
            IMAGE_KIND => ObjectRef::Image,
            other => return Err(TransferError::UnsupportedRootKind(other.to_string())),
        };

        match raw_id.parse::<u64>() {
            Ok(id) if id > 0 => Ok(constructor(id)),
            _ => Err(TransferError::InvalidObjectRef {
                input: s.to_string(),
                message: format!("'{}' is not a positive integer id", raw_id),
            }),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
