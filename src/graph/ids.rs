//! Newtype IDs for instance-scoped object identifiers.
//!
//! Every repository instance hands out its own positive integer identifiers.
//! The newtypes keep image ids from being confused with dataset or annotation
//! ids, and keep source-side ids visually distinct from `GraphRef` strings.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! instance_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value.
            #[inline]
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self::new(id)
            }
        }
    };
}

instance_id!(
    /// Identifier of an image on one instance.
    ImageId
);
instance_id!(
    /// Identifier of a project on one instance.
    ProjectId
);
instance_id!(
    /// Identifier of a dataset on one instance.
    DatasetId
);
instance_id!(
    /// Identifier of a map or tag annotation on one instance.
    AnnotationId
);
instance_id!(
    /// Identifier of a region of interest on one instance.
    RoiId
);
instance_id!(
    /// Identifier of the fileset produced by a single import call.
    FilesetId
);
