//! Transfer packets: zip archives holding a graph document plus the files it
//! needs, laid out as they were in the source managed repository.
//!
//! - [`builder`]: serialize, stage, copy files and zip (`pack`).
//! - [`extractor`]: unzip, parse, split pending files from real links.
//! - [`paths`]: repository root resolution and path join keys.
//! - [`archive`]: zip helpers.

pub mod archive;
pub mod builder;
pub mod extractor;
pub mod paths;

pub use builder::{build_packet, PackSummary};
pub use extractor::{extract_packet, split_pending_files, ExtractedPacket};
pub use paths::{join_key, PathIdMap, PATH_MARKER};
