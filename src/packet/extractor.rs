//! Import side, first half: unpack a packet and separate pending files from
//! genuine links.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::archive::unzip_into;
use super::paths::{is_contained_relative, join_key, PathIdMap};
use crate::error::TransferError;
use crate::graph::io_json::{read_graph_json, GRAPH_FILE_NAME};
use crate::graph::{GraphRef, ImageId, TransferGraph, IMAGE_KIND};

/// An unpacked packet, ready for import.
#[derive(Clone, Debug)]
pub struct ExtractedPacket {
    /// Directory the archive was unpacked into.
    pub dir: PathBuf,
    /// The graph with every pending-file entry and sentinel reference removed.
    pub graph: TransferGraph,
    /// Marked source path to the ascending source image ids it backs.
    pub source_paths: PathIdMap,
    /// Distinct repository-relative files to import, in import order.
    pub files: Vec<String>,
}

/// Default unpack directory: the archive path without its extension.
///
/// Unpacking one archive twice into the same instance therefore imports from
/// the same client paths again, and reconciliation rejects the doubled files.
pub fn default_output_dir(archive: &Path) -> PathBuf {
    archive.with_extension("")
}

/// Unpacks `archive` (into `output`, or next to the archive) and splits its
/// graph.
pub fn extract_packet(
    archive: &Path,
    output: Option<&Path>,
) -> Result<ExtractedPacket, TransferError> {
    let dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(archive));

    info!("Unzipping {}...", archive.display());
    unzip_into(archive, &dir)?;

    let graph_path = dir.join(GRAPH_FILE_NAME);
    if !graph_path.is_file() {
        return Err(TransferError::MissingGraphDocument {
            path: archive.to_path_buf(),
        });
    }
    let mut graph = read_graph_json(&graph_path)?;

    info!("Generating image mapping and import file list...");
    let (source_paths, files) = split_pending_files(&mut graph)?;
    debug!("source path map: {:?}", source_paths);

    Ok(ExtractedPacket {
        dir,
        graph,
        source_paths,
        files,
    })
}

/// Removes pending-file declarations from `graph`, returning the source path
/// map and the deduplicated import list.
///
/// Both the `pending_files` collection and legacy negative-id annotation
/// entries are honoured. Afterwards the graph only holds real annotations and
/// no reference to a sentinel id survives.
pub fn split_pending_files(
    graph: &mut TransferGraph,
) -> Result<(PathIdMap, Vec<String>), TransferError> {
    let mut declared: Vec<(String, ImageId)> = Vec::new();

    for pending in &graph.pending_files {
        let image = source_image_id(&pending.image).ok_or_else(|| {
            TransferError::MalformedSentinel {
                id: pending.image.to_string(),
                message: "pending file must name a positive Image reference".to_string(),
            }
        })?;
        declared.push((pending.path.clone(), image));
    }

    for sentinel in graph.annotations.iter().filter(|a| a.id.is_sentinel()) {
        let image = sentinel
            .namespace
            .parse::<GraphRef>()
            .ok()
            .as_ref()
            .and_then(source_image_id)
            .ok_or_else(|| TransferError::MalformedSentinel {
                id: sentinel.id.to_string(),
                message: format!(
                    "namespace '{}' is not an 'Image:<id>' reference",
                    sentinel.namespace
                ),
            })?;
        declared.push((sentinel.value.clone(), image));
    }

    let mut source_paths = PathIdMap::new();
    let mut files = BTreeSet::new();
    for (path, image) in declared {
        let relative = join_key(&path);
        if !is_contained_relative(relative) {
            return Err(TransferError::MalformedSentinel {
                id: format!("{}:{}", IMAGE_KIND, image),
                message: format!("file path '{}' escapes the packet", path),
            });
        }
        files.insert(relative.to_string());
        source_paths.entry(path).or_default().push(image);
    }
    for ids in source_paths.values_mut() {
        ids.sort_unstable();
        ids.dedup();
    }

    graph.pending_files.clear();
    graph.annotations.retain(|a| !a.id.is_sentinel());
    for image in &mut graph.images {
        image.annotation_refs.retain(|r| !r.is_sentinel());
    }
    for dataset in &mut graph.datasets {
        dataset.annotation_refs.retain(|r| !r.is_sentinel());
    }
    for project in &mut graph.projects {
        project.annotation_refs.retain(|r| !r.is_sentinel());
    }

    Ok((source_paths, files.into_iter().collect()))
}

fn source_image_id(reference: &GraphRef) -> Option<ImageId> {
    if reference.is_kind(IMAGE_KIND) {
        reference.positive_id().map(ImageId::new)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Annotation, Image, MapPair, PendingFile};

    fn sentinel(id: i64, image: u64, path: &str) -> Annotation {
        Annotation {
            id: GraphRef::new("CommentAnnotation", id).unwrap(),
            namespace: format!("Image:{}", image),
            value: path.to_string(),
            pairs: vec![],
        }
    }

    fn map_annotation(id: i64) -> Annotation {
        Annotation {
            id: GraphRef::new("MapAnnotation", id).unwrap(),
            namespace: "ns".into(),
            value: String::new(),
            pairs: vec![MapPair::new("k", "v")],
        }
    }

    fn image(id: u64, refs: &[&str]) -> Image {
        Image {
            id: GraphRef::image(ImageId(id)).unwrap(),
            name: format!("image {}", id),
            annotation_refs: refs.iter().map(|r| r.parse().unwrap()).collect(),
            roi_refs: vec![],
        }
    }

    #[test]
    fn legacy_sentinels_are_partitioned_out() {
        let mut graph = TransferGraph {
            images: vec![
                image(502, &["CommentAnnotation:-2", "MapAnnotation:7"]),
                image(501, &["CommentAnnotation:-1"]),
            ],
            annotations: vec![
                sentinel(-1, 501, "/repo/./f.tif"),
                map_annotation(7),
                sentinel(-2, 502, "/repo/./f.tif"),
            ],
            ..Default::default()
        };

        let (paths, files) = split_pending_files(&mut graph).expect("split");

        assert_eq!(files, vec!["f.tif".to_string()]);
        assert_eq!(
            paths.get("/repo/./f.tif"),
            Some(&vec![ImageId(501), ImageId(502)])
        );
        assert_eq!(graph.annotations, vec![map_annotation(7)]);
        assert_eq!(
            graph.images[0].annotation_refs,
            vec!["MapAnnotation:7".parse::<GraphRef>().unwrap()]
        );
        assert!(graph.images[1].annotation_refs.is_empty());
    }

    #[test]
    fn pending_file_collection_feeds_the_same_maps() {
        let mut graph = TransferGraph {
            images: vec![image(10, &[]), image(11, &[])],
            pending_files: vec![
                PendingFile {
                    image: GraphRef::image(ImageId(11)).unwrap(),
                    path: "/repo/./2023/b.tif".into(),
                },
                PendingFile {
                    image: GraphRef::image(ImageId(10)).unwrap(),
                    path: "/repo/./2023/a.tif".into(),
                },
            ],
            ..Default::default()
        };

        let (paths, files) = split_pending_files(&mut graph).expect("split");
        assert_eq!(files, vec!["2023/a.tif".to_string(), "2023/b.tif".to_string()]);
        assert_eq!(paths.len(), 2);
        assert!(graph.pending_files.is_empty());
    }

    #[test]
    fn file_list_is_deduplicated_per_file() {
        let mut graph = TransferGraph {
            pending_files: (1..=3)
                .map(|id| PendingFile {
                    image: GraphRef::image(ImageId(id)).unwrap(),
                    path: "/repo/./multi.lif".into(),
                })
                .collect(),
            ..Default::default()
        };
        let (paths, files) = split_pending_files(&mut graph).expect("split");
        assert_eq!(files.len(), 1);
        assert_eq!(paths["/repo/./multi.lif"].len(), 3);
    }

    #[test]
    fn sentinel_with_bad_namespace_is_rejected() {
        let mut bad = sentinel(-1, 1, "/repo/./x.tif");
        bad.namespace = "Dataset:1".into();
        let mut graph = TransferGraph {
            annotations: vec![bad],
            ..Default::default()
        };
        assert!(matches!(
            split_pending_files(&mut graph),
            Err(TransferError::MalformedSentinel { .. })
        ));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let mut graph = TransferGraph {
            pending_files: vec![PendingFile {
                image: GraphRef::image(ImageId(1)).unwrap(),
                path: "/repo/./../../etc/passwd".into(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            split_pending_files(&mut graph),
            Err(TransferError::MalformedSentinel { .. })
        ));
    }

    #[test]
    fn default_output_dir_drops_extension() {
        assert_eq!(
            default_output_dir(Path::new("/data/transfer_pack.zip")),
            PathBuf::from("/data/transfer_pack")
        );
    }
}
