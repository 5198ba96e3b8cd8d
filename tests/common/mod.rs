#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use transferpack::graph::{DatasetId, ImageId, MapPair, ObjectRef, ProjectId, Shape};
use transferpack::service::local::{LocalInstance, SeriesProbe};
use transferpack::service::{ImageQuery, ImportOperation, LinkMode};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub fn two_series(_path: &Path) -> usize {
    2
}

/// Ids of the objects seeded into a source instance.
pub struct Seeded {
    pub project: ProjectId,
    pub dataset: DatasetId,
    /// One entry per uploaded file, each with the images it produced.
    pub images: Vec<Vec<ImageId>>,
}

impl Seeded {
    pub fn all_images(&self) -> Vec<ImageId> {
        self.images.iter().flatten().copied().collect()
    }
}

/// Creates an instance at `<root>/source` holding one project with one
/// dataset, two imported bitmaps (16x8 and 32x32), a tag on the project, a
/// map annotation and a ROI on the first image.
pub fn seed_source(root: &Path, probe: Option<SeriesProbe>) -> (LocalInstance, Seeded) {
    let mut instance = LocalInstance::create(root.join("source")).expect("create source");
    if let Some(probe) = probe {
        instance = instance.with_series_probe(probe);
    }

    let uploads: [(PathBuf, u32, u32); 2] = [
        (root.join("upload/plate/a.bmp"), 16, 8),
        (root.join("upload/plate/b.bmp"), 32, 32),
    ];
    let mut images = Vec::new();
    for (path, width, height) in &uploads {
        write_bmp(path, *width, *height);
        instance.import(path, LinkMode::Copy).expect("import");
        images.push(
            instance
                .image_ids_by_client_path(&path.to_string_lossy())
                .expect("query"),
        );
    }

    let project = instance
        .create_project("screen", Some("pilot screen".into()))
        .expect("project");
    let dataset = instance
        .create_dataset("plate 1", None, Some(project))
        .expect("dataset");
    for id in images.iter().flatten() {
        instance.link_image(dataset, *id).expect("link");
    }

    let tag = instance.add_tag("pilot", "").expect("tag");
    instance
        .annotate(ObjectRef::Project(project.as_u64()), tag)
        .expect("annotate project");
    let map = instance
        .add_map_annotation(
            "openmicroscopy.org/omero/client/mapAnnotation",
            vec![MapPair::new("stain", "DAPI"), MapPair::new("well", "A1")],
        )
        .expect("map");
    let first = images[0][0];
    instance
        .annotate(ObjectRef::Image(first.as_u64()), map)
        .expect("annotate image");
    instance
        .add_roi(
            first,
            Some("nucleus".into()),
            vec![
                Shape::Ellipse {
                    x: 8.0,
                    y: 4.0,
                    radius_x: 3.0,
                    radius_y: 2.0,
                    text: Some("n1".into()),
                },
                Shape::Point {
                    x: 1.0,
                    y: 1.0,
                    text: None,
                },
            ],
        )
        .expect("roi");

    (
        instance,
        Seeded {
            project,
            dataset,
            images,
        },
    )
}
