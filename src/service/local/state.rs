//! Persistent state of a local instance (`instance.json`).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::TransferError;
use crate::graph::{
    AnnotationId, DatasetId, FilesetId, ImageId, MapPair, ProjectId, RoiId, Shape,
};

/// Everything a local instance knows, persisted as one JSON document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstanceState {
    /// Last id handed out; ids are shared across every object kind.
    #[serde(default)]
    pub last_id: u64,
    #[serde(default)]
    pub projects: Vec<ProjectRow>,
    #[serde(default)]
    pub datasets: Vec<DatasetRow>,
    #[serde(default)]
    pub filesets: Vec<FilesetRow>,
    #[serde(default)]
    pub images: Vec<ImageRow>,
    #[serde(default)]
    pub annotations: Vec<AnnotationRow>,
    #[serde(default)]
    pub rois: Vec<RoiRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dataset_ids: Vec<DatasetId>,
    #[serde(default)]
    pub annotation_ids: Vec<AnnotationId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetRow {
    pub id: DatasetId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub image_ids: Vec<ImageId>,
    #[serde(default)]
    pub annotation_ids: Vec<AnnotationId>,
}

/// The files written by one import call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilesetRow {
    pub id: FilesetId,
    /// Path the file was imported from, without leading or trailing `/`.
    pub client_path: String,
    /// Location inside the managed repository, `/`-separated.
    pub repo_path: String,
    #[serde(default)]
    pub in_place: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRow {
    pub id: ImageId,
    pub name: String,
    pub fileset_id: FilesetId,
    /// Index of this image among the images of its fileset.
    pub series: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_y: Option<u32>,
    #[serde(default)]
    pub annotation_ids: Vec<AnnotationId>,
    #[serde(default)]
    pub roi_ids: Vec<RoiId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AnnotationBody {
    Map { pairs: Vec<MapPair> },
    Tag { value: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub id: AnnotationId,
    #[serde(default)]
    pub namespace: String,
    pub body: AnnotationBody,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoiRow {
    pub id: RoiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub shapes: Vec<Shape>,
}

impl InstanceState {
    /// Hands out the next instance-wide id.
    pub fn allocate(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn project(&self, id: ProjectId) -> Option<&ProjectRow> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: ProjectId) -> Option<&mut ProjectRow> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn dataset(&self, id: DatasetId) -> Option<&DatasetRow> {
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn dataset_mut(&mut self, id: DatasetId) -> Option<&mut DatasetRow> {
        self.datasets.iter_mut().find(|d| d.id == id)
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageRow> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn image_mut(&mut self, id: ImageId) -> Option<&mut ImageRow> {
        self.images.iter_mut().find(|i| i.id == id)
    }

    pub fn fileset(&self, id: FilesetId) -> Option<&FilesetRow> {
        self.filesets.iter().find(|f| f.id == id)
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&AnnotationRow> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn roi(&self, id: RoiId) -> Option<&RoiRow> {
        self.rois.iter().find(|r| r.id == id)
    }

    /// Images whose fileset was imported from `client_path`, ascending.
    ///
    /// Every import from the same client path counts, so a path imported twice
    /// reports the images of both filesets.
    pub fn image_ids_by_client_path(&self, client_path: &str) -> Vec<ImageId> {
        let key = client_path_key(client_path);
        let filesets: Vec<FilesetId> = self
            .filesets
            .iter()
            .filter(|f| f.client_path == key)
            .map(|f| f.id)
            .collect();
        let mut ids: Vec<ImageId> = self
            .images
            .iter()
            .filter(|i| filesets.contains(&i.fileset_id))
            .map(|i| i.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            TransferError::InstanceState {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Writes the state through a temporary file persisted over `path`.
    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, self).map_err(|source| {
                TransferError::InstanceState {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            writer.flush()?;
        }
        temp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Client paths are recorded and queried without surrounding slashes.
pub fn client_path_key(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_path_key_strips_slashes() {
        assert_eq!(client_path_key("/tmp/out/./a.tif"), "tmp/out/./a.tif");
        assert_eq!(client_path_key("a.tif"), "a.tif");
    }

    #[test]
    fn ids_are_shared_and_increasing() {
        let mut state = InstanceState::default();
        assert_eq!(state.allocate(), 1);
        assert_eq!(state.allocate(), 2);
    }

    #[test]
    fn client_path_query_is_sorted() {
        let mut state = InstanceState::default();
        state.filesets.push(FilesetRow {
            id: FilesetId(1),
            client_path: "out/./f.tif".into(),
            repo_path: "Fileset_1/f.tif".into(),
            in_place: false,
        });
        for (id, series) in [(9, 1), (3, 0)] {
            state.images.push(ImageRow {
                id: ImageId(id),
                name: "f.tif".into(),
                fileset_id: FilesetId(1),
                series,
                size_x: None,
                size_y: None,
                annotation_ids: vec![],
                roi_ids: vec![],
            });
        }
        assert_eq!(
            state.image_ids_by_client_path("/out/./f.tif"),
            vec![ImageId(3), ImageId(9)]
        );
        assert!(state.image_ids_by_client_path("other.tif").is_empty());
    }

    #[test]
    fn save_then_load() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("instance.json");
        let mut state = InstanceState::default();
        state.allocate();
        state.annotations.push(AnnotationRow {
            id: AnnotationId(1),
            namespace: String::new(),
            body: AnnotationBody::Tag {
                value: "screen".into(),
            },
        });
        state.save(&path).expect("save");

        let loaded = InstanceState::load(&path).expect("load");
        assert_eq!(loaded.last_id, 1);
        assert_eq!(loaded.annotations[0].body, state.annotations[0].body);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("instance.json");
        std::fs::create_dir(&path).expect("create blocking dir");
        std::fs::write(path.join("occupied"), b"x").expect("fill blocking dir");

        assert!(InstanceState::default().save(&path).is_err());

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("instance.json")]);
    }
}
