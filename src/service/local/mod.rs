//! A repository instance backed by a local directory.
//!
//! Layout:
//!
//! ```text
//! <dir>/instance.json        state (objects, links, filesets)
//! <dir>/instance.lock        present while a session is open
//! <dir>/ManagedRepository/   imported files, one Fileset_<id>/ per import
//! <dir>/ScriptRepository/    unmanaged, listed but never packed from
//! ```
//!
//! Opening an instance is opening a session: the lock file keeps a second
//! session out until [`Session::close`] runs or the instance is dropped.

mod lock;
mod materialize;
mod serialize;
mod state;

pub use state::{
    client_path_key, AnnotationBody, AnnotationRow, DatasetRow, FilesetRow, ImageRow,
    InstanceState, ProjectRow, RoiRow,
};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use self::lock::InstanceLock;
use super::{
    FileDownload, GraphMaterializer, GraphSerializer, ImageQuery, ImportOperation, LinkMode,
    MaterializeSummary, RepositoryQuery, Session,
};
use crate::error::TransferError;
use crate::graph::{
    AnnotationId, DatasetId, FilesetId, ImageId, MapPair, ObjectRef, ProjectId, RoiId, Shape,
    TransferGraph,
};
use crate::packet::PathIdMap;
use crate::reconcile::IdentityMap;

const STATE_FILE: &str = "instance.json";
const LOCK_FILE: &str = "instance.lock";
const MANAGED_REPOSITORY: &str = "ManagedRepository";
const SCRIPT_REPOSITORY: &str = "ScriptRepository";

/// Decides how many images (series) one imported file yields.
pub type SeriesProbe = fn(&Path) -> usize;

fn single_series(_path: &Path) -> usize {
    1
}

/// One repository listed by an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub path: PathBuf,
    pub managed: bool,
}

/// Object counts, mostly for reporting and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceCounts {
    pub projects: usize,
    pub datasets: usize,
    pub images: usize,
    pub annotations: usize,
    pub rois: usize,
}

/// An open session on a directory-backed instance.
#[derive(Debug)]
pub struct LocalInstance {
    dir: PathBuf,
    state: InstanceState,
    lock: InstanceLock,
    series_probe: SeriesProbe,
}

impl LocalInstance {
    /// Initializes a new, empty instance at `dir` and opens it.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(MANAGED_REPOSITORY))?;
        fs::create_dir_all(dir.join(SCRIPT_REPOSITORY))?;

        let lock = InstanceLock::acquire(&dir.join(LOCK_FILE))?;
        let state_path = dir.join(STATE_FILE);
        if state_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already holds an instance", dir.display()),
            )
            .into());
        }
        let state = InstanceState::default();
        state.save(&state_path)?;
        info!("created instance at {}", dir.display());

        Ok(Self {
            dir,
            state,
            lock,
            series_probe: single_series,
        })
    }

    /// Opens the existing instance at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let dir = dir.into();
        let state_path = dir.join(STATE_FILE);
        if !state_path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no instance at {}", dir.display()),
            )
            .into());
        }

        let lock = InstanceLock::acquire(&dir.join(LOCK_FILE))?;
        let state = InstanceState::load(&state_path)?;
        debug!("opened instance at {}", dir.display());

        Ok(Self {
            dir,
            state,
            lock,
            series_probe: single_series,
        })
    }

    /// Opens the instance at `dir`, initializing it first if it is empty.
    pub fn open_or_create(dir: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let dir = dir.into();
        if dir.join(STATE_FILE).is_file() {
            Self::open(dir)
        } else {
            Self::create(dir)
        }
    }

    /// Replaces the series probe used by imports.
    pub fn with_series_probe(mut self, probe: SeriesProbe) -> Self {
        self.series_probe = probe;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn managed_repository(&self) -> PathBuf {
        self.dir.join(MANAGED_REPOSITORY)
    }

    pub fn state(&self) -> &InstanceState {
        &self.state
    }

    pub fn repositories(&self) -> Vec<Repository> {
        vec![
            Repository {
                name: SCRIPT_REPOSITORY.to_string(),
                path: self.dir.join(SCRIPT_REPOSITORY),
                managed: false,
            },
            Repository {
                name: MANAGED_REPOSITORY.to_string(),
                path: self.managed_repository(),
                managed: true,
            },
        ]
    }

    pub fn counts(&self) -> InstanceCounts {
        InstanceCounts {
            projects: self.state.projects.len(),
            datasets: self.state.datasets.len(),
            images: self.state.images.len(),
            annotations: self.state.annotations.len(),
            rois: self.state.rois.len(),
        }
    }

    fn save(&self) -> Result<(), TransferError> {
        self.state.save(&self.dir.join(STATE_FILE))
    }

    pub fn create_project(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<ProjectId, TransferError> {
        let id = ProjectId(self.state.allocate());
        self.state.projects.push(ProjectRow {
            id,
            name: name.into(),
            description,
            dataset_ids: Vec::new(),
            annotation_ids: Vec::new(),
        });
        self.save()?;
        Ok(id)
    }

    /// Creates a dataset, linking it under `project` when given.
    pub fn create_dataset(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        project: Option<ProjectId>,
    ) -> Result<DatasetId, TransferError> {
        let id = DatasetId(self.state.allocate());
        if let Some(project) = project {
            self.state
                .project_mut(project)
                .ok_or_else(|| TransferError::ObjectNotFound(ObjectRef::Project(project.0).to_string()))?
                .dataset_ids
                .push(id);
        }
        self.state.datasets.push(DatasetRow {
            id,
            name: name.into(),
            description,
            image_ids: Vec::new(),
            annotation_ids: Vec::new(),
        });
        self.save()?;
        Ok(id)
    }

    pub fn link_image(&mut self, dataset: DatasetId, image: ImageId) -> Result<(), TransferError> {
        if self.state.image(image).is_none() {
            return Err(TransferError::ObjectNotFound(
                ObjectRef::Image(image.0).to_string(),
            ));
        }
        let row = self.state.dataset_mut(dataset).ok_or_else(|| {
            TransferError::ObjectNotFound(ObjectRef::Dataset(dataset.0).to_string())
        })?;
        if !row.image_ids.contains(&image) {
            row.image_ids.push(image);
        }
        self.save()
    }

    pub fn add_tag(
        &mut self,
        value: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<AnnotationId, TransferError> {
        self.add_annotation(
            namespace.into(),
            AnnotationBody::Tag {
                value: value.into(),
            },
        )
    }

    pub fn add_map_annotation(
        &mut self,
        namespace: impl Into<String>,
        pairs: Vec<MapPair>,
    ) -> Result<AnnotationId, TransferError> {
        self.add_annotation(namespace.into(), AnnotationBody::Map { pairs })
    }

    fn add_annotation(
        &mut self,
        namespace: String,
        body: AnnotationBody,
    ) -> Result<AnnotationId, TransferError> {
        let id = AnnotationId(self.state.allocate());
        self.state.annotations.push(AnnotationRow {
            id,
            namespace,
            body,
        });
        self.save()?;
        Ok(id)
    }

    /// Links an existing annotation to a project, dataset or image.
    pub fn annotate(
        &mut self,
        target: ObjectRef,
        annotation: AnnotationId,
    ) -> Result<(), TransferError> {
        if self.state.annotation(annotation).is_none() {
            return Err(TransferError::ObjectNotFound(format!(
                "Annotation:{}",
                annotation
            )));
        }
        let not_found = || TransferError::ObjectNotFound(target.to_string());
        let links = match target {
            ObjectRef::Project(id) => {
                &mut self
                    .state
                    .project_mut(ProjectId(id))
                    .ok_or_else(not_found)?
                    .annotation_ids
            }
            ObjectRef::Dataset(id) => {
                &mut self
                    .state
                    .dataset_mut(DatasetId(id))
                    .ok_or_else(not_found)?
                    .annotation_ids
            }
            ObjectRef::Image(id) => {
                &mut self
                    .state
                    .image_mut(ImageId(id))
                    .ok_or_else(not_found)?
                    .annotation_ids
            }
        };
        if !links.contains(&annotation) {
            links.push(annotation);
        }
        self.save()
    }

    pub fn add_roi(
        &mut self,
        image: ImageId,
        name: Option<String>,
        shapes: Vec<Shape>,
    ) -> Result<RoiId, TransferError> {
        let id = RoiId(self.state.allocate());
        self.state
            .image_mut(image)
            .ok_or_else(|| TransferError::ObjectNotFound(ObjectRef::Image(image.0).to_string()))?
            .roi_ids
            .push(id);
        self.state.rois.push(RoiRow { id, name, shapes });
        self.save()?;
        Ok(id)
    }

    fn place_file(&self, source: &Path, target: &Path, mode: LinkMode) -> io::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match mode {
            LinkMode::Copy => fs::copy(source, target).map(|_| ()),
            LinkMode::InPlace => link_in_place(&fs::canonicalize(source)?, target),
        }
    }
}

#[cfg(unix)]
fn link_in_place(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn link_in_place(source: &Path, target: &Path) -> io::Result<()> {
    fs::hard_link(source, target)
}

impl RepositoryQuery for LocalInstance {
    fn managed_repository_roots(&self) -> Result<Vec<PathBuf>, TransferError> {
        Ok(self
            .repositories()
            .into_iter()
            .filter(|repo| repo.managed)
            .map(|repo| repo.path)
            .collect())
    }
}

impl ImageQuery for LocalInstance {
    fn image_ids_by_client_path(&self, client_path: &str) -> Result<Vec<ImageId>, TransferError> {
        Ok(self.state.image_ids_by_client_path(client_path))
    }
}

impl ImportOperation for LocalInstance {
    fn import(&mut self, path: &Path, mode: LinkMode) -> Result<(), TransferError> {
        let failed = |message: String| TransferError::ImportFailed {
            path: path.to_path_buf(),
            message,
        };

        if !path.is_file() {
            return Err(failed("no such file".to_string()));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| failed("path has no file name".to_string()))?;

        let fileset_id = FilesetId(self.state.allocate());
        let repo_path = format!("Fileset_{}/{}", fileset_id, file_name);
        let target = self.managed_repository().join(&repo_path);
        self.place_file(path, &target, mode)
            .map_err(|err| failed(err.to_string()))?;

        let series = (self.series_probe)(&target).max(1);
        let dimensions = imagesize::size(&target).ok();
        let (size_x, size_y) = match dimensions {
            Some(size) => (
                u32::try_from(size.width).ok(),
                u32::try_from(size.height).ok(),
            ),
            None => (None, None),
        };

        self.state.filesets.push(FilesetRow {
            id: fileset_id,
            client_path: client_path_key(&path.to_string_lossy()),
            repo_path,
            in_place: mode == LinkMode::InPlace,
        });
        for index in 0..series {
            let id = ImageId(self.state.allocate());
            let name = if series == 1 {
                file_name.clone()
            } else {
                format!("{} [{}]", file_name, index)
            };
            self.state.images.push(ImageRow {
                id,
                name,
                fileset_id,
                series: index,
                size_x,
                size_y,
                annotation_ids: Vec::new(),
                roi_ids: Vec::new(),
            });
        }
        debug!(
            "imported {} as fileset {} with {} image(s)",
            path.display(),
            fileset_id,
            series
        );
        self.save()
    }
}

impl FileDownload for LocalInstance {
    fn download(&self, repo_path: &Path, dest_dir: &Path) -> Result<PathBuf, TransferError> {
        let repo_root = self.managed_repository();
        if !repo_path.starts_with(&repo_root) {
            return Err(TransferError::PathOutsideRepository {
                path: repo_path.to_path_buf(),
                repo_root,
            });
        }
        let file_name = repo_path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", repo_path.display()),
            )
        })?;
        let target = dest_dir.join(file_name);
        fs::copy(repo_path, &target)?;
        Ok(target)
    }
}

impl GraphSerializer for LocalInstance {
    fn serialize(
        &self,
        root: ObjectRef,
        repo_root: &Path,
    ) -> Result<(TransferGraph, PathIdMap), TransferError> {
        serialize::serialize_graph(&self.state, &self.managed_repository(), repo_root, root)
    }
}

impl GraphMaterializer for LocalInstance {
    fn materialize(
        &mut self,
        graph: TransferGraph,
        identity: IdentityMap,
    ) -> Result<MaterializeSummary, TransferError> {
        let mut next = self.state.clone();
        let summary = materialize::materialize_graph(&mut next, graph, &identity)?;
        self.state = next;
        self.save()?;
        info!(
            "created {} project(s), {} dataset(s), {} annotation(s), {} ROI(s)",
            summary.projects, summary.datasets, summary.annotations, summary.rois
        );
        Ok(summary)
    }
}

impl Session for LocalInstance {
    fn close(&mut self) -> Result<(), TransferError> {
        self.lock.release()
    }
}
