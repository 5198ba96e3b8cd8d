//! Seams to the repository service.
//!
//! The transfer core never opens or closes sessions itself: every operation
//! receives an already-open session implementing the traits it needs. The
//! [`local`] module provides a filesystem-backed instance that implements all
//! of them.

pub mod local;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::TransferError;
use crate::graph::{ImageId, ObjectRef, TransferGraph};
use crate::packet::PathIdMap;
use crate::reconcile::IdentityMap;

/// How the destination takes ownership of an imported file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkMode {
    /// Copy the bytes into the managed repository.
    #[default]
    Copy,
    /// Leave the file where it is and link to it (in-place import).
    InPlace,
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Copy => write!(f, "copy"),
            LinkMode::InPlace => write!(f, "ln_s"),
        }
    }
}

/// Lists the repositories of an instance.
pub trait RepositoryQuery {
    /// Root paths of every managed repository, in listing order.
    fn managed_repository_roots(&self) -> Result<Vec<PathBuf>, TransferError>;
}

/// Looks up images by the client path recorded at import time.
pub trait ImageQuery {
    /// Ids of all images imported from `client_path`, ascending.
    fn image_ids_by_client_path(&self, client_path: &str) -> Result<Vec<ImageId>, TransferError>;
}

/// Imports one file into the instance.
pub trait ImportOperation {
    fn import(&mut self, path: &Path, mode: LinkMode) -> Result<(), TransferError>;
}

/// Fetches a file out of a managed repository.
pub trait FileDownload {
    /// Copies `repo_path` into `dest_dir`, returning the written path.
    fn download(&self, repo_path: &Path, dest_dir: &Path) -> Result<PathBuf, TransferError>;
}

/// Walks the hierarchy below a root object and produces a portable graph.
pub trait GraphSerializer {
    /// Returns the graph plus a map from absolute repository file path to the
    /// ascending ids of the source images backed by that file.
    fn serialize(
        &self,
        root: ObjectRef,
        repo_root: &Path,
    ) -> Result<(TransferGraph, PathIdMap), TransferError>;
}

/// What a materialization created on the destination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub projects: usize,
    pub datasets: usize,
    pub images: usize,
    pub annotations: usize,
    pub rois: usize,
}

/// Creates and links destination objects from a stripped graph.
pub trait GraphMaterializer {
    fn materialize(
        &mut self,
        graph: TransferGraph,
        identity: IdentityMap,
    ) -> Result<MaterializeSummary, TransferError>;
}

/// An open, authenticated connection to one instance.
pub trait Session {
    /// Releases the session. Calling it twice must be harmless.
    fn close(&mut self) -> Result<(), TransferError>;
}

/// Owns a session for the duration of one command and closes it on drop.
pub struct SessionGuard<S: Session> {
    session: S,
}

impl<S: Session> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: Session> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: Session> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Err(err) = self.session.close() {
            warn!("failed to close session: {}", err);
        }
    }
}
