use std::path::PathBuf;
use thiserror::Error;

use crate::transfer::UnpackStage;
use crate::validation::ValidationReport;

/// The main error type for transferpack operations.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported root kind '{0}' (supported: Project, Dataset, Image)")]
    UnsupportedRootKind(String),

    #[error("Invalid object reference '{input}': {message}")]
    InvalidObjectRef { input: String, message: String },

    #[error("Invalid graph reference '{input}': {message}")]
    InvalidGraphRef { input: String, message: String },

    #[error("No managed repository found on the instance")]
    NoManagedRepository,

    #[error("File {path} is not inside repository root {repo_root}")]
    PathOutsideRepository { path: PathBuf, repo_root: PathBuf },

    #[error("Failed to parse transfer graph from {path}: {source}")]
    GraphParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write transfer graph to {path}: {source}")]
    GraphWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive {path} does not contain a transfer graph document")]
    MissingGraphDocument { path: PathBuf },

    #[error("Malformed pending-file entry {id}: {message}")]
    MalformedSentinel { id: String, message: String },

    #[error("Archive error for {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Import of {path} failed: {message}")]
    ImportFailed { path: PathBuf, message: String },

    #[error(
        "File '{key}' maps to {source_count} source image(s) but {dest_count} destination image(s)"
    )]
    ReconcileLengthMismatch {
        key: String,
        source_count: usize,
        dest_count: usize,
    },

    #[error("No destination identifier for {reference}")]
    UnmappedReference { reference: String },

    #[error("{owner} references {reference}, which is not part of the transfer graph")]
    DanglingReference { owner: String, reference: String },

    #[error("Unsupported annotation kind '{kind}' for {reference}")]
    UnsupportedAnnotationKind { kind: String, reference: String },

    #[error("Object {0} not found on the instance")]
    ObjectNotFound(String),

    #[error("Instance at {path} is in use by another session")]
    SessionBusy { path: PathBuf },

    #[error("Failed to read instance state from {path}: {source}")]
    InstanceState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Unpack stopped after stage {stage}: {source}")]
    UnpackFailed {
        stage: UnpackStage,
        #[source]
        source: Box<TransferError>,
    },
}
