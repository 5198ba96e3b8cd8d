//! JSON serialization for the transfer graph document.
//!
//! The document is written into the staging tree under [`GRAPH_FILE_NAME`]
//! and read back after the packet has been unpacked (or straight out of the
//! archive by `inspect`).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::model::TransferGraph;
use crate::error::TransferError;

/// Fixed name of the graph document at the top level of a packet.
pub const GRAPH_FILE_NAME: &str = "transfer.json";

/// Reads a transfer graph from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_graph_json(path: &Path) -> Result<TransferGraph, TransferError> {
    let file = File::open(path).map_err(TransferError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| TransferError::GraphParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a transfer graph to a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_graph_json(path: &Path, graph: &TransferGraph) -> Result<(), TransferError> {
    let file = File::create(path).map_err(TransferError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, graph).map_err(|source| {
        TransferError::GraphWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.flush().map_err(TransferError::Io)
}

/// Reads a transfer graph from a JSON string.
pub fn from_json_str(json: &str) -> Result<TransferGraph, serde_json::Error> {
    serde_json::from_str(json)
}

/// Reads a transfer graph from raw bytes.
pub fn from_json_slice(bytes: &[u8]) -> Result<TransferGraph, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Writes a transfer graph to a pretty-printed JSON string.
pub fn to_json_string(graph: &TransferGraph) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(graph)
}
