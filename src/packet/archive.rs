//! Zip packing and unpacking of staging trees.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::TransferError;

fn archive_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> TransferError + '_ {
    move |source| TransferError::Archive {
        path: path.to_path_buf(),
        source,
    }
}

/// Packs every file and directory below `src_dir` into a zip at `archive`.
///
/// Entry names are relative to `src_dir` and always use `/`.
pub fn zip_dir(src_dir: &Path, archive: &Path) -> Result<(), TransferError> {
    if let Some(parent) = archive.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(archive)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let dir_options = file_options.unix_permissions(0o755);

    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), dir_options)
                .map_err(archive_error(archive))?;
        } else {
            zip.start_file(name, file_options)
                .map_err(archive_error(archive))?;
            let mut source = BufReader::new(File::open(entry.path())?);
            io::copy(&mut source, &mut zip)?;
        }
    }

    let mut writer = zip.finish().map_err(archive_error(archive))?;
    writer.flush()?;
    Ok(())
}

/// Unpacks `archive` into `dest_dir`, creating it if needed.
pub fn unzip_into(archive: &Path, dest_dir: &Path) -> Result<(), TransferError> {
    fs::create_dir_all(dest_dir)?;
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(archive_error(archive))?;
    zip.extract(dest_dir).map_err(archive_error(archive))
}

/// Reads a single entry of `archive` into memory, `None` if it is absent.
pub fn read_entry(archive: &Path, name: &str) -> Result<Option<Vec<u8>>, TransferError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(archive_error(archive))?;

    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(source) => return Err(archive_error(archive)(source)),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}
