use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::domain::ReportDocument;
use crate::error::MigrateError;

pub const DEFINITION_EXTENSION: &str = "rdl";

/// Loads upload documents. Directories contribute their `.rdl` files (not
/// recursively, sorted by name); files are taken as given. The report name
/// is the file stem.
pub fn read_documents(inputs: &[Utf8PathBuf]) -> Result<Vec<ReportDocument>, MigrateError> {
    let mut documents = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for path in definition_files(input)? {
                documents.push(read_document(&path)?);
            }
        } else {
            documents.push(read_document(input)?);
        }
    }
    Ok(documents)
}

fn definition_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, MigrateError> {
    let entries = dir
        .read_dir_utf8()
        .map_err(|err| MigrateError::Filesystem(format!("read dir {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let is_definition = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(DEFINITION_EXTENSION))
            .unwrap_or(false);
        if path.is_file() && is_definition {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn read_document(path: &Utf8Path) -> Result<ReportDocument, MigrateError> {
    let bytes =
        fs::read(path).map_err(|err| MigrateError::Filesystem(format!("read {path}: {err}")))?;
    let name = path.file_stem().unwrap_or_default().to_string();
    Ok(ReportDocument::new(name, bytes))
}

/// `<prefix>_<yyyyMMddHHmm>.zip`
pub fn archive_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}.zip", now.format("%Y%m%d%H%M"))
}

/// Writes the downloaded definitions into one ZIP archive at `path`.
pub fn write_archive(path: &Utf8Path, files: &BTreeMap<String, Vec<u8>>) -> Result<(), MigrateError> {
    let parent = parent_dir(path)?;
    let temp = tempfile::Builder::new()
        .prefix("rdlm-archive")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MigrateError::Filesystem(err.to_string()))?;

    let mut zip = ZipWriter::new(
        temp.reopen()
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?,
    );
    for (name, bytes) in files {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        zip.write_all(bytes)
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
    }
    zip.finish()
        .map_err(|err| MigrateError::Filesystem(err.to_string()))?;

    temp.persist(path.as_std_path())
        .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Writes each definition as its own file under `dir`.
pub fn write_files(
    dir: &Utf8Path,
    files: &BTreeMap<String, Vec<u8>>,
) -> Result<Vec<Utf8PathBuf>, MigrateError> {
    fs::create_dir_all(dir.as_std_path())
        .map_err(|err| MigrateError::Filesystem(format!("create {dir}: {err}")))?;
    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        if name.contains(['/', '\\']) || name.starts_with("..") {
            return Err(MigrateError::Filesystem(format!(
                "refusing to write outside {dir}: {name}"
            )));
        }
        let target = dir.join(name);
        let temp = tempfile::Builder::new()
            .prefix("rdlm-file")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), bytes)
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        temp.persist(target.as_std_path())
            .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
        written.push(target);
    }
    Ok(written)
}

fn parent_dir(path: &Utf8Path) -> Result<&Utf8Path, MigrateError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| MigrateError::Filesystem(err.to_string()))?;
    Ok(parent)
}
