//! File payloads for transfer.
//!
//! A transfer moves one [`FilePayload`] end to end. When the user
//! stages several files at once, [`bundle_archive`] packs them into a
//! single zip payload so the wire protocol only ever sees one file
//! per transfer.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{Error, Result};

/// A file staged for sending or assembled on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// File name, without any directory components
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Full file content
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Build a payload from in-memory bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a payload from disk, guessing the MIME type from the
    /// file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first()
            .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string());

        Ok(Self {
            name,
            content_type,
            bytes,
        })
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Write the payload into `dir` under its sanitized name.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// file cannot be written.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(sanitize_file_name(&self.name));
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Strip directory components and traversal sequences from a
/// received file name.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .replace("..", "");
    if base.is_empty() {
        "unnamed".to_string()
    } else {
        base
    }
}

/// Pack several payloads into one zip payload.
///
/// The archive is named `warpdrop-<unix-millis>.zip` and uses deflate
/// compression. Duplicate file names inside the archive get a numeric
/// suffix so no entry overwrites another.
///
/// # Errors
///
/// Returns `Error::Archive` if the zip cannot be built.
pub fn bundle_archive(files: &[FilePayload]) -> Result<FilePayload> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut seen: Vec<String> = Vec::new();
    for file in files {
        let entry_name = unique_entry_name(&sanitize_file_name(&file.name), &mut seen);
        writer
            .start_file(entry_name, options)
            .map_err(|e| Error::Archive(e.to_string()))?;
        writer.write_all(&file.bytes)?;
    }

    let cursor = writer.finish().map_err(|e| Error::Archive(e.to_string()))?;
    let name = format!("warpdrop-{}.zip", chrono::Utc::now().timestamp_millis());

    Ok(FilePayload::new(
        name,
        "application/zip",
        cursor.into_inner(),
    ))
}

fn unique_entry_name(name: &str, seen: &mut Vec<String>) -> String {
    if !seen.iter().any(|s| s == name) {
        seen.push(name.to_string());
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for counter in 1.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({counter}).{ext}"),
            None => format!("{stem} ({counter})"),
        };
        if !seen.iter().any(|s| s == &candidate) {
            seen.push(candidate.clone());
            return candidate;
        }
    }
    unreachable!()
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
