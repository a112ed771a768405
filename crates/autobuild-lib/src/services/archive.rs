// Archive Normalizer
// Rebuilds uploaded task ZIPs so every entry path uses forward slashes
//
// ZIPs produced by some Windows tools store entry names like `src\main.py`.
// Unix extractors treat those as single file names, so the archive is parsed,
// each entry path rewritten, and the container re-emitted with fixed
// compression settings. Content bytes are never touched.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{AutobuildError, AutobuildResult};

/// DEFLATE level used for every rebuilt entry
pub const COMPRESSION_LEVEL: i64 = 6;

/// A file entry after path normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub content: Vec<u8>,
}

/// Shape of an archive, gathered without decompressing anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// All records, directories included
    pub entries: usize,
    /// Directory placeholder records
    pub directories: usize,
    /// File paths that contain a backslash
    pub backslash_paths: usize,
    /// Sum of declared uncompressed sizes of file entries
    pub uncompressed_bytes: u64,
}

impl ArchiveSummary {
    pub fn files(&self) -> usize {
        self.entries - self.directories
    }

    /// Whether [`normalize`] would rename anything
    pub fn needs_rewrite(&self) -> bool {
        self.backslash_paths > 0
    }
}

fn archive_error(context: &str, err: impl std::fmt::Display) -> AutobuildError {
    AutobuildError::ArchiveFormat {
        message: format!("{}: {}", context, err),
    }
}

/// Replace every backslash with a forward slash
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Directory records end with a separator (either flavour)
fn is_directory_name(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}

/// Entry name as stored in the archive.
///
/// Raw bytes that form valid UTF-8 are taken as UTF-8 whether or not the
/// entry carries the UTF-8 flag. Anything else keeps the zip crate's CP437
/// decoding.
fn entry_name(raw: &[u8], decoded: &str) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => decoded.to_string(),
    }
}

/// Count entries, directories and backslash paths.
pub fn inspect(raw: &[u8]) -> AutobuildResult<ArchiveSummary> {
    let mut archive =
        ZipArchive::new(Cursor::new(raw)).map_err(|e| archive_error("Failed to read ZIP", e))?;

    let mut summary = ArchiveSummary {
        entries: archive.len(),
        ..Default::default()
    };

    for index in 0..archive.len() {
        let file = archive
            .by_index_raw(index)
            .map_err(|e| archive_error("Failed to read ZIP entry", e))?;
        let name = entry_name(file.name_raw(), file.name());

        if file.is_dir() || is_directory_name(&name) {
            summary.directories += 1;
            continue;
        }
        if name.contains('\\') {
            summary.backslash_paths += 1;
        }
        summary.uncompressed_bytes += file.size();
    }

    Ok(summary)
}

/// Parse `raw` into file entries with normalized paths.
///
/// Directory records are dropped; directories are implied by file paths.
/// When two entries normalize to the same path (`a\b` and `a/b`), the later
/// one wins: the entry keeps the position of the first occurrence and the
/// content of the last. No further deduplication is attempted.
pub fn read_entries(raw: &[u8]) -> AutobuildResult<Vec<ArchiveEntry>> {
    let mut archive =
        ZipArchive::new(Cursor::new(raw)).map_err(|e| archive_error("Failed to read ZIP", e))?;

    let mut entries: Vec<ArchiveEntry> = Vec::with_capacity(archive.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| archive_error("Failed to read ZIP entry", e))?;

        let name = entry_name(file.name_raw(), file.name());
        if file.is_dir() || is_directory_name(&name) {
            continue;
        }

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| archive_error(&format!("Failed to extract '{}'", name), e))?;

        let path = normalize_path(&name);
        match positions.get(&path) {
            Some(&position) => {
                log::debug!("[archive] Duplicate path '{}' after normalization, keeping last", path);
                entries[position].content = content;
            }
            None => {
                positions.insert(path.clone(), entries.len());
                entries.push(ArchiveEntry { path, content });
            }
        }
    }

    Ok(entries)
}

/// Write entries into a new ZIP with deterministic settings.
///
/// DEFLATE at [`COMPRESSION_LEVEL`] and a fixed 1980-01-01 timestamp, entries
/// in the given order, so identical input gives identical bytes.
pub fn write_entries(entries: &[ArchiveEntry]) -> AutobuildResult<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        writer
            .start_file(entry.path.as_str(), options)
            .map_err(|e| archive_error(&format!("Failed to add '{}'", entry.path), e))?;
        writer
            .write_all(&entry.content)
            .map_err(|e| archive_error(&format!("Failed to write '{}'", entry.path), e))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| archive_error("Failed to finalize ZIP", e))?;

    Ok(cursor.into_inner())
}

/// Rebuild `raw` with forward-slash paths and no directory records.
///
/// Either returns a complete new archive or an `ArchiveFormat` error; no
/// partially rewritten bytes are ever produced. Callers that treat the fix as
/// optional should keep the original bytes on error.
pub fn normalize(raw: &[u8]) -> AutobuildResult<Vec<u8>> {
    let entries = read_entries(raw)?;
    write_entries(&entries)
}
