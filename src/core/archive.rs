//! Zip archive assembly from resolved file sets.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::files::FileSet;

/// Destination, level and the file sets merged into one archive.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    pub path: PathBuf,
    pub level: u32,
    pub file_sets: Vec<FileSet>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub path: String,
    pub entries: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Build `FileOptions` from a compression level (0 = store, 1-9 = deflate).
fn file_options(level: u32) -> FileOptions {
    if level == 0 {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level as i32))
    }
}

pub fn write(spec: &ArchiveSpec) -> Result<ArchiveSummary> {
    compress(&spec.path, &spec.file_sets, spec.level)
}

/// Write one archive holding every entry of `file_sets`.
///
/// Entries keep their destination path. When two sets produce the same
/// destination the later set wins.
pub fn compress(archive_path: &Path, file_sets: &[FileSet], level: u32) -> Result<ArchiveSummary> {
    if level > 9 {
        return Err(Error::validation_invalid_argument(
            "level",
            format!("Compression level must be 0-9, got {}", level),
            None,
            None,
        ));
    }

    let archive = archive_path.display().to_string();
    let merged = FileSet::merge(file_sets);

    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            Error::archive_write(&archive, parent.display().to_string(), e.to_string())
        })?;
    }

    let file = File::create(archive_path)
        .map_err(|e| Error::archive_write(&archive, &archive, e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let options = file_options(level);

    for entry in &merged.entries {
        let name = entry.destination.replace('\\', "/");
        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::archive_write(&archive, &name, e.to_string()))?;

        let mut source = File::open(&entry.source).map_err(|e| {
            Error::archive_write(&archive, entry.source.display().to_string(), e.to_string())
        })?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| Error::archive_write(&archive, &name, e.to_string()))?;
    }

    zip.finish()
        .map_err(|e| Error::archive_write(&archive, &archive, e.to_string()))?;

    let (bytes, sha256) = digest(archive_path)
        .map_err(|e| Error::archive_write(&archive, &archive, e.to_string()))?;

    log_status!(
        "compress",
        "Wrote {} ({} entries, {} bytes)",
        archive,
        merged.len(),
        bytes
    );

    Ok(ArchiveSummary {
        path: archive,
        entries: merged.len(),
        bytes,
        sha256,
    })
}

fn digest(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        hasher.update(&buf[..n]);
    }
    let hex = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();
    Ok((total, hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileEntry;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entry(source: PathBuf, destination: &str) -> FileEntry {
        FileEntry {
            source,
            destination: destination.to_string(),
            relative: destination.to_string(),
        }
    }

    fn read_entry(archive: &Path, name: &str) -> String {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn later_file_set_wins_on_collision() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.dll");
        let new = dir.path().join("new.dll");
        fs::write(&old, "old build").unwrap();
        fs::write(&new, "new build").unwrap();

        let first = FileSet {
            entries: vec![entry(old, "Server/lib.dll")],
        };
        let second = FileSet {
            entries: vec![entry(new, "Server/lib.dll")],
        };

        let out = dir.path().join("out").join("bundle.zip");
        let summary = compress(&out, &[first, second], 9).unwrap();

        assert_eq!(summary.entries, 1);
        assert_eq!(summary.sha256.len(), 64);
        let zip = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        assert_eq!(read_entry(&out, "Server/lib.dll"), "new build");
    }

    #[test]
    fn store_level_preserves_nested_paths() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.js");
        fs::write(&src, "console.log(1)").unwrap();

        let set = FileSet {
            entries: vec![entry(src, "Scripts/Adapters/a.js")],
        };
        let out = dir.path().join("stored.zip");
        compress(&out, &[set], 0).unwrap();

        let mut zip = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let file = zip.by_name("Scripts/Adapters/a.js").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn rejects_level_above_nine() {
        let dir = TempDir::new().unwrap();
        let err = compress(&dir.path().join("x.zip"), &[], 10).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn missing_source_reports_offending_path() {
        let dir = TempDir::new().unwrap();
        let set = FileSet {
            entries: vec![entry(dir.path().join("gone.dll"), "Server/gone.dll")],
        };
        let err = compress(&dir.path().join("x.zip"), &[set], 6).unwrap_err();
        assert_eq!(err.code.as_str(), "archive.write_failed");
        assert!(err.details["path"].as_str().unwrap().ends_with("gone.dll"));
    }
}
