use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::{io, parser};

/// File written into the staging directory alongside the packaged files.
pub const VERSION_FILE_NAME: &str = "version.txt";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub file: String,
    pub pattern: String,
}

/// Parse version from content using regex pattern.
/// Pattern must contain a capture group for the version string.
pub fn parse_version(content: &str, pattern: &str) -> Result<Option<String>> {
    let re = parser::compile(pattern, "versionPattern")?;
    Ok(parser::extract_first(content, &re))
}

/// Read the version artifact and return the first capture of `pattern`.
///
/// A missing file or a file without a match are both `version.not_found`.
pub fn resolve_version(path: &Path, pattern: &str) -> Result<VersionInfo> {
    let file = path.display().to_string();

    if !path.is_file() {
        return Err(Error::version_not_found(&file, pattern)
            .with_hint(format!("Check that {} exists", file)));
    }

    let content = io::read_file(path, "read version file")?;
    let version = parse_version(&content, pattern)?
        .ok_or_else(|| Error::version_not_found(&file, pattern))?;

    log_status!("version", "Resolved {} from {}", version, file);

    Ok(VersionInfo {
        version,
        file,
        pattern: pattern.to_string(),
    })
}

/// Write `version.txt` (`Version: <version>`) into `dir`.
pub fn write_version_file(dir: &Path, version: &str) -> Result<String> {
    let path = dir.join(VERSION_FILE_NAME);
    io::write_file(&path, &format!("Version: {}", version), "write version file")?;
    Ok(path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_version_pattern;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn returns_first_capture_group() {
        let content = r#"
            var breeze = {
                version: "1.7.2",
                metadataVersion: "1.0.5"
            };
        "#;
        let version = parse_version(content, &default_version_pattern()).unwrap();
        assert_eq!(version.as_deref(), Some("1.7.2"));
    }

    #[test]
    fn accepts_two_part_versions() {
        let version = parse_version(r#"version:"2.0""#, &default_version_pattern()).unwrap();
        assert_eq!(version.as_deref(), Some("2.0"));
    }

    #[test]
    fn first_match_wins() {
        let content = "version: \"1.0.0\"\nversion: \"9.9.9\"";
        let version = parse_version(content, &default_version_pattern()).unwrap();
        assert_eq!(version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn missing_token_is_version_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("_head.jsfrag");
        fs::write(&path, "var breeze = { name: 'x' };").unwrap();

        let err = resolve_version(&path, &default_version_pattern()).unwrap_err();
        assert_eq!(err.code.as_str(), "version.not_found");
    }

    #[test]
    fn missing_file_is_version_not_found() {
        let dir = TempDir::new().unwrap();
        let err = resolve_version(&dir.path().join("nope"), &default_version_pattern())
            .unwrap_err();
        assert_eq!(err.code.as_str(), "version.not_found");
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn writes_version_txt() {
        let dir = TempDir::new().unwrap();
        let path = write_version_file(dir.path(), "1.7.2").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "Version: 1.7.2");
    }
}
