use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    PipelineNotFound,
    VersionNotFound,

    ProcessToolFailed,

    FilesResolutionFailed,
    ArchiveWriteFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::PipelineNotFound => "pipeline.not_found",
            ErrorCode::VersionNotFound => "version.not_found",

            ErrorCode::ProcessToolFailed => "process.tool_failed",

            ErrorCode::FilesResolutionFailed => "files.resolution_failed",
            ErrorCode::ArchiveWriteFailed => "archive.write_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNotFoundDetails {
    pub name: String,
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionNotFoundDetails {
    pub path: String,
    pub pattern: String,
}

/// Captured context of an external tool that exited unsuccessfully.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailureDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    pub exit_code: i32,
    pub stderr_tail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSetResolutionDetails {
    pub base_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveWriteDetails {
    pub archive: String,
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn pipeline_not_found(name: impl Into<String>, available: Vec<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::PipelineNotFound,
            format!("Unknown pipeline or task '{}'", name),
            to_details(PipelineNotFoundDetails { name, available }),
        )
        .with_hint("Run 'shipyard plan <pipeline>' to inspect registered steps")
    }

    /// The version artifact exists but carries no version token.
    pub fn version_not_found(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::VersionNotFound,
            format!("Version number not found in {}", path),
            to_details(VersionNotFoundDetails {
                path,
                pattern: pattern.into(),
            }),
        )
        .with_hint("Check the versionFile and versionPattern settings in shipyard.json")
    }

    pub fn tool_failed(details: ToolFailureDetails) -> Self {
        let message = format!(
            "Command failed with exit code {}: {}",
            details.exit_code, details.command
        );
        let mut err = Self::new(ErrorCode::ProcessToolFailed, message, to_details(details));
        err.retryable = Some(false);
        err
    }

    pub fn file_set_resolution(
        base_dir: impl Into<String>,
        pattern: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::FilesResolutionFailed,
            "Failed to resolve file set",
            to_details(FileSetResolutionDetails {
                base_dir: base_dir.into(),
                pattern,
                error: error.into(),
            }),
        )
    }

    pub fn archive_write(
        archive: impl Into<String>,
        path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ArchiveWriteFailed,
            format!("Failed to write archive entry {}", path),
            to_details(ArchiveWriteDetails {
                archive: archive.into(),
                path,
                error: error.into(),
            }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_carries_command_and_stderr() {
        let err = Error::tool_failed(ToolFailureDetails {
            task: Some("build-rebuild-3".to_string()),
            command: "msbuild \"App.sln\" /t:Rebuild".to_string(),
            working_dir: Some("/src/App".to_string()),
            exit_code: 1,
            stderr_tail: "error CS0246".to_string(),
        });

        assert_eq!(err.code.as_str(), "process.tool_failed");
        assert_eq!(err.retryable, Some(false));
        assert!(err.message.contains("exit code 1"));
        assert_eq!(err.details["stderrTail"], "error CS0246");
        assert_eq!(err.details["exitCode"], 1);
        assert_eq!(err.details["task"], "build-rebuild-3");
    }

    #[test]
    fn version_not_found_has_hint() {
        let err = Error::version_not_found("Client/_head.jsfrag", r"version:\s*");
        assert_eq!(err.code, ErrorCode::VersionNotFound);
        assert_eq!(err.details["path"], "Client/_head.jsfrag");
        assert_eq!(err.hints.len(), 1);
    }

    #[test]
    fn archive_write_names_offending_path() {
        let err = Error::archive_write("out.zip", "Server/lib.dll", "disk full");
        assert!(err.message.contains("Server/lib.dll"));
        assert_eq!(err.details["archive"], "out.zip");
    }
}
