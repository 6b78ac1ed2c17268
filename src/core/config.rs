use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::files::RenameRule;
use crate::utils::parser;

/// File name looked up in the root directory when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "shipyard.json";

/// Root configuration structure for shipyard.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfig {
    #[serde(default = "default_product")]
    pub product: String,

    #[serde(default = "default_version_file")]
    pub version_file: String,

    #[serde(default = "default_version_pattern")]
    pub version_pattern: String,

    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_samples_dir")]
    pub samples_dir: String,

    #[serde(default = "default_samples")]
    pub samples: Vec<SampleConfig>,

    #[serde(default = "default_source_solutions")]
    pub source_solutions: Vec<String>,

    #[serde(default = "default_build")]
    pub build: BuildConfig,

    #[serde(default = "default_dependencies")]
    pub dependencies: DependencyConfig,

    #[serde(default = "default_clean")]
    pub clean: CleanConfig,

    #[serde(default = "default_stage")]
    pub stage: Vec<CopyGroup>,

    #[serde(default = "default_archives")]
    pub archives: Vec<ArchiveConfig>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            version_file: default_version_file(),
            version_pattern: default_version_pattern(),
            staging_dir: default_staging_dir(),
            output_dir: default_output_dir(),
            samples_dir: default_samples_dir(),
            samples: default_samples(),
            source_solutions: default_source_solutions(),
            build: default_build(),
            dependencies: default_dependencies(),
            clean: default_clean(),
            stage: default_stage(),
            archives: default_archives(),
        }
    }
}

/// A sample solution shipped inside the "plus" archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleConfig {
    pub name: String,
    /// Globs (relative to the sample directory) left out of the staged copy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Compiler toolchain invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub tool: String,
    #[serde(default)]
    pub options: String,
    #[serde(default = "default_build_command")]
    pub command: String,
}

/// Dependency manager invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConfig {
    pub tool: String,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
    #[serde(default = "default_packages_dir_name")]
    pub packages_dir_name: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default = "default_install_command")]
    pub install_command: String,
    #[serde(default = "default_update_command")]
    pub update_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanConfig {
    /// Globs relative to the root, removed by `clean:sample-packages`.
    #[serde(default)]
    pub sample_packages: Vec<String>,
    /// Names removed beneath every sample directory by `clean:samples`.
    #[serde(default)]
    pub sample_transient: Vec<String>,
}

/// One group of files copied into the staging directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyGroup {
    /// Directory (relative to the root) the `src` globs are evaluated against.
    pub cwd: String,
    pub src: Vec<String>,
    /// Prefix (relative to the staging directory) prepended to every match.
    #[serde(default)]
    pub dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<RenameRule>,
    #[serde(default)]
    pub dot: bool,
}

/// One archive assembled from the staging directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveConfig {
    /// Short identifier used by `shipyard files --archive <id>`.
    pub id: String,
    /// File name template; `{{product}}` and `{{version}}` are substituted.
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u32,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub dot: bool,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_product() -> String {
    "breeze".to_string()
}

fn default_version_file() -> String {
    "Breeze.Client/Scripts/IBlade/_head.jsfrag".to_string()
}

pub fn default_version_pattern() -> String {
    r#"version:\s*"(\d+\.\d+\.?\d*)""#.to_string()
}

fn default_staging_dir() -> String {
    "_temp2".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_samples_dir() -> String {
    "Samples".to_string()
}

fn sample(name: &str, exclude: &[&str]) -> SampleConfig {
    SampleConfig {
        name: name.to_string(),
        exclude: exclude.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_samples() -> Vec<SampleConfig> {
    vec![
        sample("DocCode", &["**/Todos.sdf"]),
        sample("ToDo", &["**/*.sdf"]),
        sample("ToDo-Angular", &["**/*.sdf"]),
        sample("ToDo-AngularWithDI", &["**/*.sdf"]),
        sample("ToDo-Require", &["**/*.sdf"]),
        sample("NoDb", &[]),
        sample("CarBones", &["**/*.mdf", "**/*.ldf"]),
        sample("Edmunds", &[]),
        sample("TempHire", &[]),
    ]
}

fn default_source_solutions() -> Vec<String> {
    vec!["Breeze-Build.sln".to_string()]
}

fn default_build() -> BuildConfig {
    BuildConfig {
        tool: "C:/Windows/Microsoft.NET/Framework/v4.0.30319/MSBuild.exe".to_string(),
        options: "/p:Configuration=Release /verbosity:minimal".to_string(),
        command: default_build_command(),
    }
}

fn default_build_command() -> String {
    "{{tool}} \"{{solution}}\" {{options}} /t:{{buildTarget}}".to_string()
}

fn default_dependencies() -> DependencyConfig {
    DependencyConfig {
        tool: "nuget".to_string(),
        manifest_name: default_manifest_name(),
        packages_dir_name: default_packages_dir_name(),
        packages: [
            "Breeze.WebApi",
            "Breeze.WebApi2.EF6",
            "Breeze.Client",
            "Breeze.Server.WebApi2",
            "Breeze.Server.ContextProvider.EF6",
            "Breeze.Server.ContextProvider",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        install_command: default_install_command(),
        update_command: default_update_command(),
    }
}

fn default_manifest_name() -> String {
    "packages.config".to_string()
}

fn default_packages_dir_name() -> String {
    "packages".to_string()
}

fn default_install_command() -> String {
    "{{tool}} install {{manifest}} -OutputDirectory {{packagesDir}}".to_string()
}

fn default_update_command() -> String {
    "{{tool}} update {{solutionFile}} -Id {{package}}".to_string()
}

fn default_clean() -> CleanConfig {
    CleanConfig {
        sample_packages: vec!["Samples/**/packages".to_string()],
        sample_transient: ["bin", "obj", "packages", "*_Resharper*", "*.suo"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn copy(cwd: &str, src: &[&str], dest: &str) -> CopyGroup {
    CopyGroup {
        cwd: cwd.to_string(),
        src: src.iter().map(|s| s.to_string()).collect(),
        dest: dest.to_string(),
        rename: None,
        dot: false,
    }
}

fn default_stage() -> Vec<CopyGroup> {
    let mut adapters = copy(
        "Breeze.Client/Scripts/IBlade",
        &["b??_breeze.**js"],
        "Scripts/Adapters",
    );
    adapters.rename = Some(RenameRule::Stem {
        stem: "breeze".to_string(),
    });

    vec![
        copy("Breeze.Client", &["Scripts/breeze*.js"], ""),
        adapters,
        copy("Breeze.Client/Scripts/ThirdParty", &["q.**js"], "Scripts"),
        copy("Breeze.Client/Typescript", &["Typescript/breeze.d.ts"], ""),
        copy("Breeze.Client", &["Metadata/*.*"], ""),
        copy("Breeze.WebApi", &["Breeze.WebApi.dll"], "Server"),
        copy("Breeze.WebApi.EF", &["Breeze.WebApi.EF.dll"], "Server"),
        copy("Breeze.WebApi.NH", &["Breeze.WebApi.NH.dll"], "Server"),
        copy("Breeze.WebApi2", &["Breeze.WebApi2.dll"], "Server"),
        copy(
            "Breeze.ContextProvider",
            &["Breeze.ContextProvider.dll"],
            "Server",
        ),
        copy(
            "Breeze.ContextProvider.EF6",
            &["Breeze.ContextProvider.EF6.dll"],
            "Server",
        ),
        copy(".", &["readme.txt"], ""),
    ]
}

fn default_level() -> u32 {
    9
}

fn default_archives() -> Vec<ArchiveConfig> {
    vec![
        ArchiveConfig {
            id: "runtime".to_string(),
            name: "{{product}}-runtime-{{version}}.zip".to_string(),
            level: default_level(),
            patterns: vec!["**/**".to_string(), "!Samples/**/*".to_string()],
            dot: false,
        },
        ArchiveConfig {
            id: "plus".to_string(),
            name: "{{product}}-runtime-plus-{{version}}.zip".to_string(),
            level: default_level(),
            patterns: vec!["**/*".to_string()],
            dot: true,
        },
    ]
}

// =============================================================================
// Loading functions
// =============================================================================

impl ReleaseConfig {
    /// Reject values that would only fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        if self.product.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "product",
                None,
                "Product name cannot be empty",
            ));
        }

        parser::compile(&self.version_pattern, "versionPattern")?;

        for archive in &self.archives {
            if archive.level > 9 {
                return Err(Error::config_invalid_value(
                    format!("archives.{}.level", archive.id),
                    Some(archive.level.to_string()),
                    "Compression level must be between 0 and 9",
                ));
            }
            if archive.patterns.is_empty() {
                return Err(Error::config_invalid_value(
                    format!("archives.{}.patterns", archive.id),
                    None,
                    "Archive needs at least one pattern",
                ));
            }
        }

        let mut ids: Vec<&str> = self.archives.iter().map(|a| a.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::config_invalid_value(
                "archives",
                Some(pair[0].to_string()),
                "Archive ids must be unique",
            ));
        }

        Ok(())
    }

    pub fn archive(&self, id: &str) -> Result<&ArchiveConfig> {
        self.archives.iter().find(|a| a.id == id).ok_or_else(|| {
            Error::validation_invalid_argument(
                "archive",
                format!("Unknown archive '{}'", id),
                Some(id.to_string()),
                Some(self.archives.iter().map(|a| a.id.clone()).collect()),
            )
        })
    }
}

/// Load config from an explicit path, or from `<root>/shipyard.json`.
///
/// A missing default file yields built-in defaults; a missing explicit file is an error.
pub fn load(root: &Path, explicit: Option<&Path>) -> Result<ReleaseConfig> {
    let (path, required) = match explicit {
        Some(p) => (parser::resolve_path(root, &p.to_string_lossy()), true),
        None => (root.join(CONFIG_FILE_NAME), false),
    };

    if !path.exists() {
        if required {
            return Err(Error::internal_io(
                format!("Config file not found: {}", path.display()),
                Some("load config".to_string()),
            ));
        }
        let config = ReleaseConfig::default();
        config.validate()?;
        return Ok(config);
    }

    let config = load_from_file(&path)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file(path: &Path) -> Result<ReleaseConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}
