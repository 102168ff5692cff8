use crate::config::error::{ConfigError, Result};
use crate::coverage::CoverageMode;
use crate::types::StorageLocation;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Where increments, living docs and features live
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Metadata audit trail settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// AC completion policy
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Which projections a sync pass maintains
    #[serde(default)]
    pub sync: SyncOptions,

    /// Duplicate resolver defaults
    #[serde(default)]
    pub duplicates: DuplicatesConfig,
}

/// Directory layout, relative to the project root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_increments_dir")]
    pub increments_dir: PathBuf,

    /// Archived increments, relative to `increments_dir`
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Abandoned increments, relative to `increments_dir`
    #[serde(default = "default_abandoned_dir")]
    pub abandoned_dir: PathBuf,

    /// Root of the living-docs user story tree
    #[serde(default = "default_living_docs_dir")]
    pub living_docs_dir: PathBuf,

    /// Active feature folders (`FS-NNN`)
    #[serde(default = "default_features_dir")]
    pub features_dir: PathBuf,

    /// Archived feature folders
    #[serde(default = "default_features_archive_dir")]
    pub features_archive_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Records kept in `acSyncEvents`, newest first
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoverageConfig {
    #[serde(default)]
    pub mode: CoverageMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Regenerate living-docs user story files
    #[serde(default = "default_true")]
    pub living_docs: bool,

    /// Inject `**User Story**:` links into tasks.md
    #[serde(default = "default_true")]
    pub reverse_links: bool,

    /// Labels attached to mirrored tracker issues
    #[serde(default = "default_tracker_labels")]
    pub tracker_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DuplicatesConfig {
    /// Copy loser content into the winner before deleting
    #[serde(default)]
    pub merge: bool,

    /// Report only, touch nothing
    #[serde(default)]
    pub dry_run: bool,
}

// Default value functions
fn default_increments_dir() -> PathBuf {
    PathBuf::from("increments")
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("_archive")
}
fn default_abandoned_dir() -> PathBuf {
    PathBuf::from("_abandoned")
}
fn default_living_docs_dir() -> PathBuf {
    PathBuf::from("docs/internal/specs")
}
fn default_features_dir() -> PathBuf {
    PathBuf::from("docs/internal/specs")
}
fn default_features_archive_dir() -> PathBuf {
    PathBuf::from("docs/_archive/specs")
}
fn default_audit_limit() -> usize {
    20
}
fn default_true() -> bool {
    true
}
fn default_tracker_labels() -> Vec<String> {
    vec!["spec-sync".to_string()]
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            increments_dir: default_increments_dir(),
            archive_dir: default_archive_dir(),
            abandoned_dir: default_abandoned_dir(),
            living_docs_dir: default_living_docs_dir(),
            features_dir: default_features_dir(),
            features_archive_dir: default_features_archive_dir(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            limit: default_audit_limit(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            living_docs: default_true(),
            reverse_links: default_true(),
            tracker_labels: default_tracker_labels(),
        }
    }
}

/// Layout resolved against a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub increments: PathBuf,
    pub archived: PathBuf,
    pub abandoned: PathBuf,
    pub living_docs: PathBuf,
    pub features: PathBuf,
    pub features_archive: PathBuf,
}

impl ProjectPaths {
    /// Storage root holding increments of the given location.
    pub fn location_root(&self, location: StorageLocation) -> &Path {
        match location {
            StorageLocation::Primary => &self.increments,
            StorageLocation::Archived => &self.archived,
            StorageLocation::Abandoned => &self.abandoned,
        }
    }

    /// Folder of an active increment.
    pub fn increment_dir(&self, increment_id: &str) -> PathBuf {
        self.increments.join(increment_id)
    }
}

impl LayoutConfig {
    pub fn resolve(&self, root: &Path) -> ProjectPaths {
        let increments = root.join(&self.increments_dir);
        ProjectPaths {
            root: root.to_path_buf(),
            archived: increments.join(&self.archive_dir),
            abandoned: increments.join(&self.abandoned_dir),
            increments,
            living_docs: root.join(&self.living_docs_dir),
            features: root.join(&self.features_dir),
            features_archive: root.join(&self.features_archive_dir),
        }
    }
}

impl SyncConfig {
    /// Semantic checks the schema cannot express.
    pub fn check(&self) -> Result<()> {
        let layout = &self.layout;
        for (name, path) in [
            ("layout.increments_dir", &layout.increments_dir),
            ("layout.archive_dir", &layout.archive_dir),
            ("layout.abandoned_dir", &layout.abandoned_dir),
            ("layout.living_docs_dir", &layout.living_docs_dir),
            ("layout.features_dir", &layout.features_dir),
            ("layout.features_archive_dir", &layout.features_archive_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(format!("{name} must not be empty")));
            }
        }
        if layout.archive_dir == layout.abandoned_dir {
            return Err(ConfigError::ValidationError(
                "layout.archive_dir and layout.abandoned_dir must differ".to_string(),
            ));
        }
        if self.audit.limit == 0 {
            return Err(ConfigError::ValidationError(
                "audit.limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (SPECSYNC_ prefix)
    pub fn load(&self) -> Result<SyncConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults
        let defaults_json = serde_json::to_string(&SyncConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // Layer 2: Config file (if provided)
        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // Layer 3: Environment variables, e.g. SPECSYNC_AUDIT__LIMIT=5
        builder = builder.add_source(
            Environment::with_prefix("SPECSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("sync.tracker_labels"),
        );

        let config = builder.build()?;
        let sync_config: SyncConfig = config.try_deserialize()?;

        let validator = crate::config::validator::SchemaValidator::new()?;
        validator.validate(&sync_config)?;
        sync_config.check()?;

        Ok(sync_config)
    }

    /// Locate the default config file in standard locations:
    /// 1. Current directory: ./specsync.toml
    /// 2. XDG config: ~/.config/specsync/config.toml
    /// 3. Home directory: ~/.specsync.toml
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./specsync.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("specsync").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".specsync.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<SyncConfig> {
        let loader = if let Some(config_path) = Self::find_config_file() {
            ConfigLoader::new().with_file(config_path)
        } else {
            ConfigLoader::new()
        };

        loader.load()
    }

    /// Write the default configuration as a TOML template.
    pub fn write_template(path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(&SyncConfig::default())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("# spec-sync configuration\n\n{body}"))?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.audit.limit, 20);
        assert_eq!(config.coverage.mode, CoverageMode::AllComplete);
        assert!(config.sync.living_docs);
        assert!(config.sync.reverse_links);
        assert!(!config.duplicates.merge);
        assert!(!config.duplicates.dry_run);
        assert_eq!(config.layout.increments_dir, PathBuf::from("increments"));
    }

    #[test]
    fn test_resolve_layout() {
        let paths = LayoutConfig::default().resolve(Path::new("/proj"));
        assert_eq!(paths.increments, PathBuf::from("/proj/increments"));
        assert_eq!(paths.archived, PathBuf::from("/proj/increments/_archive"));
        assert_eq!(
            paths.location_root(StorageLocation::Abandoned),
            Path::new("/proj/increments/_abandoned")
        );
        assert_eq!(paths.features_archive, PathBuf::from("/proj/docs/_archive/specs"));
    }

    #[test]
    #[serial]
    fn test_load_with_defaults_only() {
        let config = ConfigLoader::new()
            .load()
            .expect("Failed to load default config");
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_with_env_override() {
        unsafe {
            env::set_var("SPECSYNC_AUDIT__LIMIT", "5");
            env::set_var("SPECSYNC_DUPLICATES__DRY_RUN", "true");
        }

        let config = ConfigLoader::new().load().expect("Failed to load config");

        unsafe {
            env::remove_var("SPECSYNC_AUDIT__LIMIT");
            env::remove_var("SPECSYNC_DUPLICATES__DRY_RUN");
        }

        assert_eq!(config.audit.limit, 5);
        assert!(config.duplicates.dry_run);
    }

    #[test]
    #[serial]
    fn test_load_with_toml_file_and_env_precedence() {
        let toml_content = r#"
[layout]
increments_dir = ".specweave/increments"

[coverage]
mode = "any_complete"

[sync]
reverse_links = false
"#;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("specsync.toml");
        std::fs::write(&config_path, toml_content).expect("Failed to write temp file");

        unsafe {
            env::set_var("SPECSYNC_SYNC__REVERSE_LINKS", "true");
        }
        let config = ConfigLoader::new()
            .with_file(&config_path)
            .load()
            .expect("Failed to load config");
        unsafe {
            env::remove_var("SPECSYNC_SYNC__REVERSE_LINKS");
        }

        assert_eq!(
            config.layout.increments_dir,
            PathBuf::from(".specweave/increments")
        );
        assert_eq!(config.coverage.mode, CoverageMode::AnyComplete);
        assert!(config.sync.reverse_links);
        assert!(config.sync.living_docs);
    }

    #[test]
    #[serial]
    fn test_zero_audit_limit_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("specsync.toml");
        std::fs::write(&config_path, "[audit]\nlimit = 0\n").expect("Failed to write");

        let err = ConfigLoader::new()
            .with_file(&config_path)
            .load()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::SchemaValidationError(_)),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_missing_file_error() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/specsync.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_semantic_check_rejects_same_archive_dirs() {
        let mut config = SyncConfig::default();
        config.layout.abandoned_dir = config.layout.archive_dir.clone();
        assert!(matches!(
            config.check(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_write_template_round_trips() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("conf/specsync.toml");
        ConfigLoader::write_template(&path).expect("write template");

        let config = ConfigLoader::new().with_file(&path).load().expect("load");
        assert_eq!(config, SyncConfig::default());
    }
}
