//! Configuration of the dynamic module engine.
//!
//! Settings can be built in code through the `with_*` methods or loaded from a
//! YAML, TOML or JSON file. File contents go through `${VAR}` / `$VAR`
//! substitution first, and `PLEXUS_*` environment variables override file
//! values (`PLEXUS_UNLOAD_TIMEOUT_MS=100`).
//!
//! ```rust,ignore
//! use plexus_dynamic::config::DynamicModulesConfig;
//!
//! let config = DynamicModulesConfig::from_file("plexus.toml")?;
//! assert!(config.allow_unload);
//! ```

use config::{Config as Cfg, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "PLEXUS";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, Report<ConfigError>>;

/// 扩展点白名单条目
/// Lets extensions of `module` to points starting with `point_prefix` pass even
/// when no declaration of the point can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub point_prefix: String,
    pub module: String,
}

impl AllowListEntry {
    pub fn new(point_prefix: &str, module: &str) -> Self {
        Self {
            point_prefix: point_prefix.to_string(),
            module: module.to_string(),
        }
    }

    pub fn matches(&self, point: &str, module: &str) -> bool {
        self.module == module && point.starts_with(&self.point_prefix)
    }
}

/// 动态模块配置
/// Dynamic module engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicModulesConfig {
    /// When disabled, only modules that can be handled synchronously are loaded or unloaded.
    pub allow_unload: bool,
    /// How long to wait for an unloaded execution unit to be collected.
    pub unload_timeout_ms: u64,
    /// Weak handle polling interval while waiting.
    pub poll_interval_ms: u64,
    /// Capture a heap snapshot when an unit is not collected in time.
    pub snapshot_on_unload_fail: bool,
    /// Search captured snapshots for strong reference paths.
    pub analyze_snapshot: bool,
    pub deep_search_timeout_ms: u64,
    /// Directory for heap snapshots. Defaults to the system temp directory.
    pub snapshot_dir: Option<PathBuf>,
    /// Points whose contributions may be handled without the full unload protocol.
    pub synchronous_extension_points: Vec<String>,
    pub extension_allow_list: Vec<AllowListEntry>,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for DynamicModulesConfig {
    fn default() -> Self {
        Self {
            allow_unload: true,
            unload_timeout_ms: 5000,
            poll_interval_ms: 50,
            snapshot_on_unload_fail: false,
            analyze_snapshot: true,
            deep_search_timeout_ms: 10_000,
            snapshot_dir: None,
            synchronous_extension_points: Vec::new(),
            extension_allow_list: Vec::new(),
            event_capacity: 256,
        }
    }
}

impl DynamicModulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_unload(mut self, allow: bool) -> Self {
        self.allow_unload = allow;
        self
    }

    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_snapshot_on_unload_fail(mut self, enabled: bool) -> Self {
        self.snapshot_on_unload_fail = enabled;
        self
    }

    pub fn with_analyze_snapshot(mut self, enabled: bool) -> Self {
        self.analyze_snapshot = enabled;
        self
    }

    pub fn with_deep_search_timeout(mut self, timeout: Duration) -> Self {
        self.deep_search_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn with_synchronous_extension_point(mut self, point: &str) -> Self {
        self.synchronous_extension_points.push(point.to_string());
        self
    }

    pub fn with_allow_list_entry(mut self, entry: AllowListEntry) -> Self {
        self.extension_allow_list.push(entry);
        self
    }

    pub fn unload_timeout(&self) -> Duration {
        Duration::from_millis(self.unload_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn deep_search_timeout(&self) -> Duration {
        Duration::from_millis(self.deep_search_timeout_ms)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn is_allow_listed(&self, point: &str, module: &str) -> bool {
        self.extension_allow_list.iter().any(|e| e.matches(point, module))
    }

    /// Load from a file, applying `PLEXUS_*` environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_file_with_env(path, ENV_PREFIX)
    }

    /// Load from a file, applying environment overrides with a custom prefix.
    pub fn from_file_with_env(path: impl AsRef<Path>, env_prefix: &str) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .map_err(Report::new)
            .attach(format!("reading {}", path.display()))?;

        let substituted = substitute_env_vars(&content);
        let config = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Report::new(ConfigError::Parse(e.to_string())))
            .attach(format!("parsing {}", path.display()))?;

        config
            .try_deserialize()
            .map_err(|e| Report::new(ConfigError::Serialization(e.to_string())))
    }

    /// Parse from a string in the given format. No environment overrides.
    pub fn from_str(content: &str, format: FileFormat) -> ConfigResult<Self> {
        let substituted = substitute_env_vars(content);
        let config = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .build()
            .map_err(|e| Report::new(ConfigError::Parse(e.to_string())))?;

        config
            .try_deserialize()
            .map_err(|e| Report::new(ConfigError::Serialization(e.to_string())))
    }
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| Report::new(ConfigError::UnsupportedFormat("No file extension found".to_string())))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(Report::new(ConfigError::UnsupportedFormat(ext.to_string()))),
    }
}

/// Milliseconds of `duration`, saturating at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));
static SIMPLE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid regex"));

/// Substitute `${VAR}` and `$VAR` references with environment values.
///
/// Unknown variables are left untouched.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    SIMPLE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = DynamicModulesConfig::default();
        assert!(config.allow_unload);
        assert_eq!(config.unload_timeout(), Duration::from_secs(5));
        assert!(!config.snapshot_on_unload_fail);
        assert!(config.extension_allow_list.is_empty());
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let config = DynamicModulesConfig::default()
            .with_unload_timeout(Duration::MAX)
            .with_deep_search_timeout(Duration::from_millis(1500));
        assert_eq!(config.unload_timeout_ms, u64::MAX);
        assert_eq!(config.deep_search_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("plexus.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("plexus.yml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("plexus.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(detect_format(Path::new("plexus.json")).unwrap(), FileFormat::Json);
        assert!(detect_format(Path::new("plexus.txt")).is_err());
        assert!(detect_format(Path::new("plexus")).is_err());
    }

    #[test]
    fn test_from_toml_file_with_allow_list() {
        let file = write_config(
            ".toml",
            r#"
allow_unload = false
unload_timeout_ms = 250
synchronous_extension_points = ["ui.theme"]

[[extension_allow_list]]
point_prefix = "compiler."
module = "lang.support"
"#,
        );

        let config = DynamicModulesConfig::from_file_with_env(file.path(), "PLEXUS_TEST_TOML").unwrap();
        assert!(!config.allow_unload);
        assert_eq!(config.unload_timeout(), Duration::from_millis(250));
        assert_eq!(config.synchronous_extension_points, vec!["ui.theme".to_string()]);
        assert!(config.is_allow_listed("compiler.passes", "lang.support"));
        assert!(!config.is_allow_listed("compiler.passes", "other"));
        // untouched fields keep defaults
        assert!(config.analyze_snapshot);
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
snapshot_on_unload_fail: true
deep_search_timeout_ms: 1000
"#;
        let config = DynamicModulesConfig::from_str(yaml, FileFormat::Yaml).unwrap();
        assert!(config.snapshot_on_unload_fail);
        assert_eq!(config.deep_search_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_substitution_in_file() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("PLEXUS_TEST_SNAPSHOT_DIR", "/var/tmp/plexus") };
        let file = write_config(".json", r#"{ "snapshot_dir": "${PLEXUS_TEST_SNAPSHOT_DIR}" }"#);

        let config = DynamicModulesConfig::from_file_with_env(file.path(), "PLEXUS_TEST_JSON").unwrap();
        assert_eq!(config.snapshot_dir(), PathBuf::from("/var/tmp/plexus"));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: the prefix is unique to this test.
        unsafe { std::env::set_var("PLEXUS_TEST_OVERRIDE_UNLOAD_TIMEOUT_MS", "42") };
        let file = write_config(".toml", "unload_timeout_ms = 1000\n");

        let config = DynamicModulesConfig::from_file_with_env(file.path(), "PLEXUS_TEST_OVERRIDE").unwrap();
        assert_eq!(config.unload_timeout_ms, 42);
    }

    #[test]
    fn test_unknown_variable_is_left_alone() {
        let result = substitute_env_vars("dir: ${PLEXUS_TEST_SURELY_UNSET_VARIABLE}");
        assert_eq!(result, "dir: ${PLEXUS_TEST_SURELY_UNSET_VARIABLE}");
    }
}
