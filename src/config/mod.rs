#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TaskdeckError;
use crate::i18n::Locale;
use crate::prefs::ThemeMode;
use crate::task::query::{DEFAULT_PAGE_SIZE, SortDirection, SortField, SortParams};

pub const CONFIG_ENV: &str = "TASKDECK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub tasks: TasksConfig,
    pub ui: UiConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Artificial delay for every mock service call.
    pub latency_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/taskdeck".to_owned(),
            latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TasksConfig {
    pub page_size: usize,
    pub default_sort: SortField,
    pub default_direction: SortDirection,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE.get(),
            default_sort: SortField::CreatedAt,
            default_direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub icons: bool,
    pub theme: ThemeMode,
    pub locale: Locale,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            icons: true,
            theme: ThemeMode::Light,
            locale: Locale::En,
        }
    }
}

/// Switches read once at startup.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    /// Language selection.
    pub preferences: bool,
    /// Theme selection.
    pub appearance: bool,
    pub task_search: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            preferences: true,
            appearance: true,
            task_search: true,
        }
    }
}

impl FeatureFlags {
    pub fn require_preferences(&self) -> Result<(), TaskdeckError> {
        require(self.preferences, "preferences")
    }

    pub fn require_appearance(&self) -> Result<(), TaskdeckError> {
        require(self.appearance, "appearance")
    }

    pub fn require_task_search(&self) -> Result<(), TaskdeckError> {
        require(self.task_search, "task_search")
    }
}

fn require(enabled: bool, name: &'static str) -> Result<(), TaskdeckError> {
    if enabled {
        Ok(())
    } else {
        Err(TaskdeckError::FeatureDisabled(name))
    }
}

impl Config {
    #[must_use]
    pub fn page_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.tasks.page_size).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn default_sort(&self) -> SortParams {
        SortParams::new(self.tasks.default_sort, self.tasks.default_direction)
    }

    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.storage.latency_ms)
    }

    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    pub fn validate(&self) -> Result<(), TaskdeckError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(TaskdeckError::Config(
                "storage.data_dir must not be empty".to_owned(),
            ));
        }
        if self.tasks.page_size == 0 {
            return Err(TaskdeckError::Config(
                "tasks.page_size must be >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
}

pub fn default_paths() -> anyhow::Result<ConfigPaths> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Ok(ConfigPaths {
            config_file: PathBuf::from(explicit),
        });
    }

    let unix = home_config_path_unix();
    if !cfg!(windows) {
        return Ok(ConfigPaths { config_file: unix });
    }

    // Windows: prefer the Unix-style path if present for portability.
    if unix.exists() {
        return Ok(ConfigPaths { config_file: unix });
    }

    let proj = ProjectDirs::from("com", "taskdeck", "taskdeck")
        .context("failed to determine platform config directory")?;
    Ok(ConfigPaths {
        config_file: proj.config_dir().join("config.toml"),
    })
}

fn home_config_path_unix() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("taskdeck").join("config.toml")
}

fn home_dir() -> Option<PathBuf> {
    if let Some(v) = std::env::var_os("HOME") {
        return Some(PathBuf::from(v));
    }
    if let Some(v) = std::env::var_os("USERPROFILE") {
        return Some(PathBuf::from(v));
    }
    let drive = std::env::var_os("HOMEDRIVE");
    let path = std::env::var_os("HOMEPATH");
    match (drive, path) {
        (Some(d), Some(p)) => Some(PathBuf::from(d).join(PathBuf::from(p))),
        _ => None,
    }
}

#[must_use]
pub fn expand_tilde(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest).to_string_lossy().to_string();
    }
    input.to_owned()
}

pub fn expand_path(input: &str) -> anyhow::Result<PathBuf> {
    let expanded = expand_env_vars(&expand_tilde(input));
    let p = PathBuf::from(expanded);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(cwd.join(p))
}

fn expand_env_vars(input: &str) -> String {
    // Expand $VAR and ${VAR}. Leave unknown vars untouched.
    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        std::env::var(key).unwrap_or_else(|_| caps[0].to_owned())
    })
    .to_string()
}

pub fn load() -> anyhow::Result<(Config, ConfigPaths)> {
    let paths = default_paths()?;
    let (_doc, cfg) = load_from_file(&paths.config_file)?;
    cfg.validate()?;
    tracing::debug!(path = %paths.config_file.display(), "loaded config");
    Ok((cfg, paths))
}

pub fn list_resolved_toml() -> anyhow::Result<String> {
    let (cfg, _paths) = load()?;
    Ok(toml::to_string_pretty(&cfg)?)
}

pub fn get_value_string(key: &str) -> anyhow::Result<Option<String>> {
    let paths = default_paths()?;
    get_value_string_at_path(&paths.config_file, key)
}

pub fn set_value_string(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = default_paths()?;
    set_value_string_at_path(&paths.config_file, key, value)
}

fn load_from_file(path: &Path) -> anyhow::Result<(toml_edit::DocumentMut, Config)> {
    if !path.exists() {
        return Ok((toml_edit::DocumentMut::new(), Config::default()));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let doc = raw
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("failed to parse TOML in {}", path.display()))?;

    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to deserialize TOML in {}", path.display()))?;
    Ok((doc, cfg))
}

pub fn load_at_path(path: &Path) -> anyhow::Result<Config> {
    let (_doc, cfg) = load_from_file(path)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn get_value_string_at_path(path: &Path, key: &str) -> anyhow::Result<Option<String>> {
    let cfg = load_at_path(path)?;
    let norm = normalize_key(key);
    let value = lookup_value(&cfg, &norm);
    Ok(value.map(format_value_for_stdout))
}

pub fn set_value_string_at_path(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let (mut doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let (norm_key, value_item) = normalize_key_and_parse_value(key, value)?;
    apply_set(&mut doc, &norm_key, value_item)?;

    // Validate by re-parsing the updated doc into a Config.
    let new_raw = doc.to_string();
    let new_cfg: Config = toml::from_str(&new_raw)
        .with_context(|| format!("config update produced invalid TOML for {}", path.display()))?;
    new_cfg.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, new_raw.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(key = %norm_key, "updated config");

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Bool,
    Int,
    String,
    Enum(&'static [&'static str]),
}

fn normalize_key(key: &str) -> String {
    // Remote-config flag names.
    match key {
        "features.enablePreferences" | "enablePreferences" => "features.preferences",
        "features.enableAppearance" | "enableAppearance" => "features.appearance",
        "features.enableTaskSearch" | "enableTaskSearch" => "features.task_search",
        "ui.language" => "ui.locale",
        "tasks.items_per_page" => "tasks.page_size",
        _ => key,
    }
    .to_owned()
}

fn normalize_key_and_parse_value(
    key: &str,
    value: &str,
) -> anyhow::Result<(String, toml_edit::Item)> {
    let norm = normalize_key(key);
    let key_type = key_type(&norm).ok_or_else(|| TaskdeckError::InvalidConfigKey(key.to_owned()))?;
    let invalid = |msg: String| TaskdeckError::InvalidConfigValue {
        key: key.to_owned(),
        msg,
    };
    let item = match key_type {
        KeyType::Bool => toml_edit::value(parse_bool(value).map_err(invalid)?),
        KeyType::Int => toml_edit::value(parse_int(value).map_err(invalid)?),
        KeyType::String => toml_edit::value(value),
        KeyType::Enum(allowed) => {
            let v = value.trim();
            if !allowed.contains(&v) {
                return Err(invalid(format!("must be one of: {}", allowed.join(", "))).into());
            }
            toml_edit::value(v)
        }
    };

    Ok((norm, item))
}

fn key_type(key: &str) -> Option<KeyType> {
    Some(match key {
        "storage.data_dir" => KeyType::String,

        "ui.icons" | "features.preferences" | "features.appearance" | "features.task_search" => {
            KeyType::Bool
        }

        "storage.latency_ms" | "tasks.page_size" => KeyType::Int,

        "tasks.default_sort" => KeyType::Enum(&[
            "id",
            "title",
            "description",
            "completed",
            "created_at",
            "updated_at",
            "user_id",
        ]),
        "tasks.default_direction" => KeyType::Enum(&["asc", "desc"]),
        "ui.theme" => KeyType::Enum(&["light", "dark"]),
        "ui.locale" => KeyType::Enum(&["en", "es"]),

        _ => return None,
    })
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected true|false, got '{other}'")),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    let n = s
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("expected integer, got '{s}': {e}"))?;
    if n < 0 {
        return Err(format!("expected a non-negative integer, got {n}"));
    }
    Ok(n)
}

fn apply_set(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: toml_edit::Item,
) -> anyhow::Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, tables)) = parts.split_last() else {
        return Err(TaskdeckError::InvalidConfigKey(key.to_owned()).into());
    };

    let mut cur = doc.as_table_mut();
    for seg in tables {
        if !cur.contains_key(seg) {
            let mut t = toml_edit::Table::new();
            t.set_implicit(true);
            cur.insert(seg, toml_edit::Item::Table(t));
        }
        cur = cur[seg].as_table_mut().ok_or_else(|| {
            TaskdeckError::Config(format!("cannot set {key}: '{seg}' is not a table"))
        })?;
    }

    cur.insert(leaf, value);
    Ok(())
}

fn lookup_value(cfg: &Config, key: &str) -> Option<serde_json::Value> {
    let mut v = serde_json::to_value(cfg).ok()?;
    for seg in key.split('.').filter(|s| !s.is_empty()) {
        match v {
            serde_json::Value::Object(mut map) => {
                v = map.remove(seg)?;
            }
            _ => return None,
        }
    }
    Some(v)
}

fn format_value_for_stdout(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.page_size().get(), 5);
        assert_eq!(cfg.default_sort(), SortParams::default());
        assert!(cfg.features.task_search);
    }

    #[test]
    fn config_validation_catches_invalid_values() {
        let mut cfg = Config::default();
        cfg.tasks.page_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabled_features_are_reported_by_name() {
        let flags = FeatureFlags {
            task_search: false,
            ..FeatureFlags::default()
        };
        assert!(flags.require_appearance().is_ok());
        assert!(matches!(
            flags.require_task_search(),
            Err(TaskdeckError::FeatureDisabled("task_search"))
        ));
    }

    #[test]
    fn config_set_and_get_dot_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        set_value_string_at_path(&path, "ui.icons", "false").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "ui.icons")
                .unwrap()
                .as_deref(),
            Some("false")
        );

        set_value_string_at_path(&path, "enableTaskSearch", "false").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "features.task_search")
                .unwrap()
                .as_deref(),
            Some("false")
        );

        set_value_string_at_path(&path, "tasks.default_sort", "title").unwrap();
        set_value_string_at_path(&path, "tasks.page_size", "10").unwrap();
        set_value_string_at_path(&path, "ui.language", "es").unwrap();

        assert!(set_value_string_at_path(&path, "tasks.page_size", "0").is_err());
        assert!(set_value_string_at_path(&path, "tasks.default_sort", "priority").is_err());
        assert!(set_value_string_at_path(&path, "nope.key", "1").is_err());

        let cfg = load_at_path(&path).unwrap();
        assert!(!cfg.ui.icons);
        assert!(!cfg.features.task_search);
        assert_eq!(cfg.tasks.default_sort, SortField::Title);
        assert_eq!(cfg.page_size().get(), 10);
        assert_eq!(cfg.ui.locale, Locale::Es);
    }

    #[test]
    fn expands_env_vars_and_keeps_unknown_ones() {
        let out = expand_env_vars("$TASKDECK_SURELY_UNSET_VAR/data");
        assert_eq!(out, "$TASKDECK_SURELY_UNSET_VAR/data");
    }
}
