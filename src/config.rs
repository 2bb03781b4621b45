// Configuration for the taskboard binary

use crate::slot::{FileSlot, KeyValueSlot, SqliteSlot};
use crate::store::TASKS_KEY;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const APP_DIR: &str = "taskboard";
const CONFIG_FILE: &str = "config.yml";
const DB_FILE: &str = "taskboard.db";

/// Which durable slot backs the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(eyre!("Unknown backend: {} (expected file or sqlite)", other)),
        }
    }
}

/// Settings as read from the YAML file; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub backend: Option<Backend>,
    pub data_dir: Option<PathBuf>,
    pub key: Option<String>,
}

/// Resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            key: TASKS_KEY.to_string(),
        }
    }
}

/// `<data_dir>/taskboard`, or `./.taskboard` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".taskboard"))
}

/// `<config_dir>/taskboard/config.yml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

impl ConfigFile {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

impl Config {
    /// Resolve settings
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// used if present. Fields in `overrides` win over the file.
    pub fn resolve(path: Option<&Path>, overrides: ConfigFile) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => ConfigFile::load(&path)?,
                _ => ConfigFile::default(),
            },
        };

        let config = Self::default().merge(file).merge(overrides);
        crate::slot::validate_key(&config.key).map_err(|e| eyre!(e))?;
        debug!(?config, "Resolved config");
        Ok(config)
    }

    fn merge(self, file: ConfigFile) -> Self {
        Self {
            backend: file.backend.unwrap_or(self.backend),
            data_dir: file.data_dir.map(expand_home).unwrap_or(self.data_dir),
            key: file.key.unwrap_or(self.key),
        }
    }

    /// Open the configured slot
    pub fn open_slot(&self) -> Result<Box<dyn KeyValueSlot>> {
        let slot: Box<dyn KeyValueSlot> = match self.backend {
            Backend::File => Box::new(FileSlot::open(&self.data_dir)?),
            Backend::Sqlite => Box::new(SqliteSlot::open(self.data_dir.join(DB_FILE))?),
        };
        Ok(slot)
    }
}

// Expand a leading `~` the way a shell would
fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_file() {
        let file = ConfigFile::parse("backend: sqlite\ndata_dir: /tmp/tb\nkey: planner\n").unwrap();
        assert_eq!(file.backend, Some(Backend::Sqlite));
        assert_eq!(file.data_dir, Some(PathBuf::from("/tmp/tb")));
        assert_eq!(file.key.as_deref(), Some("planner"));
    }

    #[test]
    fn test_parse_empty_and_partial() {
        assert_eq!(ConfigFile::parse("").unwrap(), ConfigFile::default());
        let file = ConfigFile::parse("backend: file\n").unwrap();
        assert_eq!(file.backend, Some(Backend::File));
        assert_eq!(file.key, None);
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        assert!(ConfigFile::parse("colour: blue\n").is_err());
        assert!(ConfigFile::parse("backend: redis\n").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "backend: sqlite\nkey: fromfile\n").unwrap();

        let overrides = ConfigFile {
            key: Some("fromflag".to_string()),
            data_dir: Some(temp.path().join("data")),
            ..ConfigFile::default()
        };
        let config = Config::resolve(Some(&path), overrides).unwrap();

        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.key, "fromflag");
        assert_eq!(config.data_dir, temp.path().join("data"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::resolve(Some(&temp.path().join("nope.yml")), ConfigFile::default()).is_err());
    }

    #[test]
    fn test_invalid_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "key: \"bad/key\"\n").unwrap();
        assert!(Config::resolve(Some(&path), ConfigFile::default()).is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("SQLite".parse::<Backend>().unwrap(), Backend::Sqlite);
        assert_eq!("file".parse::<Backend>().unwrap(), Backend::File);
        assert!("redis".parse::<Backend>().is_err());
        assert_eq!(Backend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_open_slot_for_each_backend() {
        let temp = TempDir::new().unwrap();
        for backend in [Backend::File, Backend::Sqlite] {
            let config = Config {
                backend,
                data_dir: temp.path().join(backend.to_string()),
                key: TASKS_KEY.to_string(),
            };
            let mut slot = config.open_slot().unwrap();
            slot.write(TASKS_KEY, "[]").unwrap();
            assert_eq!(slot.read(TASKS_KEY).unwrap().as_deref(), Some("[]"));
        }
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(PathBuf::from("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(PathBuf::from("~/tb")), home.join("tb"));
        }
    }
}
