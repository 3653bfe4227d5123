use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::ClientConfig;

/// Environment variable that overrides `api.base_url`
pub const API_URL_ENV: &str = "TASKNEST_API_URL";

/// Keys accepted by `config get` / `config set`
pub const KNOWN_KEYS: &[&str] = &["api.base_url", "api.timeout_secs", "log.filter", "storage.dir"];

/// Error type for config file access
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Syntax(#[from] toml_edit::TomlError),
    #[error("unknown config key: {0} (expected one of: {known})", known = KNOWN_KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Directory holding config.toml and storage.json, respecting XDG_CONFIG_HOME
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("tasknest")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    read_config(path).map(|(config, _)| config)
}

/// Read the config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing. A missing file reads
/// as an empty document.
pub fn read_config(path: &Path) -> Result<(ClientConfig, toml_edit::DocumentMut), ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let config: ClientConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the document back to disk, preserving formatting and comments.
pub fn write_config(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_err = |e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, doc.to_string()).map_err(write_err)
}

/// Look up a dotted key ("api.base_url"). Values are rendered without quotes.
pub fn get_value(doc: &toml_edit::DocumentMut, key: &str) -> Result<Option<String>, ConfigError> {
    let (table, field) = split_key(key)?;
    let value = doc
        .get(table)
        .and_then(|t| t.get(field))
        .and_then(|item| item.as_value())
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string().trim().to_string(),
        });
    Ok(value)
}

/// Set a dotted key, creating its table when needed.
pub fn set_value(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let (table, field) = split_key(key)?;
    let item = if key == "api.timeout_secs" {
        let secs: i64 = value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        toml_edit::value(secs)
    } else {
        toml_edit::value(value)
    };

    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[table][field] = item;
    Ok(())
}

fn split_key(key: &str) -> Result<(&str, &str), ConfigError> {
    if !KNOWN_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    key.split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

/// Apply the environment and command-line overrides for the API root.
/// The flag wins over the environment, which wins over the file.
pub fn apply_overrides(config: &mut ClientConfig, env_url: Option<String>, flag_url: Option<&str>) {
    if let Some(url) = flag_url.map(str::to_string).or(env_url) {
        let url = url.trim().trim_end_matches('/').to_string();
        if !url.is_empty() {
            config.api.base_url = url;
        }
    }
}

/// Where storage.json lives: `storage.dir` or the config directory.
pub fn storage_dir(config: &ClientConfig) -> PathBuf {
    config
        .storage
        .dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(config_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::DEFAULT_BASE_URL;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"# tasknest client settings
[api]
base_url = "https://todo.example.com"  # production

[log]
filter = "tasknest=debug"
"#
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, sample_config()).unwrap();

        let (config, doc) = read_config(&path).unwrap();
        assert_eq!(config.api.base_url, "https://todo.example.com");
        assert_eq!(config.log.filter.as_deref(), Some("tasknest=debug"));
        write_config(&path, &doc).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), sample_config());
    }

    #[test]
    fn test_set_preserves_comments() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_value(&mut doc, "api.timeout_secs", "5").unwrap();
        set_value(&mut doc, "storage.dir", "/tmp/tn").unwrap();
        let text = doc.to_string();
        assert!(text.contains("# tasknest client settings"));
        assert!(text.contains("# production"));

        let config: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.storage.dir.as_deref(), Some("/tmp/tn"));
    }

    #[test]
    fn test_get_value() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        assert_eq!(
            get_value(&doc, "api.base_url").unwrap().as_deref(),
            Some("https://todo.example.com")
        );
        assert_eq!(get_value(&doc, "storage.dir").unwrap(), None);
        set_value(&mut doc, "api.timeout_secs", "12").unwrap();
        assert_eq!(get_value(&doc, "api.timeout_secs").unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn test_rejects_unknown_key_and_bad_value() {
        let mut doc = toml_edit::DocumentMut::new();
        assert!(matches!(
            set_value(&mut doc, "api.token", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_value(&mut doc, "api.timeout_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_key_message_lists_known_keys() {
        let msg = ConfigError::UnknownKey("api.token".into()).to_string();
        assert_eq!(
            msg,
            "unknown config key: api.token (expected one of: api.base_url, \
             api.timeout_secs, log.filter, storage.dir)"
        );
    }

    #[test]
    fn test_override_precedence() {
        let mut config = ClientConfig::default();
        apply_overrides(&mut config, Some("http://env:9000/".into()), None);
        assert_eq!(config.api.base_url, "http://env:9000");

        apply_overrides(&mut config, Some("http://env:9000".into()), Some("http://flag:1"));
        assert_eq!(config.api.base_url, "http://flag:1");

        apply_overrides(&mut config, None, Some("  "));
        assert_eq!(config.api.base_url, "http://flag:1");
    }
}
