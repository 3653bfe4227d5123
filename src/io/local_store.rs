//! Small key-value file for client state that survives restarts: the
//! bearer token and the generator preferences. Nothing here fails loudly;
//! unreadable state is logged and treated as absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use tempfile::NamedTempFile;

pub const TOKEN_KEY: &str = "authToken";
pub const PREFERENCES_KEY: &str = "aiTaskGeneratorPreferences";

const FILE_NAME: &str = "storage.json";

#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Store backed by `<dir>/storage.json`. The file is created on first write.
    pub fn open(dir: &Path) -> Self {
        LocalStore {
            path: dir.join(FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_token(&self, token: &str) {
        self.set(TOKEN_KEY, Value::String(token.to_string()));
    }

    pub fn load_token(&self) -> Option<String> {
        match self.get(TOKEN_KEY)? {
            Value::String(token) if !token.is_empty() => Some(token),
            _ => None,
        }
    }

    pub fn remove_token(&self) {
        self.remove(TOKEN_KEY);
    }

    pub fn save_preferences(&self, preferences: &Value) {
        self.set(PREFERENCES_KEY, preferences.clone());
    }

    pub fn load_preferences(&self) -> Option<Value> {
        self.get(PREFERENCES_KEY).filter(Value::is_object)
    }

    pub fn remove_preferences(&self) {
        self.remove(PREFERENCES_KEY);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.read_entries().shift_remove(key)
    }

    fn set(&self, key: &str, value: Value) {
        let mut entries = self.read_entries();
        entries.insert(key.to_string(), value);
        self.write_entries(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.read_entries();
        if entries.shift_remove(key).is_some() {
            self.write_entries(&entries);
        }
    }

    fn read_entries(&self) -> IndexMap<String, Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return IndexMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not read local storage"
                );
                return IndexMap::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                // keep the unreadable file around and start fresh
                let bak = self.path.with_extension("json.bak");
                match fs::copy(&self.path, &bak) {
                    Ok(_) => tracing::warn!(
                        path = %self.path.display(),
                        backup = %bak.display(),
                        error = %e,
                        "could not parse local storage"
                    ),
                    Err(copy_err) => tracing::warn!(
                        path = %self.path.display(),
                        backup = %bak.display(),
                        error = %e,
                        copy_error = %copy_err,
                        "could not parse local storage and could not back it up"
                    ),
                }
                IndexMap::new()
            }
        }
    }

    fn write_entries(&self, entries: &IndexMap<String, Value>) {
        let result = serde_json::to_vec_pretty(entries)
            .map_err(io::Error::other)
            .and_then(|bytes| {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                atomic_write(&self.path, &bytes)
            });
        if let Err(e) = result {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not write local storage"
            );
        }
    }
}

/// Write `content` to a temp file in the same directory and rename it over `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
