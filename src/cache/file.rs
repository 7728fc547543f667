use super::Cache;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize)]
struct Entry {
    /// Unix timestamp in seconds
    expires_at: i64,
    value: serde_json::Value,
}

/// Cache storing one JSON file per key, survives between runs
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open a cache in `dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn read(&self, key: &str) -> Option<Entry> {
        let path = self.path(key);
        let data = std::fs::read(&path).ok()?;
        match serde_json::from_slice::<Entry>(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Cache for FileCache {
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.read(key)?;
        if entry.expires_at <= chrono::Utc::now().timestamp() {
            let _ = std::fs::remove_file(self.path(key));
            return None;
        }
        Some(entry.value)
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let entry = Entry {
            expires_at: chrono::Utc::now().timestamp().saturating_add(ttl),
            value,
        };

        // Write next to the target and rename so readers never see a partial file
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::trace!("Cached {} until {}", key, entry.expires_at);
        Ok(())
    }
}
