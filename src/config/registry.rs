//! Loaded feeds, by name

use crate::config::parser::{compute_config_hash, feed_files, load_feed};
use crate::config::rule::Feed;
use crate::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct Entry {
    feed: Arc<Feed>,
    path: PathBuf,
    hash: String,
}

/// Outcome of [`FeedRegistry::reload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// File content is identical to what is loaded
    Unchanged,
    Reloaded,
}

/// All feeds of a configuration directory
#[derive(Debug, Default)]
pub struct FeedRegistry {
    feeds: RwLock<HashMap<String, Entry>>,
}

impl FeedRegistry {
    /// Loads every feed file of `dir`
    ///
    /// Files that fail to load are logged and skipped. When two files declare
    /// the same feed name the first one in path order wins.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut feeds = HashMap::new();

        for path in feed_files(dir)? {
            let loaded = load_feed(&path).and_then(|feed| {
                let hash = compute_config_hash(&path)?;
                Ok((feed, hash))
            });

            match loaded {
                Ok((feed, hash)) => {
                    if feeds.contains_key(&feed.name) {
                        tracing::warn!(
                            "Duplicate feed '{}' in {}, ignored",
                            feed.name,
                            path.display()
                        );
                        continue;
                    }
                    tracing::debug!("Loaded feed '{}' from {}", feed.name, path.display());
                    feeds.insert(
                        feed.name.clone(),
                        Entry {
                            feed: Arc::new(feed),
                            path,
                            hash,
                        },
                    );
                }
                Err(e) => tracing::error!("Failed to load {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} feeds from {}", feeds.len(), dir.display());
        Ok(Self {
            feeds: RwLock::new(feeds),
        })
    }

    /// Registers a single feed file
    pub fn insert_file(&self, path: &Path) -> Result<Arc<Feed>, ConfigError> {
        let feed = Arc::new(load_feed(path)?);
        let hash = compute_config_hash(path)?;
        self.write().insert(
            feed.name.clone(),
            Entry {
                feed: Arc::clone(&feed),
                path: path.to_path_buf(),
                hash,
            },
        );
        Ok(feed)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Feed>> {
        self.read().get(name).map(|e| Arc::clone(&e.feed))
    }

    /// Feed names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn feeds(&self) -> Vec<Arc<Feed>> {
        let mut feeds: Vec<Arc<Feed>> = self.read().values().map(|e| Arc::clone(&e.feed)).collect();
        feeds.sort_by(|a, b| a.name.cmp(&b.name));
        feeds
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Re-reads one feed's file
    ///
    /// Nothing is replaced when the file hash is unchanged. A file that no
    /// longer loads leaves the previous version in place.
    pub fn reload(&self, name: &str) -> Result<Reload, ConfigError> {
        let (path, old_hash) = {
            let feeds = self.read();
            let entry = feeds
                .get(name)
                .ok_or_else(|| ConfigError::Validation(format!("Unknown feed '{}'", name)))?;
            (entry.path.clone(), entry.hash.clone())
        };

        let hash = compute_config_hash(&path)?;
        if hash == old_hash {
            return Ok(Reload::Unchanged);
        }

        let feed = load_feed(&path)?;
        if feed.name != name {
            return Err(ConfigError::Validation(format!(
                "{} now declares feed '{}' instead of '{}'",
                path.display(),
                feed.name,
                name
            )));
        }

        self.write().insert(
            name.to_string(),
            Entry {
                feed: Arc::new(feed),
                path,
                hash,
            },
        );
        tracing::info!("Reloaded feed '{}'", name);
        Ok(Reload::Reloaded)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.feeds.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.feeds.write().unwrap_or_else(|e| e.into_inner())
    }
}
