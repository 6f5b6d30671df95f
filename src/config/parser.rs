use crate::config::rule::Feed;
use crate::config::types::{AppConfig, FeedConfig};
use crate::config::validation::{validate_app, validate_feed};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

fn parse_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Loads the base configuration
///
/// Without a path every setting takes its default.
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_toml(path)?,
        None => AppConfig::default(),
    };
    validate_app(&config)?;
    Ok(config)
}

/// Loads and validates a feed file
pub fn load_feed_config(path: &Path) -> Result<FeedConfig, ConfigError> {
    let config: FeedConfig = parse_toml(path)?;
    validate_feed(&config)?;
    Ok(config)
}

/// Loads a feed file and compiles it
pub fn load_feed(path: &Path) -> Result<Feed, ConfigError> {
    Feed::compile(load_feed_config(path)?)
}

/// Lists the `*.toml` files of a directory, sorted by path
pub fn feed_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every feed file of a directory
///
/// Each file gets its own result so one broken feed does not hide the others.
pub fn load_feed_dir(dir: &Path) -> Result<Vec<(PathBuf, Result<Feed, ConfigError>)>, ConfigError> {
    Ok(feed_files(dir)?
        .into_iter()
        .map(|path| {
            let feed = load_feed(&path);
            (path, feed)
        })
        .collect())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Used to tell whether a feed file changed since it was last loaded.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}
