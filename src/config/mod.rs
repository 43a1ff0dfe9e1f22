// SPDX-License-Identifier: MPL-2.0
//! Engine configuration, loaded from and saved to a `settings.toml` file.
//!
//! Every field is optional on disk; missing or unparseable values fall
//! back to the defaults in [`defaults`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod defaults;

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "Workview";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Resolved tiles kept beyond the visible set before eviction kicks in.
    #[serde(default)]
    pub tile_cache_slack: Option<usize>,
    /// Section descriptors per page request.
    #[serde(default)]
    pub sections_page_size: Option<usize>,
    /// Parallel frame fetches in the frames loader.
    #[serde(default)]
    pub frame_fetch_parallelism: Option<usize>,
    /// Decoded frames retained by the worker before LRU eviction.
    #[serde(default)]
    pub frame_cache_capacity: Option<usize>,
    /// Maximum camera zoom factor.
    #[serde(default)]
    pub max_scale: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_cache_slack: Some(defaults::DEFAULT_TILE_CACHE_SLACK),
            sections_page_size: Some(defaults::DEFAULT_SECTIONS_PAGE_SIZE),
            frame_fetch_parallelism: Some(defaults::DEFAULT_FRAME_FETCH_PARALLELISM),
            frame_cache_capacity: Some(defaults::DEFAULT_FRAME_CACHE_CAPACITY),
            max_scale: Some(defaults::DEFAULT_MAX_SCALE),
        }
    }
}

impl Config {
    pub fn tile_cache_slack(&self) -> usize {
        self.tile_cache_slack
            .unwrap_or(defaults::DEFAULT_TILE_CACHE_SLACK)
    }

    pub fn sections_page_size(&self) -> usize {
        self.sections_page_size
            .unwrap_or(defaults::DEFAULT_SECTIONS_PAGE_SIZE)
            .max(1)
    }

    pub fn frame_fetch_parallelism(&self) -> usize {
        self.frame_fetch_parallelism
            .unwrap_or(defaults::DEFAULT_FRAME_FETCH_PARALLELISM)
            .max(1)
    }

    pub fn frame_cache_capacity(&self) -> usize {
        self.frame_cache_capacity
            .unwrap_or(defaults::DEFAULT_FRAME_CACHE_CAPACITY)
            .max(1)
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale.unwrap_or(defaults::DEFAULT_MAX_SCALE)
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<Config> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(Config::default())
}

pub fn save(config: &Config) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_default())
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
