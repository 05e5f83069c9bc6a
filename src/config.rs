//! Configuration module for the document similarity pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCSIM_` and use double
//! underscores to separate nested levels:
//! - `DOCSIM_SEARCH__NEIGHBORS=10` sets `search.neighbors`
//! - `DOCSIM_SEARCH__EXCLUDE_SELF=true` sets `search.exclude_self`
//! - `DOCSIM_EMBEDDING__BATCH_SIZE=64` sets `embedding.batch_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL_DEBUG: AtomicBool = AtomicBool::new(false);

/// Enable or disable the global debug flag backing `debug_print!`
pub fn set_global_debug(enabled: bool) {
    GLOBAL_DEBUG.store(enabled, Ordering::Relaxed);
}

/// Check whether global debug output is enabled
pub fn is_global_debug_enabled() -> bool {
    GLOBAL_DEBUG.load(Ordering::Relaxed)
}

/// Default cache directory for downloaded embedding models
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("docsim")
        .join("models")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .docsim is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Document source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Embedding settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Nearest-neighbor search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Result output settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Root directory holding one subdirectory of extracted text per partition
    #[serde(default = "default_text_root")]
    pub text_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Number of documents encoded per batch. Cancellation is checked
    /// between batches, so smaller batches mean faster abort response.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Model cache directory (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Number of neighbors to retrieve per document
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,

    /// Drop each document from its own neighbor list. When false (the
    /// default) every list starts with the document itself at distance 0.
    #[serde(default = "default_false")]
    pub exclude_self: bool,

    /// Number of parallel threads for the self-query batch
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Directory where result JSON files are written
    #[serde(default = "default_json_dir")]
    pub json_dir: PathBuf,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_text_root() -> PathBuf {
    PathBuf::from("output_text")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_neighbors() -> usize {
    5
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_json_dir() -> PathBuf {
    PathBuf::from("output_json")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            source: SourceConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            text_root: default_text_root(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            neighbors: default_neighbors(),
            exclude_self: false,
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_dir: default_json_dir(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .docsim directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".docsim/settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with DOCSIM_ prefix
            // Use double underscore (__) to separate nested levels
            // Single underscore (_) remains as is within field names
            .merge(Env::prefixed("DOCSIM_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            // Extract into Settings struct
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                // If workspace_root is not set in config, detect it
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DOCSIM_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace root by looking for .docsim directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".docsim");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Get the workspace root directory (where .docsim is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".docsim");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = if let Some(path) = Self::find_workspace_config() {
            path
        } else {
            PathBuf::from(".docsim/settings.toml")
        };

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        // Try to parse the config file to check if it's valid
        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'docsim init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".docsim/settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let current_dir = std::env::current_dir().unwrap_or_default();
        let template = format!(
            r#"# Docsim Configuration File

# Version of the configuration schema
version = 1

# Workspace root directory (automatically detected)
workspace_root = "{}"

# Global debug mode
debug = false

[source]
# Root directory holding one subdirectory of extracted text per partition.
# Each partition directory contains one .txt file per document; the file
# stem is the document id.
text_root = "output_text"

[embedding]
# Model to use for embeddings
model = "AllMiniLML6V2"

# Number of documents encoded per batch
batch_size = 32

# Model cache directory (defaults to the user cache dir)
# cache_dir = "/path/to/cache"

[search]
# Number of neighbors to retrieve per document
neighbors = 5

# Drop each document from its own neighbor list. When false, every list
# starts with the document itself at distance 0.
exclude_self = false

# Number of parallel threads for the self-query batch (defaults to CPU count)
# parallel_threads = {}

[output]
# Directory where result JSON files are written
json_dir = "output_json"
"#,
            current_dir.display(),
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        if force {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
        }

        Ok(config_path)
    }
}
