//! Command-tree manifest handling

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a manifest
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No manifest found in current directory or its parents: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML manifest {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON manifest {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid manifest: {0}")]
    Validation(String),
}

/// Value type of a manifest flag
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// A switch without a value
    Bool,
    #[default]
    String,
}

/// A flag declared on a manifest command
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfigFlag {
    pub name: String,
    pub short: Option<char>,
    pub help: Option<String>,
    #[serde(default)]
    pub kind: FlagKind,
    /// Visible to every sub command as well
    #[serde(default)]
    pub persistent: bool,
    pub default: Option<String>,
}

/// A command and its sub commands
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfigCommand {
    pub name: String,
    pub about: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
    /// Set to false to turn off "Did you mean this?" hints below this command
    pub suggestions: Option<bool>,
    /// Shell snippet run by `sh -c`; positional arguments become `$1`, `$2`, ...
    pub cmd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub flags: Vec<ConfigFlag>,
    #[serde(default)]
    pub commands: Vec<ConfigCommand>,
}

/// Root manifest structure
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub cmdtree_version: String,
    #[serde(flatten)]
    pub root: ConfigCommand,
}

/// Manifest file names, in lookup order
pub const FILENAMES: [&str; 3] = [".cmdtree.json", ".cmdtree.yaml", ".cmdtree.yml"];

impl Config {
    /// Loads and parses a manifest.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        let config: Config = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        Ok(config)
    }

    /// Searches for a manifest in the current directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined,
    /// or `ConfigError::ConfigNotFound` if no manifest is found.
    pub fn find_config() -> Result<PathBuf, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Self::find_config_from(&cwd)
    }

    /// Same as [`Config::find_config`], starting at `start` instead of the cwd.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if no manifest is found.
    pub fn find_config_from(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut path = start.to_path_buf();
        debug!("Searching for manifest in {}", start.display());
        loop {
            for file in &FILENAMES {
                let candidate = path.join(file);
                if candidate.exists() {
                    info!("Found manifest: {}", candidate.display());
                    return Ok(candidate);
                }
            }
            if !path.pop() {
                return Err(ConfigError::ConfigNotFound(start.to_path_buf()));
            }
        }
    }
}

/// Checks the parts of a manifest that the command tree itself does not:
/// blank names, blank `cmd` strings and repeated flag names.
///
/// # Errors
///
/// Returns `ConfigError::Validation` describing the first problem found.
pub fn validate(command: &ConfigCommand) -> Result<(), ConfigError> {
    validate_command(command, "")
}

fn validate_command(command: &ConfigCommand, parent: &str) -> Result<(), ConfigError> {
    if command.name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Command under '{parent}' has an empty name"
        )));
    }
    let path = if parent.is_empty() {
        command.name.clone()
    } else {
        format!("{parent} {}", command.name)
    };
    if command.cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "Command '{path}' has an empty cmd string"
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for flag in &command.flags {
        if flag.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Command '{path}' has a flag with an empty name"
            )));
        }
        if !seen.insert(flag.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Command '{path}' declares flag '{}' twice",
                flag.name
            )));
        }
    }
    for child in &command.commands {
        validate_command(child, &path)?;
    }
    Ok(())
}
