//! Hierarchical command trees on top of clap
//!
//! A command line interface is declared as a tree of [`CliCommand`]
//! descriptors. [`Executor::new`] builds the tree, lets every descriptor
//! register its flags and compiles everything into one `clap::Command`.
//! [`Executor::execute`] then parses an argument list, finds the invoked
//! command, calls `pre_run` on it and all of its ancestors (root first) and
//! finally calls its `run`.
//!
//! Errors are split in three: [`BuildError`] when the tree itself is broken,
//! [`CommandError`] when the user typed something the tree does not accept,
//! and the descriptors' own errors, which are handed back unchanged.

use std::path::PathBuf;

use log::{debug, warn};

use crate::config_file::{Config, ConfigError};

pub mod command;
pub mod compile;
pub mod config_file;
pub mod context;
pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod logger;
pub mod node;
pub mod scripted;
pub mod suggest;
pub mod tree;

pub use command::CliCommand;
pub use compile::Registration;
pub use context::{Context, ContextError};
pub use error::{BuildError, CommandError, CommandErrorKind, ExecError, is_command_error};
pub use exec::{Executor, Invocation};
pub use lifecycle::InitState;
pub use node::Node;
pub use scripted::{ScriptError, ScriptedCommand};
pub use tree::{NodeId, Tree};

/// Error type returned by descriptor hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Load a manifest (or auto-detect one), returning the root command and the manifest path.
///
/// Scripts run in the directory containing the manifest.
///
/// # Errors
///
/// Returns `ConfigError` if the manifest is not found, cannot be parsed or
/// contains invalid values.
pub fn load_manifest(config_file: Option<&str>) -> Result<(ScriptedCommand, PathBuf), ConfigError> {
    let config_path = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            if !config_path.exists() {
                return Err(ConfigError::ConfigNotFound(config_path));
            }
            config_path
        }
        None => Config::find_config()?,
    };
    let cwd = match config_path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => PathBuf::from("."),
        Some(dir) => dir.to_path_buf(),
        None => return Err(ConfigError::ConfigNotFound(config_path)),
    };
    debug!(
        "Loading manifest {} (cwd: {})",
        config_path.display(),
        cwd.display()
    );
    let parsed = Config::from_file(&config_path)?;
    validate_version(&parsed.cmdtree_version);
    config_file::validate(&parsed.root)?;
    let mut root = ScriptedCommand::from(parsed.root);
    root.cwd = Some(cwd);
    Ok((root, config_path))
}

/// Warn if the manifest's `cmdtree_version` doesn't match the library version
fn validate_version(manifest_version: &str) {
    let version = env!("CARGO_PKG_VERSION");
    if manifest_version != version {
        warn!("Manifest cmdtree_version '{manifest_version}' differs from version '{version}'");
    }
}
