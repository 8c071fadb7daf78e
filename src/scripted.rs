//! Commands defined in a manifest and backed by shell snippets

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Child, ExitStatus, Stdio};
use std::time::Duration;

use clap::{Arg, ArgAction};
use log::{debug, info, warn};
use thiserror::Error;

use crate::BoxError;
use crate::command::CliCommand;
use crate::compile::Registration;
use crate::config_file::{ConfigCommand, ConfigFlag, FlagKind};
use crate::context::{Context, ContextError};
use crate::node::Node;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Prefix of the environment variables that carry flag values into scripts
pub const FLAG_ENV_PREFIX: &str = "CMDTREE_FLAG_";

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("Unable to start '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' failed: {status}")]
    Failed { path: String, status: ExitStatus },
}

impl ScriptError {
    /// Exit code of the failed script, if it exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ScriptError::Failed { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// A [`CliCommand`] built from a manifest entry
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommand {
    pub name: String,
    pub about: Option<String>,
    pub aliases: Vec<String>,
    pub hidden: bool,
    pub disable_suggestions: bool,
    pub cmd: Option<String>,
    pub env: BTreeMap<String, String>,
    pub flags: Vec<ConfigFlag>,
    pub commands: Vec<ScriptedCommand>,
    /// Working directory for scripts; inherited from the parent when unset
    pub cwd: Option<PathBuf>,
    resolved_env: BTreeMap<String, String>,
}

impl From<ConfigCommand> for ScriptedCommand {
    fn from(config: ConfigCommand) -> Self {
        ScriptedCommand {
            name: config.name,
            about: config.about,
            aliases: config.aliases,
            hidden: config.hidden,
            disable_suggestions: !config.suggestions.unwrap_or(true),
            cmd: config.cmd,
            env: config.env,
            flags: config.flags,
            commands: config.commands.into_iter().map(ScriptedCommand::from).collect(),
            cwd: None,
            resolved_env: BTreeMap::new(),
        }
    }
}

impl ScriptedCommand {
    /// Environment computed by the last `pre_run`: inherited variables, this
    /// command's own `env` and the exported flag values.
    #[must_use]
    pub fn resolved_env(&self) -> &BTreeMap<String, String> {
        &self.resolved_env
    }

    /// Name of the variable a flag value is exported as.
    #[must_use]
    pub fn flag_env_name(flag: &str) -> String {
        let suffix: String = flag
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{FLAG_ENV_PREFIX}{suffix}")
    }

    fn arg(flag: &ConfigFlag) -> Arg {
        let mut arg = Arg::new(flag.name.clone()).long(flag.name.clone());
        if let Some(short) = flag.short {
            arg = arg.short(short);
        }
        if let Some(help) = &flag.help {
            arg = arg.help(help.clone());
        }
        match flag.kind {
            FlagKind::Bool => arg.action(ArgAction::SetTrue),
            FlagKind::String => {
                arg = arg.action(ArgAction::Set);
                match &flag.default {
                    Some(default) => arg.default_value(default.clone()),
                    None => arg,
                }
            }
        }
    }

    fn flag_value(this: &Node<'_>, flag: &ConfigFlag) -> Option<String> {
        match flag.kind {
            FlagKind::Bool => Some(this.get_flag(&flag.name).to_string()),
            FlagKind::String => this.get_one::<String>(&flag.name).cloned(),
        }
    }

    fn wait(ctx: &Context, path: &str, mut child: Child) -> Result<(), ScriptError> {
        loop {
            let polled = child.try_wait().map_err(|source| ScriptError::Spawn {
                path: path.to_string(),
                source,
            })?;
            if let Some(status) = polled {
                if status.success() {
                    return Ok(());
                }
                return Err(ScriptError::Failed {
                    path: path.to_string(),
                    status,
                });
            }
            if let Err(e) = ctx.check() {
                warn!("Stopping '{path}': {e}");
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Lists the visible sub commands of `node`, one per line.
#[must_use]
pub fn listing(node: &Node<'_>) -> String {
    let mut out = format!("Usage: {}\n", node.usage());
    if let Some(about) = node.about() {
        out.push('\n');
        out.push_str(about);
        out.push('\n');
    }
    let visible: Vec<_> = node.children().filter(|c| !c.is_hidden()).collect();
    if !visible.is_empty() {
        out.push_str("\nCommands:\n");
        let width = visible.iter().map(|c| c.name().len()).max().unwrap_or(0);
        for child in visible {
            match child.about() {
                Some(about) => out.push_str(&format!("  {:width$}  {about}\n", child.name())),
                None => out.push_str(&format!("  {}\n", child.name())),
            }
        }
    }
    out
}

impl CliCommand for ScriptedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&mut self) -> Vec<Box<dyn CliCommand>> {
        std::mem::take(&mut self.commands)
            .into_iter()
            .map(|c| Box::new(c) as Box<dyn CliCommand>)
            .collect()
    }

    fn init(&mut self, reg: &mut Registration<'_>) -> Result<(), BoxError> {
        if let Some(about) = &self.about {
            reg.about(about.clone());
        }
        reg.aliases(self.aliases.iter().cloned())
            .hide(self.hidden)
            .disable_suggestions(self.disable_suggestions);
        for flag in &self.flags {
            let arg = Self::arg(flag);
            if flag.persistent {
                reg.persistent_flag(arg);
            } else {
                reg.flag(arg);
            }
        }
        Ok(())
    }

    fn pre_run(&mut self, this: &Node<'_>, _runner: &Node<'_>) -> Result<(), BoxError> {
        let parent = this.parent().and_then(|p| p.downcast::<ScriptedCommand>());
        let mut env = parent
            .as_ref()
            .map(|p| p.resolved_env.clone())
            .unwrap_or_default();
        if self.cwd.is_none() {
            self.cwd = parent.as_ref().and_then(|p| p.cwd.clone());
        }
        drop(parent);

        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        for flag in &self.flags {
            if let Some(value) = Self::flag_value(this, flag) {
                env.insert(Self::flag_env_name(&flag.name), value);
            }
        }
        debug!("'{}' resolved {} environment variables", this.command_path(), env.len());
        self.resolved_env = env;
        Ok(())
    }

    fn run(&mut self, ctx: &Context, node: &Node<'_>, args: &[String]) -> Result<(), BoxError> {
        ctx.check().map_err(ScriptError::from)?;
        let path = node.command_path();
        let Some(cmd) = &self.cmd else {
            print!("{}", listing(node));
            return Ok(());
        };

        info!("Running '{path}': {cmd}");
        let mut command = std::process::Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .arg(&self.name)
            .args(args)
            .envs(&self.resolved_env)
            .stdin(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        let child = command.spawn().map_err(|source| ScriptError::Spawn {
            path: path.to_string(),
            source,
        })?;
        Self::wait(ctx, path, child)?;
        Ok(())
    }
}
