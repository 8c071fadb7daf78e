//! Error taxonomy for building and executing command trees
//!
//! Three kinds of failure leave this crate:
//!
//! * [`BuildError`]: the tree could not be constructed or compiled. Returned by
//!   [`Executor::new`](crate::Executor::new) only; no partial tree is usable.
//! * [`CommandError`]: the user invoked the tree wrongly, e.g. an unknown
//!   command or flag. Wrapped in [`ExecError::Command`].
//! * Descriptor failures: errors returned by a command's `pre_run` or `run`,
//!   carried verbatim in [`ExecError::PreRun`] and [`ExecError::Run`].

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::BoxError;

/// Errors raised while building or compiling a command tree
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid command name {name:?} under {parent:?}: {reason}")]
    InvalidName {
        name: String,
        parent: String,
        reason: &'static str,
    },
    #[error("duplicate command name {name:?} under {parent:?}")]
    DuplicateName { name: String, parent: String },
    #[error("command {path:?} registers the reserved argument id {id:?}")]
    ReservedArgument { path: String, id: &'static str },
    /// Two flags visible on the same command share a short or long name.
    #[error("flag {flag} of {path:?} is already taken by {taken_by:?}")]
    DuplicateFlag {
        flag: String,
        path: String,
        taken_by: String,
    },
    /// `init` renamed the underlying parser command away from the descriptor's name.
    #[error("command {path:?} was renamed to {renamed:?} during registration")]
    Renamed { path: String, renamed: String },
    /// The descriptor's `init` hook failed. Displays exactly as the descriptor produced it.
    #[error("{source}")]
    Register { path: String, source: BoxError },
}

/// What went wrong when the user invoked the tree
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    /// A positional argument was given where a subcommand of `path` was expected.
    #[error("unknown command {name:?} for {path:?}{suggestions}")]
    UnknownCommand {
        name: String,
        path: String,
        /// Preformatted "Did you mean this?" block, empty when there are no candidates.
        suggestions: String,
    },
    /// The argument parser rejected the argument vector.
    #[error("{}", parser_message(.0))]
    Parse(clap::Error),
}

/// Renders a parser error without its own `error: ` label.
fn parser_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let rendered = rendered.trim_end();
    rendered.strip_prefix("error: ").unwrap_or(rendered).to_string()
}

/// A user-facing routing or parsing error
#[derive(Debug)]
pub struct CommandError {
    kind: CommandErrorKind,
}

impl CommandError {
    #[must_use]
    pub fn new(kind: CommandErrorKind) -> Self {
        Self { kind }
    }

    pub(crate) fn unknown_command(name: &str, path: &str, suggestions: String) -> Self {
        Self::new(CommandErrorKind::UnknownCommand {
            name: name.to_string(),
            path: path.to_string(),
            suggestions,
        })
    }

    #[must_use]
    pub fn kind(&self) -> &CommandErrorKind {
        &self.kind
    }

    /// Returns true for an unknown (sub)command, with or without suggestions.
    #[must_use]
    pub fn is_unknown_command(&self) -> bool {
        matches!(self.kind, CommandErrorKind::UnknownCommand { .. })
    }

    /// The parser's own error kind, if the parser produced this error.
    #[must_use]
    pub fn parser_kind(&self) -> Option<clap::error::ErrorKind> {
        match &self.kind {
            CommandErrorKind::Parse(e) => Some(e.kind()),
            CommandErrorKind::UnknownCommand { .. } => None,
        }
    }

    /// Returns true when the user asked for help or version output rather than
    /// making a mistake. The rendered text is available through `Display`.
    #[must_use]
    pub fn is_display_request(&self) -> bool {
        use clap::error::ErrorKind;
        matches!(
            self.parser_kind(),
            Some(
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            )
        )
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command error: {}", self.kind)
    }
}

impl StdError for CommandError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            CommandErrorKind::Parse(e) => Some(e),
            CommandErrorKind::UnknownCommand { .. } => None,
        }
    }
}

impl From<clap::Error> for CommandError {
    fn from(err: clap::Error) -> Self {
        Self::new(CommandErrorKind::Parse(err))
    }
}

/// Errors returned by [`Executor::execute`](crate::Executor::execute)
#[derive(Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Command(#[from] CommandError),
    /// A `pre_run` hook failed; the remaining chain and `run` were skipped.
    #[error(transparent)]
    PreRun(BoxError),
    /// The invoked command's `run` failed.
    #[error(transparent)]
    Run(BoxError),
}

impl ExecError {
    #[must_use]
    pub fn is_command_error(&self) -> bool {
        matches!(self, ExecError::Command(_))
    }

    #[must_use]
    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            ExecError::Command(e) => Some(e),
            _ => None,
        }
    }

    /// Hands back the error produced by the descriptor's `run`, untouched.
    ///
    /// # Errors
    ///
    /// Returns `self` if this is not a run error.
    pub fn into_run_error(self) -> Result<BoxError, Self> {
        match self {
            ExecError::Run(e) => Ok(e),
            other => Err(other),
        }
    }

    /// Hands back the error produced by a `pre_run` hook, untouched.
    ///
    /// # Errors
    ///
    /// Returns `self` if this is not a pre-run error.
    pub fn into_pre_run_error(self) -> Result<BoxError, Self> {
        match self {
            ExecError::PreRun(e) => Ok(e),
            other => Err(other),
        }
    }
}

/// Reports whether any error in `err`'s source chain is a [`CommandError`].
///
/// Works through caller-side wrapping, as long as the wrapper exposes the
/// wrapped error as its `source`.
#[must_use]
pub fn is_command_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<CommandError>() {
            return true;
        }
        if e.downcast_ref::<ExecError>()
            .is_some_and(ExecError::is_command_error)
        {
            return true;
        }
        current = e.source();
    }
    false
}
