//! Compiles a [`Tree`] into a `clap::Command` hierarchy
//!
//! Every descriptor's `init` hook receives a [`Registration`] for its own
//! node. Flags, help text and suggestion settings end up partly on the clap
//! command and partly in the node metadata the executor consults later.

use std::collections::HashMap;

use clap::{Arg, ArgAction};
use log::{debug, trace, warn};

use crate::error::BuildError;
use crate::tree::{NodeId, NodeMeta, Tree};

/// Id of the positional argument that collects trailing arguments on every command.
pub(crate) const ARGS_ID: &str = "args";

const HELP_ID: &str = "help";

/// Handle passed to [`CliCommand::init`](crate::CliCommand::init)
pub struct Registration<'a> {
    command: clap::Command,
    meta: &'a mut NodeMeta,
    name: &'a str,
    path: &'a str,
    is_leaf: bool,
}

impl Registration<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Space separated names from the root down to this command.
    #[must_use]
    pub fn command_path(&self) -> &str {
        self.path
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Adds a flag visible to this command only.
    pub fn flag(&mut self, arg: Arg) -> &mut Self {
        self.update(|cmd| cmd.arg(arg))
    }

    /// Adds a flag visible to this command and every command below it.
    pub fn persistent_flag(&mut self, arg: Arg) -> &mut Self {
        self.update(|cmd| cmd.arg(arg.global(true)))
    }

    pub fn about(&mut self, about: impl Into<String>) -> &mut Self {
        let about = about.into();
        self.meta.about = Some(about.clone());
        self.update(|cmd| cmd.about(about))
    }

    pub fn long_about(&mut self, long_about: impl Into<String>) -> &mut Self {
        let long_about = long_about.into();
        self.update(|cmd| cmd.long_about(long_about))
    }

    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        self.meta.aliases.push(alias.clone());
        self.update(|cmd| cmd.visible_alias(alias))
    }

    pub fn aliases<I, S>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for alias in aliases {
            self.alias(alias);
        }
        self
    }

    /// Hides the command from help output and from suggestions.
    pub fn hide(&mut self, hidden: bool) -> &mut Self {
        self.meta.hidden = hidden;
        self.update(|cmd| cmd.hide(hidden))
    }

    /// Turns off "Did you mean this?" hints for unknown sub commands of this command.
    pub fn disable_suggestions(&mut self, disabled: bool) -> &mut Self {
        self.meta.suggestions = !disabled;
        self
    }

    pub fn suggestions_minimum_distance(&mut self, distance: usize) -> &mut Self {
        self.meta.suggestions_minimum_distance = distance;
        self
    }

    /// Names that should always suggest this command, regardless of distance.
    pub fn suggest_for<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.suggest_for.extend(names.into_iter().map(Into::into));
        self
    }

    /// Direct access to the underlying `clap::Command`. The command keeps the
    /// descriptor's name; renaming it fails construction.
    pub fn configure(&mut self, f: impl FnOnce(clap::Command) -> clap::Command) -> &mut Self {
        self.update(f)
    }

    fn update(&mut self, f: impl FnOnce(clap::Command) -> clap::Command) -> &mut Self {
        self.command = f(std::mem::take(&mut self.command));
        self
    }
}

/// Compiles every node of `tree`, root first, and returns the root command.
///
/// # Errors
///
/// Returns the first failing `init` hook as `BuildError::Register`, or a
/// `BuildError` for reserved argument ids, clashing flag names, renamed
/// commands and clashing sibling aliases.
pub fn compile(tree: &mut Tree) -> Result<clap::Command, BuildError> {
    let root = compile_node(tree, NodeId::ROOT, &[])?;
    debug!("Compiled {} commands", tree.len());
    Ok(root.no_binary_name(true))
}

/// Names of one flag visible on a command
#[derive(Clone, Debug)]
struct FlagName {
    id: String,
    short: Option<char>,
    long: Option<String>,
    global: bool,
}

impl FlagName {
    fn new(arg: &Arg) -> Self {
        Self {
            id: arg.get_id().as_str().to_string(),
            short: arg.get_short(),
            long: arg.get_long().map(str::to_string),
            global: arg.is_global_set(),
        }
    }

    fn clash(&self, other: &FlagName) -> Option<String> {
        if self.short.is_some() && self.short == other.short {
            return self.short.map(|c| format!("-{c}"));
        }
        if self.long.is_some() && self.long == other.long {
            return self.long.as_ref().map(|l| format!("--{l}"));
        }
        None
    }
}

/// Flags visible on `command`: its own, then the persistent flags of its
/// ancestors that it does not override by id.
fn visible_flags(
    command: &clap::Command,
    inherited: &[FlagName],
    path: &str,
) -> Result<Vec<FlagName>, BuildError> {
    let duplicate = |flag: String, taken_by: &FlagName| BuildError::DuplicateFlag {
        flag,
        path: path.to_string(),
        taken_by: taken_by.id.clone(),
    };

    let mut visible: Vec<FlagName> = Vec::new();
    for arg in command.get_arguments().filter(|a| !a.is_positional()) {
        let flag = FlagName::new(arg);
        for other in &visible {
            if other.id == flag.id {
                return Err(duplicate(flag.id.clone(), other));
            }
            if let Some(name) = flag.clash(other) {
                return Err(duplicate(name, other));
            }
        }
        visible.push(flag);
    }
    for parent in inherited {
        if visible.iter().any(|f| f.id == parent.id) {
            continue;
        }
        if let Some((name, own)) = visible.iter().find_map(|f| f.clash(parent).map(|n| (n, f))) {
            return Err(BuildError::DuplicateFlag {
                flag: name,
                path: path.to_string(),
                taken_by: format!("{} (inherited {})", own.id, parent.id),
            });
        }
        visible.push(parent.clone());
    }
    Ok(visible)
}

/// Gives way to user flags named like the automatic help flag. A taken `-h`
/// leaves help on `--help` only; a taken `--help` (or id `help`) drops it.
fn yield_help_flag(command: clap::Command, visible: &[FlagName], path: &str) -> clap::Command {
    if visible
        .iter()
        .any(|f| f.id == HELP_ID || f.long.as_deref() == Some(HELP_ID))
    {
        debug!("'{path}' defines its own --help");
        return command.disable_help_flag(true);
    }
    if visible.iter().any(|f| f.short == Some('h')) {
        debug!("'{path}' uses -h, help stays on --help");
        return command.disable_help_flag(true).arg(
            Arg::new(HELP_ID)
                .long(HELP_ID)
                .action(ArgAction::Help)
                .help("Print help"),
        );
    }
    command
}

fn compile_node(tree: &mut Tree, id: NodeId, inherited: &[FlagName]) -> Result<clap::Command, BuildError> {
    let children = tree.data(id).children.clone();
    let is_leaf = children.is_empty();

    let (mut command, persistent) = {
        let data = tree.data_mut(id);
        let usage = if is_leaf {
            format!("{} [flags] [args]", data.path)
        } else {
            format!("{} [command] [flags]", data.path)
        };
        trace!("Compiling '{}'", data.path);
        data.meta.usage.clone_from(&usage);

        let mut reg = Registration {
            command: clap::Command::new(data.name.clone())
                .override_usage(usage)
                .disable_help_subcommand(true),
            meta: &mut data.meta,
            name: &data.name,
            path: &data.path,
            is_leaf,
        };
        if let Err(source) = data.command.get_mut().init(&mut reg) {
            warn!("Registering '{}' failed: {source}", data.path);
            return Err(BuildError::Register {
                path: data.path.clone(),
                source,
            });
        }
        let command = reg.command;
        data.meta.compiled = true;

        if command.get_name() != data.name {
            return Err(BuildError::Renamed {
                path: data.path.clone(),
                renamed: command.get_name().to_string(),
            });
        }
        if command.get_arguments().any(|a| a.get_id() == ARGS_ID) {
            return Err(BuildError::ReservedArgument {
                path: data.path.clone(),
                id: ARGS_ID,
            });
        }
        let visible = visible_flags(&command, inherited, &data.path)?;
        let command = yield_help_flag(command, &visible, &data.path).arg(
            Arg::new(ARGS_ID)
                .num_args(1..)
                .action(ArgAction::Append)
                .value_name("ARGS")
                .hide(true),
        );
        let persistent: Vec<FlagName> = visible.into_iter().filter(|f| f.global).collect();
        (command, persistent)
    };

    let mut taken: HashMap<String, NodeId> = HashMap::new();
    for child in children {
        let compiled = compile_node(tree, child, &persistent)?;
        let data = tree.data(child);
        for name in std::iter::once(&data.name).chain(&data.meta.aliases) {
            if taken.insert(name.clone(), child).is_some_and(|other| other != child) {
                return Err(BuildError::DuplicateName {
                    name: name.clone(),
                    parent: tree.data(id).path.clone(),
                });
            }
        }
        command = command.subcommand(compiled);
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use crate::command::CliCommand;
    use crate::context::Context;
    use crate::node::Node;

    #[derive(Default)]
    struct Cmd {
        name: &'static str,
        aliases: Vec<&'static str>,
        fail: bool,
        reserve: bool,
        rename: Option<&'static str>,
        flags: Vec<Arg>,
        persistent: Vec<Arg>,
        commands: Vec<Box<dyn CliCommand>>,
    }

    impl CliCommand for Cmd {
        fn name(&self) -> &str {
            self.name
        }

        fn commands(&mut self) -> Vec<Box<dyn CliCommand>> {
            std::mem::take(&mut self.commands)
        }

        fn init(&mut self, reg: &mut Registration<'_>) -> Result<(), BoxError> {
            if self.fail {
                return Err(format!("cannot register {}", reg.command_path()).into());
            }
            if self.reserve {
                reg.flag(Arg::new(ARGS_ID).long("args"));
            }
            if let Some(renamed) = self.rename {
                reg.configure(|cmd| cmd.name(renamed));
            }
            for arg in &self.flags {
                reg.flag(arg.clone());
            }
            for arg in &self.persistent {
                reg.persistent_flag(arg.clone());
            }
            let verbose = format!("{}-verbose", self.name);
            reg.about(format!("the {} command", self.name))
                .aliases(self.aliases.iter().copied())
                .persistent_flag(
                    Arg::new(verbose.clone())
                        .long(verbose)
                        .action(ArgAction::SetTrue),
                );
            Ok(())
        }

        fn run(&mut self, _ctx: &Context, _node: &Node<'_>, _args: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn tree(commands: Vec<Box<dyn CliCommand>>) -> Tree {
        Tree::build(Box::new(Cmd {
            name: "root",
            commands,
            ..Cmd::default()
        }))
        .unwrap()
    }

    #[test]
    fn test_usage_lines() {
        let mut tree = tree(vec![Box::new(Cmd {
            name: "foo",
            commands: vec![Box::new(Cmd {
                name: "bar",
                ..Cmd::default()
            })],
            ..Cmd::default()
        })]);
        compile(&mut tree).unwrap();
        assert_eq!(tree.root().usage(), "root [command] [flags]");
        assert_eq!(tree.find(&["foo"]).unwrap().usage(), "root foo [command] [flags]");
        assert_eq!(tree.find(&["foo", "bar"]).unwrap().usage(), "root foo bar [flags] [args]");
    }

    #[test]
    fn test_metadata_recorded() {
        let mut tree = tree(vec![Box::new(Cmd {
            name: "foo",
            aliases: vec!["f", "fo"],
            ..Cmd::default()
        })]);
        let cli = compile(&mut tree).unwrap();
        let foo = tree.find(&["f"]).unwrap();
        assert_eq!(foo.name(), "foo");
        assert_eq!(foo.about(), Some("the foo command"));
        assert_eq!(foo.aliases(), ["f", "fo"]);
        assert!(cli.find_subcommand("fo").is_some());
    }

    #[test]
    fn test_register_failure_aborts() {
        let mut tree = tree(vec![
            Box::new(Cmd {
                name: "foo",
                fail: true,
                ..Cmd::default()
            }),
            Box::new(Cmd {
                name: "bar",
                ..Cmd::default()
            }),
        ]);
        match compile(&mut tree) {
            Err(BuildError::Register { path, source }) => {
                assert_eq!(path, "root foo");
                assert_eq!(source.to_string(), "cannot register root foo");
            }
            other => panic!("Expected Register error, got: {other:?}"),
        }
        assert!(!tree.find(&["bar"]).unwrap().is_compiled());
    }

    #[test]
    fn test_reserved_argument_rejected() {
        let mut tree = tree(vec![Box::new(Cmd {
            name: "foo",
            reserve: true,
            ..Cmd::default()
        })]);
        assert!(matches!(
            compile(&mut tree),
            Err(BuildError::ReservedArgument { id: "args", .. })
        ));
    }

    #[test]
    fn test_alias_clashing_with_sibling_rejected() {
        let mut tree = tree(vec![
            Box::new(Cmd {
                name: "foo",
                aliases: vec!["bar"],
                ..Cmd::default()
            }),
            Box::new(Cmd {
                name: "bar",
                ..Cmd::default()
            }),
        ]);
        match compile(&mut tree) {
            Err(BuildError::DuplicateName { name, parent }) => {
                assert_eq!(name, "bar");
                assert_eq!(parent, "root");
            }
            other => panic!("Expected DuplicateName, got: {other:?}"),
        }
    }

    fn host() -> Arg {
        Arg::new("host").long("host").short('h')
    }

    #[test]
    fn test_short_h_moves_help_to_long_only() {
        let mut tree = Tree::build(Box::new(Cmd {
            name: "root",
            flags: vec![host()],
            ..Cmd::default()
        }))
        .unwrap();
        let mut cli = compile(&mut tree).unwrap();
        cli.build();

        let matches = cli.try_get_matches_from_mut(["-h", "example.com"]).unwrap();
        assert_eq!(matches.get_one::<String>("host").unwrap(), "example.com");

        let err = cli.try_get_matches_from_mut(["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_inherited_short_h_moves_help_below() {
        let mut tree = Tree::build(Box::new(Cmd {
            name: "root",
            persistent: vec![host()],
            commands: vec![Box::new(Cmd {
                name: "foo",
                ..Cmd::default()
            })],
            ..Cmd::default()
        }))
        .unwrap();
        let mut cli = compile(&mut tree).unwrap();
        cli.build();

        let matches = cli
            .try_get_matches_from_mut(["foo", "-h", "example.com"])
            .unwrap();
        let foo = matches.subcommand_matches("foo").unwrap();
        assert_eq!(foo.get_one::<String>("host").unwrap(), "example.com");

        let err = cli.try_get_matches_from_mut(["foo", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_own_help_flag_replaces_generated_one() {
        let mut tree = Tree::build(Box::new(Cmd {
            name: "root",
            flags: vec![Arg::new("help").long("help").action(ArgAction::SetTrue)],
            ..Cmd::default()
        }))
        .unwrap();
        let mut cli = compile(&mut tree).unwrap();
        cli.build();

        let matches = cli.try_get_matches_from_mut(["--help"]).unwrap();
        assert!(matches.get_flag("help"));
    }

    #[test]
    fn test_flag_clashing_with_inherited_rejected() {
        let mut tree = Tree::build(Box::new(Cmd {
            name: "root",
            persistent: vec![host()],
            commands: vec![Box::new(Cmd {
                name: "foo",
                flags: vec![Arg::new("hidden").long("hidden").short('h')],
                ..Cmd::default()
            })],
            ..Cmd::default()
        }))
        .unwrap();
        match compile(&mut tree) {
            Err(BuildError::DuplicateFlag { flag, path, .. }) => {
                assert_eq!(flag, "-h");
                assert_eq!(path, "root foo");
            }
            other => panic!("Expected DuplicateFlag, got: {other:?}"),
        }
    }

    #[test]
    fn test_same_flag_twice_rejected() {
        let mut tree = Tree::build(Box::new(Cmd {
            name: "root",
            flags: vec![host(), Arg::new("host-name").long("host")],
            ..Cmd::default()
        }))
        .unwrap();
        assert!(matches!(
            compile(&mut tree),
            Err(BuildError::DuplicateFlag { flag, .. }) if flag == "--host"
        ));
    }

    #[test]
    fn test_renamed_command_rejected() {
        let mut tree = tree(vec![Box::new(Cmd {
            name: "foo",
            rename: Some("x"),
            ..Cmd::default()
        })]);
        match compile(&mut tree) {
            Err(BuildError::Renamed { path, renamed }) => {
                assert_eq!(path, "root foo");
                assert_eq!(renamed, "x");
            }
            other => panic!("Expected Renamed, got: {other:?}"),
        }
    }
}
