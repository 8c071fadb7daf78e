//! Executing a compiled command tree

use clap::ArgMatches;
use log::{debug, trace, warn};

use crate::command::CliCommand;
use crate::compile::{ARGS_ID, compile};
use crate::context::Context;
use crate::error::{BuildError, CommandError, ExecError};
use crate::lifecycle::{InitState, run_chain};
use crate::node::Node;
use crate::suggest;
use crate::tree::{NodeId, Tree};

/// Everything resolved for one call to [`Executor::execute`]
#[derive(Debug)]
pub struct Invocation {
    context: Context,
    path: Vec<NodeId>,
    matches: Vec<ArgMatches>,
    args: Vec<String>,
    states: Vec<InitState>,
}

impl Invocation {
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Nodes from the root down to the invoked command.
    #[must_use]
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Positional arguments handed to `run`.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// How far `id` got through the initialization chain. Nodes off the invoked
    /// path are always `Uninitialized`.
    #[must_use]
    pub fn init_state(&self, id: NodeId) -> InitState {
        self.position(id)
            .and_then(|i| self.states.get(i).copied())
            .unwrap_or_default()
    }

    pub(crate) fn matches_for(&self, id: NodeId) -> Option<&ArgMatches> {
        self.position(id).and_then(|i| self.matches.get(i))
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.path.iter().position(|p| *p == id)
    }
}

/// A compiled command tree, ready to be executed any number of times
pub struct Executor {
    tree: Tree,
    cli: clap::Command,
    last: Option<Invocation>,
}

impl Executor {
    /// Builds and compiles the tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a `BuildError` if a name is invalid or duplicated, or if a
    /// descriptor's `init` hook fails.
    pub fn new(root: impl CliCommand + 'static) -> Result<Executor, BuildError> {
        Self::from_boxed(Box::new(root))
    }

    /// Like [`Executor::new`], for a root that is already boxed.
    ///
    /// # Errors
    ///
    /// See [`Executor::new`].
    pub fn from_boxed(root: Box<dyn CliCommand>) -> Result<Executor, BuildError> {
        let mut tree = Tree::build(root)?;
        let mut cli = compile(&mut tree)?;
        cli.build();
        debug!("Executor ready for '{}'", tree.root().name());
        Ok(Executor {
            tree,
            cli,
            last: None,
        })
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The compiled parser, e.g. to render help.
    #[must_use]
    pub fn cli(&self) -> &clap::Command {
        &self.cli
    }

    /// What the most recent `execute` call resolved, if it got past argument parsing.
    #[must_use]
    pub fn last_invocation(&self) -> Option<&Invocation> {
        self.last.as_ref()
    }

    /// Parses `args`, runs `pre_run` from the root down to the invoked command
    /// and then its `run`. `args` never include the program name; an empty list
    /// invokes the root.
    ///
    /// # Errors
    ///
    /// * `ExecError::Command` when the arguments do not fit the tree (including
    ///   requests for help output).
    /// * `ExecError::PreRun` with the error of the first failing `pre_run`.
    /// * `ExecError::Run` with the error returned by `run`.
    pub fn execute<I>(&mut self, ctx: &Context, args: I) -> Result<Node<'_>, ExecError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        debug!("Executing '{}' with {args:?}", self.tree.root().name());
        self.last = None;

        let matches = self.cli.try_get_matches_from_mut(args.iter()).map_err(|e| {
            debug!("Argument parsing stopped: {:?}", e.kind());
            CommandError::from(e)
        })?;

        let invocation = self.resolve(ctx, matches)?;
        let (states, chained) = run_chain(&self.tree, &invocation);
        let result = chained.map_err(ExecError::PreRun).and_then(|()| {
            let id = *invocation.path.last().unwrap_or(&NodeId::ROOT);
            let node = Node::new(&self.tree, id, Some(&invocation));
            trace!("run '{}' with {:?}", node.command_path(), invocation.args);
            let mut command = self
                .tree
                .data(id)
                .command
                .try_borrow_mut()
                .map_err(|e| ExecError::Run(e.into()))?;
            command
                .run(ctx, &node, &invocation.args)
                .map_err(ExecError::Run)
        });

        let id = *invocation.path.last().unwrap_or(&NodeId::ROOT);
        self.last = Some(Invocation {
            states,
            ..invocation
        });
        result?;
        Ok(Node::new(&self.tree, id, self.last.as_ref()))
    }

    /// Maps the parser's sub command chain onto tree nodes and rejects
    /// leftover words where a sub command was expected.
    fn resolve(&self, ctx: &Context, matches: ArgMatches) -> Result<Invocation, CommandError> {
        let mut path = vec![NodeId::ROOT];
        let mut per_node = Vec::new();
        let mut current = matches;

        while let Some((name, sub)) = current.remove_subcommand() {
            let parent = path[path.len() - 1];
            let Some(child) = self.tree.find_child(parent, &name) else {
                let parent = self.tree.get(parent);
                return Err(CommandError::unknown_command(&name, parent.command_path(), String::new()));
            };
            per_node.push(current);
            path.push(child);
            current = sub;
        }

        let args: Vec<String> = current
            .try_get_many::<String>(ARGS_ID)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        per_node.push(current);

        let node = self.tree.get(path[path.len() - 1]);
        if let (false, Some(first)) = (node.is_leaf(), args.first()) {
            let suggestions = if node.meta().suggestions {
                suggest::format_block(&suggest::suggestions_for(&node, first))
            } else {
                String::new()
            };
            warn!("Unknown command '{first}' for '{}'", node.command_path());
            return Err(CommandError::unknown_command(first, node.command_path(), suggestions));
        }

        debug!("Resolved '{}' with {} args", node.command_path(), args.len());
        Ok(Invocation {
            context: ctx.clone(),
            path,
            matches: per_node,
            args,
            states: Vec::new(),
        })
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}
