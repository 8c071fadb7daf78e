//! Initialization chain: `pre_run` from the root down to the invoked command

use log::{debug, trace, warn};

use crate::BoxError;
use crate::exec::Invocation;
use crate::node::Node;
use crate::tree::Tree;

/// Where a node on the invoked path got to during the last execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitState {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
    Failed,
}

/// Runs `pre_run` on every node of `invocation`'s path, root first.
///
/// Returns the state of each node on the path and the first hook error. Nodes
/// after a failing one stay `Uninitialized`.
pub(crate) fn run_chain(tree: &Tree, invocation: &Invocation) -> (Vec<InitState>, Result<(), BoxError>) {
    let path = invocation.path();
    let mut states = vec![InitState::Uninitialized; path.len()];
    let Some(&runner_id) = path.last() else {
        return (states, Ok(()));
    };
    let runner = Node::new(tree, runner_id, Some(invocation));

    for (i, &id) in path.iter().enumerate() {
        let this = Node::new(tree, id, Some(invocation));
        states[i] = InitState::Initializing;
        trace!("pre_run '{}' for '{}'", this.command_path(), runner.command_path());

        let result = match tree.data(id).command.try_borrow_mut() {
            Ok(mut command) => command.pre_run(&this, &runner),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("pre_run of '{}' failed: {e}", this.command_path());
            states[i] = InitState::Failed;
            return (states, Err(e));
        }
        states[i] = InitState::Initialized;
    }
    debug!("Initialized {} commands for '{}'", states.len(), runner.command_path());
    (states, Ok(()))
}
