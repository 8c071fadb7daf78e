//! Read-only view of a tree node
//!
//! A [`Node`] is what descriptors see of the tree. Outside an execution it
//! only exposes structure and compiled metadata; during and after an
//! execution it also exposes the parsed arguments and the caller's context.

use std::any::Any;
use std::cell::Ref;
use std::fmt;

use clap::ArgMatches;

use crate::command::CliCommand;
use crate::context::Context;
use crate::exec::Invocation;
use crate::tree::{NodeData, NodeId, NodeMeta, Tree};

#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a Tree,
    id: NodeId,
    invocation: Option<&'a Invocation>,
}

impl<'a> Node<'a> {
    pub(crate) fn new(tree: &'a Tree, id: NodeId, invocation: Option<&'a Invocation>) -> Self {
        Self {
            tree,
            id,
            invocation,
        }
    }

    fn data(&self) -> &'a NodeData {
        self.tree.data(self.id)
    }

    pub(crate) fn meta(&self) -> &'a NodeMeta {
        &self.data().meta
    }

    fn relative(&self, id: NodeId) -> Node<'a> {
        Node::new(self.tree, id, self.invocation)
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Space separated names from the root down to this node, e.g. `root bar baz`.
    #[must_use]
    pub fn command_path(&self) -> &'a str {
        &self.data().path
    }

    /// Number of ancestors; 0 for the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.data().depth
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.data().children.is_empty()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|p| self.relative(p))
    }

    #[must_use]
    pub fn root(&self) -> Node<'a> {
        self.relative(NodeId::ROOT)
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        let invocation = self.invocation;
        self.data()
            .children
            .iter()
            .map(move |c| Node::new(tree, *c, invocation))
    }

    #[must_use]
    pub fn usage(&self) -> &'a str {
        &self.meta().usage
    }

    #[must_use]
    pub fn about(&self) -> Option<&'a str> {
        self.meta().about.as_deref()
    }

    #[must_use]
    pub fn aliases(&self) -> &'a [String] {
        &self.meta().aliases
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.meta().hidden
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.meta().compiled
    }

    /// The context of the current (or last) execution.
    #[must_use]
    pub fn context(&self) -> Option<&'a Context> {
        self.invocation.map(Invocation::context)
    }

    /// Parsed arguments for this node. `None` outside an execution or when the
    /// node is not on the invoked path.
    #[must_use]
    pub fn matches(&self) -> Option<&'a ArgMatches> {
        self.invocation.and_then(|inv| inv.matches_for(self.id))
    }

    /// Value of a flag as seen by this node. Persistent flags set further down
    /// the path are visible on every ancestor that declared them.
    #[must_use]
    pub fn get_one<T>(&self, id: &str) -> Option<&'a T>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        self.matches()?.try_get_one::<T>(id).ok().flatten()
    }

    /// All values of a flag that accepts several.
    #[must_use]
    pub fn get_many<T>(&self, id: &str) -> Vec<&'a T>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        self.matches()
            .and_then(|m| m.try_get_many::<T>(id).ok().flatten())
            .map(|values| values.collect())
            .unwrap_or_default()
    }

    /// Value of a boolean switch; false when unset or unknown.
    #[must_use]
    pub fn get_flag(&self, id: &str) -> bool {
        self.get_one::<bool>(id).copied().unwrap_or(false)
    }

    /// Borrows the descriptor. Fails while the descriptor is inside one of its own hooks.
    #[must_use]
    pub fn command(&self) -> Option<Ref<'a, Box<dyn CliCommand>>> {
        self.data().command.try_borrow().ok()
    }

    /// Borrows the descriptor as its concrete type.
    ///
    /// Returns `None` if the descriptor is a different type, or if it is
    /// currently running (a hook cannot look at itself through a node).
    #[must_use]
    pub fn downcast<T: CliCommand>(&self) -> Option<Ref<'a, T>> {
        let command = self.command()?;
        Ref::filter_map(command, |c| (**c).downcast_ref::<T>()).ok()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("path", &self.command_path())
            .finish_non_exhaustive()
    }
}
