//! Arena-backed command tree
//!
//! The tree owns every descriptor. Nodes refer to each other by [`NodeId`];
//! the root is always the first node, so every node reaches it without a
//! stored back-reference.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use log::{debug, trace};

use crate::command::CliCommand;
use crate::error::BuildError;
use crate::node::Node;

/// Index of a node inside its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata recorded when a node is compiled
#[derive(Debug, Clone)]
pub(crate) struct NodeMeta {
    pub usage: String,
    pub about: Option<String>,
    pub aliases: Vec<String>,
    pub hidden: bool,
    pub suggestions: bool,
    pub suggestions_minimum_distance: usize,
    pub suggest_for: Vec<String>,
    pub compiled: bool,
}

/// Distance used for suggestions unless a command sets its own
pub const DEFAULT_SUGGESTION_DISTANCE: usize = 2;

impl Default for NodeMeta {
    fn default() -> Self {
        Self {
            usage: String::new(),
            about: None,
            aliases: Vec::new(),
            hidden: false,
            suggestions: true,
            suggestions_minimum_distance: DEFAULT_SUGGESTION_DISTANCE,
            suggest_for: Vec::new(),
            compiled: false,
        }
    }
}

pub(crate) struct NodeData {
    pub name: String,
    pub path: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub command: RefCell<Box<dyn CliCommand>>,
    pub meta: NodeMeta,
}

/// A command tree built from a root descriptor
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    /// Builds the tree depth-first, preserving the declared order of children.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::InvalidName` for blank names or names starting with
    /// `-`, and `BuildError::DuplicateName` when two siblings share a name.
    pub fn build(root: Box<dyn CliCommand>) -> Result<Tree, BuildError> {
        let mut tree = Tree { nodes: Vec::new() };
        tree.add(root, None)?;
        debug!(
            "Built command tree rooted at '{}' with {} nodes",
            tree.nodes[0].name,
            tree.nodes.len()
        );
        Ok(tree)
    }

    fn add(&mut self, mut command: Box<dyn CliCommand>, parent: Option<NodeId>) -> Result<NodeId, BuildError> {
        let name = command.name().to_string();
        let parent_path = parent.map_or_else(String::new, |p| self.data(p).path.clone());
        validate_name(&name, &parent_path)?;

        let id = NodeId(self.nodes.len());
        let (path, depth) = match parent {
            Some(p) => (format!("{parent_path} {name}"), self.data(p).depth + 1),
            None => (name.clone(), 0),
        };
        trace!("Adding command '{path}' as {id}");

        let children = command.commands();
        self.nodes.push(NodeData {
            name,
            path,
            parent,
            children: Vec::with_capacity(children.len()),
            depth,
            command: RefCell::new(command),
            meta: NodeMeta::default(),
        });

        let mut seen = HashSet::new();
        for child in children {
            if !seen.insert(child.name().to_string()) {
                return Err(BuildError::DuplicateName {
                    name: child.name().to_string(),
                    parent: self.data(id).path.clone(),
                });
            }
            let child_id = self.add(child, Some(id))?;
            self.nodes[id.0].children.push(child_id);
        }
        Ok(id)
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.get(NodeId::ROOT)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Node<'_> {
        assert!(id.0 < self.nodes.len(), "node {id} is not part of this tree");
        Node::new(self, id, None)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order (the order they were declared).
    pub fn iter(&self) -> impl Iterator<Item = Node<'_>> {
        (0..self.nodes.len()).map(|i| self.get(NodeId(i)))
    }

    /// Follows `names` from the root. Aliases registered at compile time are honored.
    #[must_use]
    pub fn find(&self, names: &[&str]) -> Option<Node<'_>> {
        let mut current = NodeId::ROOT;
        for name in names {
            current = self.find_child(current, name)?;
        }
        Some(self.get(current))
    }

    pub(crate) fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let children = &self.data(parent).children;
        children
            .iter()
            .copied()
            .find(|c| self.data(*c).name == name)
            .or_else(|| {
                children
                    .iter()
                    .copied()
                    .find(|c| self.data(*c).meta.aliases.iter().any(|a| a == name))
            })
    }

    /// The chain from the root down to `id`, both inclusive.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::with_capacity(self.data(id).depth + 1);
        let mut current = Some(id);
        while let Some(cd) = current {
            chain.push(cd);
            current = self.data(cd).parent;
        }
        chain.reverse();
        chain
    }

    /// Indented listing of every command name, in declaration order.
    #[must_use]
    pub fn outline(&self) -> String {
        self.nodes
            .iter()
            .map(|n| {
                let mut line = format!("{}{}", "  ".repeat(n.depth), n.name);
                if !n.meta.aliases.is_empty() {
                    line.push_str(&format!(" ({})", n.meta.aliases.join(", ")));
                }
                if let Some(about) = &n.meta.about {
                    line.push_str(&format!(" - {about}"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| &n.path))
            .finish()
    }
}

fn validate_name(name: &str, parent: &str) -> Result<(), BuildError> {
    let reason = if name.trim().is_empty() {
        "name is empty"
    } else if name.starts_with('-') {
        "name starts with '-'"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else {
        return Ok(());
    };
    Err(BuildError::InvalidName {
        name: name.to_string(),
        parent: parent.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use crate::context::Context;

    struct Cmd {
        name: String,
        commands: Vec<Box<dyn CliCommand>>,
    }

    fn cmd(name: &str, commands: Vec<Box<dyn CliCommand>>) -> Box<dyn CliCommand> {
        Box::new(Cmd {
            name: name.to_string(),
            commands,
        })
    }

    impl CliCommand for Cmd {
        fn name(&self) -> &str {
            &self.name
        }

        fn commands(&mut self) -> Vec<Box<dyn CliCommand>> {
            std::mem::take(&mut self.commands)
        }

        fn run(&mut self, _ctx: &Context, _node: &Node<'_>, _args: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn sample() -> Box<dyn CliCommand> {
        cmd(
            "root",
            vec![
                cmd("foo", vec![]),
                cmd("bar", vec![cmd("baz", vec![]), cmd("qux", vec![])]),
            ],
        )
    }

    #[test]
    fn test_build_links_parents_and_paths() {
        let tree = Tree::build(sample()).unwrap();
        assert_eq!(tree.len(), 5);

        let baz = tree.find(&["bar", "baz"]).unwrap();
        assert_eq!(baz.command_path(), "root bar baz");
        assert_eq!(baz.depth(), 2);
        assert_eq!(baz.parent().unwrap().name(), "bar");
        assert_eq!(baz.root().name(), "root");
        assert!(tree.root().parent().is_none());
    }

    #[test]
    fn test_build_preserves_declaration_order() {
        let tree = Tree::build(sample()).unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, ["root", "foo", "bar", "baz", "qux"]);
    }

    #[test]
    fn test_ancestors_root_first() {
        let tree = Tree::build(sample()).unwrap();
        let qux = tree.find(&["bar", "qux"]).unwrap().id();
        let chain: Vec<_> = tree
            .ancestors(qux)
            .into_iter()
            .map(|id| tree.get(id).name().to_string())
            .collect();
        assert_eq!(chain, ["root", "bar", "qux"]);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let result = Tree::build(cmd("root", vec![cmd("foo", vec![]), cmd("foo", vec![])]));
        match result {
            Err(BuildError::DuplicateName { name, parent }) => {
                assert_eq!(name, "foo");
                assert_eq!(parent, "root");
            }
            other => panic!("Expected DuplicateName, got: {other:?}"),
        }
    }

    #[test]
    fn test_same_name_in_different_subtrees_allowed() {
        let tree = Tree::build(cmd(
            "root",
            vec![cmd("a", vec![cmd("list", vec![])]), cmd("b", vec![cmd("list", vec![])])],
        ))
        .unwrap();
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "  ", "-x", "two words"] {
            let result = Tree::build(cmd("root", vec![cmd(name, vec![])]));
            assert!(
                matches!(result, Err(BuildError::InvalidName { .. })),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_outline() {
        let tree = Tree::build(sample()).unwrap();
        insta::assert_snapshot!(tree.outline(), @r"
root
  foo
  bar
    baz
    qux
");
    }
}
