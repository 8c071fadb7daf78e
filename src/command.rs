//! The command descriptor contract
//!
//! A command tree is declared by implementing [`CliCommand`] for each kind of
//! command and nesting instances through [`CliCommand::commands`]. The tree
//! takes ownership of every descriptor; state a descriptor wants to keep
//! between hooks (captured flag values, references copied from ancestors) lives
//! on the descriptor itself.

use std::any::Any;

use crate::BoxError;
use crate::compile::Registration;
use crate::context::Context;
use crate::node::Node;

/// Access to the concrete type behind a `dyn CliCommand`.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One node of a command tree, as supplied by the user
pub trait CliCommand: AsAny + Send {
    /// The command name, used as path segment and lookup key. Must be non-empty.
    fn name(&self) -> &str;

    /// Sub commands, in the order they should be listed and matched.
    ///
    /// Called exactly once, while the tree is built; ownership of the returned
    /// descriptors moves into the tree.
    fn commands(&mut self) -> Vec<Box<dyn CliCommand>> {
        Vec::new()
    }

    /// Called once when the tree is compiled. Register flags, about text,
    /// aliases and suggestion settings here.
    ///
    /// # Errors
    ///
    /// Any error aborts construction of the whole tree.
    fn init(&mut self, reg: &mut Registration<'_>) -> Result<(), BoxError> {
        let _ = reg;
        Ok(())
    }

    /// Called on every ancestor of the invoked command and on the invoked
    /// command itself, starting from the root. `this` is the node being
    /// initialized, `runner` the node that will run.
    ///
    /// This is the place to evaluate flags and to copy whatever is needed from
    /// ancestors (see [`Node::downcast`]).
    ///
    /// # Errors
    ///
    /// An error stops the chain; `run` is not called.
    fn pre_run(&mut self, this: &Node<'_>, runner: &Node<'_>) -> Result<(), BoxError> {
        let _ = (this, runner);
        Ok(())
    }

    /// The command execution. Only called on the invoked command.
    ///
    /// # Errors
    ///
    /// The error is handed back to the caller of `execute` unchanged.
    fn run(&mut self, ctx: &Context, node: &Node<'_>, args: &[String]) -> Result<(), BoxError>;
}

impl dyn CliCommand {
    /// Returns the concrete descriptor if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: CliCommand>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns the concrete descriptor mutably if it is a `T`.
    pub fn downcast_mut<T: CliCommand>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    #[must_use]
    pub fn is<T: CliCommand>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf {
        name: String,
    }

    impl CliCommand for Leaf {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&mut self, _ctx: &Context, _node: &Node<'_>, _args: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    struct Other;

    impl CliCommand for Other {
        fn name(&self) -> &str {
            "other"
        }

        fn run(&mut self, _ctx: &Context, _node: &Node<'_>, _args: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_downcast_through_box() {
        let mut boxed: Box<dyn CliCommand> = Box::new(Leaf {
            name: "leaf".to_string(),
        });
        assert!(boxed.is::<Leaf>());
        assert!(!boxed.is::<Other>());
        assert_eq!(boxed.downcast_ref::<Leaf>().map(|l| l.name.as_str()), Some("leaf"));
        assert!(boxed.downcast_ref::<Other>().is_none());

        if let Some(leaf) = boxed.downcast_mut::<Leaf>() {
            leaf.name = "renamed".to_string();
        }
        assert_eq!(boxed.name(), "renamed");
    }

    #[test]
    fn test_default_hooks() {
        let mut other = Other;
        assert!(other.commands().is_empty());
    }
}
