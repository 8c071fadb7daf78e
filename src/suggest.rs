//! "Did you mean this?" hints for mistyped sub commands

use crate::node::Node;

/// Visible children of `node` that look like what the user typed, in declaration order.
///
/// A child qualifies when its Levenshtein distance to `typed` (ignoring case)
/// is within the node's minimum distance, when its name starts with `typed`,
/// or when it lists `typed` in its `suggest_for` names.
#[must_use]
pub fn suggestions_for(node: &Node<'_>, typed: &str) -> Vec<String> {
    let distance = node.meta().suggestions_minimum_distance;
    let typed_lower = typed.to_lowercase();
    let mut suggestions: Vec<String> = Vec::new();

    for child in node.children().filter(|c| !c.is_hidden()) {
        let name_lower = child.name().to_lowercase();
        let close = strsim::levenshtein(&typed_lower, &name_lower) <= distance
            || name_lower.starts_with(&typed_lower);
        let listed = child.meta().suggest_for.iter().any(|s| s == typed);
        if (close || listed) && !suggestions.iter().any(|s| s == child.name()) {
            suggestions.push(child.name().to_string());
        }
    }
    suggestions
}

/// Renders the hint appended to an unknown command message. Empty without candidates.
#[must_use]
pub fn format_block(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n\nDid you mean this?\n");
    for s in suggestions {
        block.push('\t');
        block.push_str(s);
        block.push('\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use clap::Arg;

    use super::*;
    use crate::BoxError;
    use crate::command::CliCommand;
    use crate::compile::{Registration, compile};
    use crate::context::Context;
    use crate::tree::Tree;

    #[derive(Default)]
    struct Cmd {
        name: &'static str,
        hidden: bool,
        suggest_for: Vec<&'static str>,
        distance: Option<usize>,
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
            reg.hide(self.hidden)
                .suggest_for(self.suggest_for.iter().copied())
                .flag(Arg::new("force").long("force"));
            if let Some(distance) = self.distance {
                reg.suggestions_minimum_distance(distance);
            }
            Ok(())
        }

        fn run(&mut self, _ctx: &Context, _node: &Node<'_>, _args: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn leaf(name: &'static str) -> Box<dyn CliCommand> {
        Box::new(Cmd {
            name,
            ..Cmd::default()
        })
    }

    fn compiled(root: Cmd) -> Tree {
        let mut tree = Tree::build(Box::new(root)).unwrap();
        compile(&mut tree).unwrap();
        tree
    }

    #[test]
    fn test_close_names_are_suggested() {
        let tree = compiled(Cmd {
            name: "root",
            commands: vec![leaf("foo"), leaf("bar"), leaf("food")],
            ..Cmd::default()
        });
        assert_eq!(suggestions_for(&tree.root(), "fooo"), ["foo", "food"]);
        assert_eq!(suggestions_for(&tree.root(), "BAZ"), ["bar"]);
        assert!(suggestions_for(&tree.root(), "completely").is_empty());
    }

    #[test]
    fn test_prefix_is_suggested() {
        let tree = compiled(Cmd {
            name: "root",
            commands: vec![leaf("deploy"), leaf("destroy")],
            ..Cmd::default()
        });
        assert_eq!(suggestions_for(&tree.root(), "dep"), ["deploy"]);
    }

    #[test]
    fn test_hidden_children_are_skipped() {
        let tree = compiled(Cmd {
            name: "root",
            commands: vec![
                Box::new(Cmd {
                    name: "secret",
                    hidden: true,
                    ..Cmd::default()
                }),
                leaf("serve"),
            ],
            ..Cmd::default()
        });
        assert_eq!(suggestions_for(&tree.root(), "secrets"), Vec::<String>::new());
        assert_eq!(suggestions_for(&tree.root(), "serv"), ["serve"]);
    }

    #[test]
    fn test_suggest_for_and_distance() {
        let tree = compiled(Cmd {
            name: "root",
            distance: Some(0),
            commands: vec![
                Box::new(Cmd {
                    name: "remove",
                    suggest_for: vec!["delete"],
                    ..Cmd::default()
                }),
                leaf("list"),
            ],
            ..Cmd::default()
        });
        assert_eq!(suggestions_for(&tree.root(), "delete"), ["remove"]);
        assert!(suggestions_for(&tree.root(), "lsit").is_empty());
    }

    #[test]
    fn test_format_block() {
        assert_eq!(format_block(&[]), "");
        assert_eq!(
            format_block(&["foo".to_string(), "food".to_string()]),
            "\n\nDid you mean this?\n\tfoo\n\tfood\n"
        );
    }
}
