use std::sync::OnceLock;

use crate::{
    graph::Graph,
    node::{NodeId, ProviderNode},
    provider::Scope,
};

/// Decides in which context the instances of a node live
///
/// - static: no request scoped provider in the dependency tree, the node is a process singleton
/// - durable: request bound, but every request bound part of the tree opted into durability
///
/// Results are memoized on the nodes, so this must only run on a sealed graph.
#[derive(Clone, Copy)]
pub(crate) struct ScopeClassifier<'g> {
    graph: &'g Graph,
}

#[derive(Clone, Copy)]
enum Tree {
    Static,
    Durable,
}

/// Result of classifying a node
///
/// `assumed` is the lowest position on the lookup path whose verdict was assumed to break a
/// cycle. A verdict is only final once that node is done.
struct Verdict {
    value: bool,
    assumed: Option<usize>,
}

impl<'g> ScopeClassifier<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        ScopeClassifier { graph }
    }

    pub(crate) fn is_tree_static(self, node: NodeId) -> bool {
        self.classify(Tree::Static, node, &mut Vec::new()).value
    }

    pub(crate) fn is_tree_durable(self, node: NodeId) -> bool {
        self.classify(Tree::Durable, node, &mut Vec::new()).value
    }

    fn classify(self, tree: Tree, id: NodeId, visiting: &mut Vec<NodeId>) -> Verdict {
        let node = self.graph.node(id);
        let memo = Self::memo(tree, node);
        if let Some(value) = memo.get() {
            return Verdict {
                value: *value,
                assumed: None,
            };
        }

        if let Some(value) = self.leaf(tree, node) {
            let _ = memo.set(value);
            return Verdict {
                value,
                assumed: None,
            };
        }

        // A node already on the path does not add anything, which breaks the recursion
        if let Some(position) = visiting.iter().position(|visited| *visited == id) {
            return Verdict {
                value: true,
                assumed: Some(position),
            };
        }

        let position = visiting.len();
        visiting.push(id);

        let mut value = true;
        let mut assumed: Option<usize> = None;
        for link in self.graph.links(id) {
            let Some(dependency) = link.node else {
                continue;
            };
            if !self.considers(tree, dependency) {
                continue;
            }

            let verdict = self.classify(tree, dependency, visiting);
            if !verdict.value {
                value = false;
                break;
            }
            assumed = match (assumed, verdict.assumed) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        visiting.pop();

        // false is final, true only if no node above this one was assumed
        match assumed {
            Some(above) if value && above < position => Verdict {
                value,
                assumed: Some(above),
            },
            _ => {
                let _ = memo.set(value);
                Verdict {
                    value,
                    assumed: None,
                }
            }
        }
    }

    fn memo(tree: Tree, node: &ProviderNode) -> &OnceLock<bool> {
        match tree {
            Tree::Static => &node.is_static,
            Tree::Durable => &node.is_durable,
        }
    }

    /// Verdicts that don't depend on the dependencies
    fn leaf(self, tree: Tree, node: &ProviderNode) -> Option<bool> {
        match tree {
            Tree::Static => (node.scope == Scope::Request).then_some(false),
            Tree::Durable => {
                if node.scope == Scope::Request {
                    Some(node.durable)
                } else if self.is_tree_static(node.id) {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }

    /// Static dependencies never make a tree non durable
    fn considers(self, tree: Tree, dependency: NodeId) -> bool {
        match tree {
            Tree::Static => true,
            Tree::Durable => !self.is_tree_static(dependency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ScopeClassifier;
    use crate::{
        builder::ContainerBuilder,
        container::Container,
        module::ModuleDefinition,
        node::NodeId,
        provider::{Dependency, Provider, Scope},
        types::Token,
    };

    fn named(name: &'static str, dependencies: &[&'static str]) -> Provider {
        let dependencies = dependencies.iter().map(|d| Dependency::token(*d)).collect();
        Provider::class_with(dependencies, |_| Ok::<_, std::convert::Infallible>(()))
            .with_token(name)
    }

    fn build(providers: Vec<Provider>) -> Container {
        let mut builder = ContainerBuilder::new();
        let mut module = ModuleDefinition::new("ScopeModule");
        for provider in providers {
            module = module.provider(provider);
        }
        builder.register_module(module).unwrap();
        builder.build()
    }

    fn id(container: &Container, name: &'static str) -> NodeId {
        container.graph().find_declaring(&Token::name(name)).unwrap()
    }

    #[test]
    fn request_scope_bubbles_up() {
        let container = build(vec![
            named("config", &[]),
            named("request", &[]).scope(Scope::Request),
            named("service", &["config", "request"]),
            named("controller", &["service"]),
        ]);
        let classifier = ScopeClassifier::new(container.graph());

        assert!(classifier.is_tree_static(id(&container, "config")));
        assert!(!classifier.is_tree_static(id(&container, "request")));
        assert!(!classifier.is_tree_static(id(&container, "service")));
        assert!(!classifier.is_tree_static(id(&container, "controller")));
    }

    #[test]
    fn cycles_do_not_hide_request_scope() {
        // b is classified while a is still on the path - its verdict must not be memoized early
        let container = build(vec![
            named("a", &["b"]),
            named("b", &["c"]),
            named("c", &["b", "request"]),
            named("request", &[]).scope(Scope::Request),
            named("d", &["e"]),
            named("e", &["d"]),
        ]);
        let classifier = ScopeClassifier::new(container.graph());

        assert!(!classifier.is_tree_static(id(&container, "a")));
        assert!(!classifier.is_tree_static(id(&container, "b")));
        assert!(!classifier.is_tree_static(id(&container, "c")));
        assert!(classifier.is_tree_static(id(&container, "d")));
        assert!(classifier.is_tree_static(id(&container, "e")));
    }

    #[test]
    fn memoized_verdicts_stay_correct_inside_cycles() {
        // x -> y -> x and y -> request; classifying y first assumes x while x is on the path
        let container = build(vec![
            named("x", &["y"]),
            named("y", &["x", "z"]),
            named("z", &["y", "request"]),
            named("request", &[]).scope(Scope::Request),
        ]);
        let classifier = ScopeClassifier::new(container.graph());

        assert!(!classifier.is_tree_static(id(&container, "x")));
        assert!(!classifier.is_tree_static(id(&container, "z")));
        assert!(!classifier.is_tree_static(id(&container, "y")));
    }

    #[test]
    fn durable_needs_every_request_bound_part_to_opt_in() {
        let container = build(vec![
            named("static", &[]),
            named("tenant", &[]).scope(Scope::Request).durable(),
            named("request", &[]).scope(Scope::Request),
            named("tenant_service", &["tenant", "static"]),
            named("mixed_service", &["tenant", "request"]),
        ]);
        let classifier = ScopeClassifier::new(container.graph());

        assert!(!classifier.is_tree_durable(id(&container, "static")));
        assert!(classifier.is_tree_durable(id(&container, "tenant")));
        assert!(!classifier.is_tree_durable(id(&container, "request")));
        assert!(classifier.is_tree_durable(id(&container, "tenant_service")));
        assert!(!classifier.is_tree_durable(id(&container, "mixed_service")));
    }
}
