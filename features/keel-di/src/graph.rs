use std::collections::{HashSet, VecDeque};

use crate::{
    errors::ResolutionPath,
    module::{Module, ModuleId},
    node::{NodeId, ProviderNode},
    types::Token,
};

/// A dependency of a node, resolved against the node's module scope
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub(crate) token: Token,
    /// None if the token is not visible from the node's module
    pub(crate) node: Option<NodeId>,
    pub(crate) forward: bool,
    pub(crate) optional: bool,
}

/// The sealed module graph: modules and provider nodes in flat tables
///
/// Edges are ids, never references - cycles are checked by id membership.
pub(crate) struct Graph {
    pub(crate) modules: Vec<Module>,
    pub(crate) nodes: Vec<ProviderNode>,
    /// Module ids ordered by distance, then registration order
    pub(crate) order: Vec<ModuleId>,
}
impl Graph {
    pub(crate) fn new(modules: Vec<Module>, nodes: Vec<ProviderNode>) -> Self {
        let mut order: Vec<ModuleId> = modules.iter().map(|module| module.id).collect();
        order.sort_by_key(|id| (modules[id.0].distance, *id));
        Graph {
            modules,
            nodes,
            order,
        }
    }

    pub(crate) fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub(crate) fn try_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0)
    }

    pub(crate) fn node(&self, id: NodeId) -> &ProviderNode {
        &self.nodes[id.0]
    }

    /// Finds the provider `token` refers to from inside `module`
    ///
    /// Looks at the module's own providers first, then walks the imports breadth first.
    /// An imported module is only entered if it exports the token itself, or re-exports
    /// the module it is imported from.
    pub(crate) fn lookup(&self, module: ModuleId, token: &Token) -> Option<NodeId> {
        let origin = self.module(module);
        if let Some(node) = origin.providers.get(token) {
            return Some(*node);
        }

        let mut visited = HashSet::from([module]);
        let mut queue: VecDeque<ModuleId> = origin.imports.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }

            let imported = self.module(id);
            if imported.exports.contains(token) {
                if let Some(node) = imported.providers.get(token) {
                    return Some(*node);
                }
            }

            // Modules re-exported by the imported module are visible as well
            queue.extend(
                imported
                    .imports
                    .iter()
                    .filter(|child| imported.exports.contains(&self.module(**child).token)),
            );
        }

        None
    }

    /// Finds the first module - in distance order - which declares `token`
    pub(crate) fn find_declaring(&self, token: &Token) -> Option<NodeId> {
        self.order
            .iter()
            .find_map(|id| self.module(*id).providers.get(token).copied())
    }

    /// The dependencies of `node`, looked up once and memoized
    pub(crate) fn links(&self, node: NodeId) -> &[Link] {
        let provider = self.node(node);
        provider.links.get_or_init(|| {
            provider
                .dependencies
                .iter()
                .map(|dependency| {
                    // Forward references are dereferenced here, at lookup time
                    let token = dependency.token.token();
                    Link {
                        node: self.lookup(provider.module, &token),
                        token,
                        forward: dependency.is_forward(),
                        optional: dependency.optional,
                    }
                })
                .collect()
        })
    }

    /// Finds a chain of direct (non forward) edges from `from` to any of `targets`
    ///
    /// The returned chain starts with `from` and ends with the reached target.
    pub(crate) fn find_path(&self, from: NodeId, targets: &[NodeId]) -> Option<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        return search(self, from, targets, &mut visited, &mut chain).then_some(chain);

        fn search(
            graph: &Graph,
            node: NodeId,
            targets: &[NodeId],
            visited: &mut HashSet<NodeId>,
            chain: &mut Vec<NodeId>,
        ) -> bool {
            chain.push(node);
            if chain.len() > 1 && targets.contains(&node) {
                return true;
            }

            if visited.insert(node) {
                for link in graph.links(node).iter().filter(|link| !link.forward) {
                    let Some(next) = link.node else {
                        continue;
                    };
                    if search(graph, next, targets, visited, chain) {
                        return true;
                    }
                }
            }

            chain.pop();
            false
        }
    }

    pub(crate) fn path(&self, ids: impl IntoIterator<Item = NodeId>) -> ResolutionPath {
        ResolutionPath(
            ids.into_iter()
                .map(|id| self.node(id).token.clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::ContainerBuilder,
        module::ModuleDefinition,
        provider::{Dependency, Provider},
        types::Token,
    };

    fn named(name: &'static str, dependencies: Vec<Dependency>) -> Provider {
        Provider::class_with(dependencies, |_| Ok::<_, std::convert::Infallible>(()))
            .with_token(name)
    }

    #[test]
    fn it_only_sees_exported_providers_of_imports() {
        let mut builder = ContainerBuilder::new();
        let shared = builder
            .register_module(
                ModuleDefinition::new("SharedModule")
                    .provider(named("public", vec![]))
                    .provider(named("private", vec![]))
                    .export("public"),
            )
            .unwrap();
        let app = builder
            .register_module(ModuleDefinition::new("AppModule").import(shared))
            .unwrap();
        let container = builder.build();
        let graph = container.graph();

        assert!(graph.lookup(app, &Token::name("public")).is_some());
        assert!(graph.lookup(app, &Token::name("private")).is_none());
        assert!(graph.lookup(shared, &Token::name("private")).is_some());
    }

    #[test]
    fn it_follows_module_re_exports() {
        let mut builder = ContainerBuilder::new();
        let database = builder
            .register_module(
                ModuleDefinition::new("DatabaseModule")
                    .provider(named("connection", vec![]))
                    .export("connection"),
            )
            .unwrap();
        let core = builder
            .register_module(
                ModuleDefinition::new("CoreModule")
                    .import(database)
                    .export("DatabaseModule"),
            )
            .unwrap();
        let hidden = builder
            .register_module(ModuleDefinition::new("HiddenModule").import(database))
            .unwrap();
        let users = builder
            .register_module(ModuleDefinition::new("UsersModule").import(core))
            .unwrap();
        let other = builder
            .register_module(ModuleDefinition::new("OtherModule").import(hidden))
            .unwrap();
        let container = builder.build();
        let graph = container.graph();

        assert!(graph.lookup(users, &Token::name("connection")).is_some());
        assert!(graph.lookup(other, &Token::name("connection")).is_none());
    }

    #[test]
    fn it_survives_import_cycles() {
        let mut builder = ContainerBuilder::new();
        let left = builder
            .register_module(ModuleDefinition::new("Left"))
            .unwrap();
        let right = builder
            .register_module(ModuleDefinition::new("Right").import(left).export("Left"))
            .unwrap();
        builder.add_import(left, right).unwrap();
        builder.add_export(left, "Right").unwrap();
        let container = builder.build();

        assert!(container.graph().lookup(left, &Token::name("missing")).is_none());
    }

    #[test]
    fn it_finds_direct_paths_only() {
        let mut builder = ContainerBuilder::new();
        let module = builder
            .register_module(
                ModuleDefinition::new("CycleModule")
                    .provider(named("a", vec![Dependency::token("b")]))
                    .provider(named("b", vec![Dependency::token("c")]))
                    .provider(named("c", vec![Dependency::forward(|| Token::name("a"))])),
            )
            .unwrap();
        let container = builder.build();
        let graph = container.graph();
        let a = graph.lookup(module, &Token::name("a")).unwrap();
        let b = graph.lookup(module, &Token::name("b")).unwrap();
        let c = graph.lookup(module, &Token::name("c")).unwrap();

        assert_eq!(graph.find_path(a, &[c]), Some(vec![a, b, c]));
        assert_eq!(graph.find_path(c, &[a]), None);
        assert!(graph.links(c)[0].forward);
    }
}
