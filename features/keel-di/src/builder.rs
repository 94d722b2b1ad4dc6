use crate::{
    container::Container,
    errors::RegistrationError,
    graph::Graph,
    module::{Module, ModuleDefinition, ModuleId},
    node::{NodeId, ProviderNode},
    provider::Provider,
    types::Token,
};

/// Collects modules and providers until the graph is sealed into a [`Container`]
///
/// The builder is the only place the module graph can change. Everything it
/// rejects is rejected here - a built container never fails on graph shape.
pub struct ContainerBuilder {
    modules: Vec<Module>,
    nodes: Vec<ProviderNode>,
    /// Module distances are measured from, the first module if unset
    root: Option<ModuleId>,
    /// Internal module global modules are not bound to
    core: Option<ModuleId>,
}
impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            modules: Vec::new(),
            nodes: Vec::new(),
            root: None,
            core: None,
        }
    }

    pub fn with_root(&mut self, module: ModuleId) -> Result<&mut Self, RegistrationError> {
        self.check_module(module)?;
        self.root = Some(module);
        Ok(self)
    }

    pub fn with_core_module(&mut self, module: ModuleId) -> Result<&mut Self, RegistrationError> {
        self.check_module(module)?;
        self.core = Some(module);
        Ok(self)
    }

    /// Registers a module with its providers, imports and exports - in that order
    ///
    /// Nothing is registered if any part of the definition is rejected.
    pub fn register_module(
        &mut self,
        definition: ModuleDefinition,
    ) -> Result<ModuleId, RegistrationError> {
        let ModuleDefinition {
            token,
            global,
            providers,
            imports,
            exports,
        } = definition;

        if self.modules.iter().any(|module| module.token == token) {
            return Err(RegistrationError::DuplicateModule(token));
        }

        let id = ModuleId(self.modules.len());
        let node_count = self.nodes.len();
        tracing::debug!("Registering module {token} as {id}");
        self.modules.push(Module::new(id, token, global));

        let result = self.apply_definition(id, providers, imports, exports);
        if let Err(e) = result {
            self.modules.truncate(id.0);
            self.nodes.truncate(node_count);
            return Err(e);
        }
        Ok(id)
    }

    fn apply_definition(
        &mut self,
        id: ModuleId,
        providers: Vec<Provider>,
        imports: Vec<ModuleId>,
        exports: Vec<Token>,
    ) -> Result<(), RegistrationError> {
        for provider in providers {
            self.add_provider(id, provider)?;
        }
        for import in imports {
            self.add_import(id, import)?;
        }
        for export in exports {
            self.add_export(id, export)?;
        }
        Ok(())
    }

    pub fn add_provider(
        &mut self,
        module: ModuleId,
        provider: Provider,
    ) -> Result<NodeId, RegistrationError> {
        let id = NodeId(self.nodes.len());
        let target = self.module_mut(module)?;
        if target.providers.contains_key(provider.token()) {
            return Err(RegistrationError::DuplicateProvider {
                module: target.token.clone(),
                token: provider.token().clone(),
            });
        }

        tracing::debug!("Adding provider {} to module {}", provider.token(), target.token);
        target.providers.insert(provider.token().clone(), id);
        self.nodes.push(ProviderNode::new(id, module, provider));
        Ok(id)
    }

    /// Replaces an already registered provider, keeping its place in the graph
    pub fn override_provider(
        &mut self,
        module: ModuleId,
        provider: Provider,
    ) -> Result<NodeId, RegistrationError> {
        let target = self.module_mut(module)?;
        let Some(id) = target.providers.get(provider.token()).copied() else {
            return Err(RegistrationError::UnknownProvider {
                module: target.token.clone(),
                token: provider.token().clone(),
            });
        };

        tracing::debug!("Overriding provider {} in module {}", provider.token(), target.token);
        self.nodes[id.0] = ProviderNode::new(id, module, provider);
        Ok(id)
    }

    pub fn add_import(
        &mut self,
        module: ModuleId,
        imported: ModuleId,
    ) -> Result<(), RegistrationError> {
        self.check_module(imported)?;
        let target = self.module_mut(module)?;
        if target.add_import(imported) {
            tracing::debug!("Module {} imports {imported}", target.token);
        }
        Ok(())
    }

    /// Exports one of the module's providers, or re-exports one of its imports
    pub fn add_export(
        &mut self,
        module: ModuleId,
        token: impl Into<Token>,
    ) -> Result<(), RegistrationError> {
        let token = token.into();
        let target = self.module(module)?;

        let is_provider = target.providers.contains_key(&token);
        let is_import = target
            .imports
            .iter()
            .any(|import| self.modules[import.0].token == token);
        if !is_provider && !is_import {
            return Err(RegistrationError::UnknownExport {
                module: target.token.clone(),
                token,
            });
        }

        let target = self.module_mut(module)?;
        tracing::debug!("Module {} exports {token}", target.token);
        target.exports.insert(token);
        Ok(())
    }

    /// Imports every global module into every other module
    pub fn bind_global_modules(&mut self) {
        let globals: Vec<ModuleId> = self
            .modules
            .iter()
            .filter(|module| module.global)
            .map(|module| module.id)
            .collect();

        for global in globals {
            let mut bound = 0;
            for module in self.modules.iter_mut() {
                if Some(module.id) == self.core {
                    continue;
                }
                if module.add_import(global) {
                    bound += 1;
                }
            }
            tracing::debug!(
                "Bound global module {} to {bound} modules",
                self.modules[global.0].token
            );
        }
    }

    /// Sets every module's distance to its longest import chain from the root
    ///
    /// Import cycles are cut where they close. Global modules sort last, modules
    /// the root can't reach stay at 0.
    pub fn compute_distances(&mut self) {
        let Some(root) = self.root.or_else(|| self.modules.first().map(|module| module.id)) else {
            return;
        };

        let count = self.modules.len();
        let mut on_path = vec![false; count];
        let mut done = vec![false; count];
        let mut finished = Vec::with_capacity(count);
        let mut edges = vec![Vec::new(); count];
        visit(
            &self.modules,
            root,
            &mut on_path,
            &mut done,
            &mut finished,
            &mut edges,
        );

        // Reverse finishing order is a topological order of the remaining edges
        let mut distances = vec![0; count];
        for id in finished.iter().rev() {
            for import in &edges[id.0] {
                distances[import.0] = distances[import.0].max(distances[id.0] + 1);
            }
        }

        for module in self.modules.iter_mut() {
            module.distance = match module.global {
                true => usize::MAX,
                false => distances[module.id.0],
            };
            tracing::debug!("Module {} has distance {}", module.token, module.distance);
        }

        return;

        fn visit(
            modules: &[Module],
            id: ModuleId,
            on_path: &mut [bool],
            done: &mut [bool],
            finished: &mut Vec<ModuleId>,
            edges: &mut [Vec<ModuleId>],
        ) {
            on_path[id.0] = true;
            for import in &modules[id.0].imports {
                // Edge closing a cycle
                if on_path[import.0] {
                    continue;
                }
                edges[id.0].push(*import);
                if !done[import.0] {
                    visit(modules, *import, on_path, done, finished, edges);
                }
            }
            on_path[id.0] = false;
            done[id.0] = true;
            finished.push(id);
        }
    }

    /// Binds global modules, computes distances and seals the graph
    pub fn build(mut self) -> Container {
        self.bind_global_modules();
        self.compute_distances();

        tracing::debug!(
            "Building container with {} modules and {} providers",
            self.modules.len(),
            self.nodes.len()
        );
        Container::new(Graph::new(self.modules, self.nodes))
    }

    fn check_module(&self, module: ModuleId) -> Result<(), RegistrationError> {
        self.module(module).map(|_| ())
    }

    fn module(&self, module: ModuleId) -> Result<&Module, RegistrationError> {
        self.modules
            .get(module.0)
            .ok_or(RegistrationError::UnknownModule(module))
    }

    fn module_mut(&mut self, module: ModuleId) -> Result<&mut Module, RegistrationError> {
        self.modules
            .get_mut(module.0)
            .ok_or(RegistrationError::UnknownModule(module))
    }
}
