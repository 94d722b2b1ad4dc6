use std::{any::type_name, fmt::Debug, sync::Arc};

use crate::{
    context::{ContextDeriver, ContextId, ContextIdGenerator},
    errors::{ResolutionPath, ResolveError},
    graph::Graph,
    injector::resolve_root,
    module::{ModuleId, ModuleInfo},
    types::{Injectable, Instance, Token},
};

/// Options for [`Container::resolve_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Resolve to `None` instead of failing if the token is not provided anywhere
    pub optional: bool,
    /// Only look the token up from inside this module
    pub strict: Option<ModuleId>,
}
impl ResolveOptions {
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn strict(mut self, module: ModuleId) -> Self {
        self.strict = Some(module);
        self
    }
}

/// The sealed module graph, producing instances on demand
///
/// Cheap to clone, all clones share the same instances.
#[derive(Clone)]
pub struct Container(Arc<ContainerInner>);
struct ContainerInner {
    graph: Graph,
    contexts: ContextIdGenerator,
}
impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for module in self.modules() {
            let providers: Vec<String> = module.providers().map(ToString::to_string).collect();
            map.entry(&module.token().to_string(), &providers);
        }
        map.finish()
    }
}

impl Container {
    pub(crate) fn new(graph: Graph) -> Self {
        Container(Arc::new(ContainerInner {
            graph,
            contexts: ContextIdGenerator::new(),
        }))
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.0.graph
    }

    /// All modules, ordered by distance from the root and then registration order
    pub fn modules(&self) -> impl Iterator<Item = ModuleInfo<'_>> {
        let graph = self.graph();
        graph.order.iter().map(|id| ModuleInfo {
            module: graph.module(*id),
        })
    }

    pub fn module(&self, id: ModuleId) -> Option<ModuleInfo<'_>> {
        self.graph()
            .try_module(id)
            .map(|module| ModuleInfo { module })
    }

    pub fn find_module(&self, token: &Token) -> Option<ModuleInfo<'_>> {
        self.graph()
            .modules
            .iter()
            .find(|module| &module.token == token)
            .map(|module| ModuleInfo { module })
    }

    /// Mints a new context, usually one per inbound request
    pub fn create_context(&self) -> ContextId {
        self.0.contexts.next(None)
    }

    /// Mints a context whose durable providers are cached under `deriver(context)`
    pub fn create_durable_context(
        &self,
        deriver: impl Fn(&ContextId) -> ContextId + Send + Sync + 'static,
    ) -> ContextId {
        let deriver: ContextDeriver = Arc::new(deriver);
        self.0.contexts.next(Some(deriver))
    }

    /// Drops every instance cached for `context`
    ///
    /// Resolutions still in flight for the context complete without caching their result.
    /// Returns the number of dropped slots. The static context can't be released.
    pub fn release(&self, context: &ContextId) -> usize {
        if context.is_static() {
            tracing::warn!("Refusing to release the static context");
            return 0;
        }

        let released: usize = self
            .graph()
            .nodes
            .iter()
            .map(|node| node.release(context.id()))
            .sum();
        tracing::debug!("Released context {} - dropped {released} instances", context.id());
        released
    }

    /// Resolves the provider of `token`
    ///
    /// The first module - in distance order - declaring the token is used.
    pub async fn resolve(
        &self,
        token: impl Into<Token>,
        context: Option<&ContextId>,
    ) -> Result<Instance, ResolveError> {
        let token = token.into();
        self.resolve_with(token.clone(), context, ResolveOptions::default())
            .await?
            .ok_or(ResolveError::UnknownDependency {
                token,
                requested_by: None,
                path: ResolutionPath::default(),
            })
    }

    pub async fn resolve_with(
        &self,
        token: impl Into<Token>,
        context: Option<&ContextId>,
        options: ResolveOptions,
    ) -> Result<Option<Instance>, ResolveError> {
        let token = token.into();
        let graph = self.graph();

        let node = match options.strict {
            Some(module) => {
                if graph.try_module(module).is_none() {
                    return Err(ResolveError::UnknownModule(module));
                }
                graph.lookup(module, &token)
            }
            None => graph.find_declaring(&token),
        };

        let Some(node) = node else {
            if options.optional {
                return Ok(None);
            }
            tracing::error!("Tried to resolve an unregistered token: {token}");
            return Err(ResolveError::UnknownDependency {
                token,
                requested_by: None,
                path: ResolutionPath::default(),
            });
        };

        resolve_root(graph, node, context.cloned()).await.map(Some)
    }

    /// Resolves the provider registered for the type `T`
    pub async fn get<T: Injectable>(&self, context: Option<&ContextId>) -> Result<Arc<T>, ResolveError> {
        self.resolve(Token::of::<T>(), context)
            .await?
            .downcast()
            .map_err(|actual| ResolveError::TypeMismatch {
                required: type_name::<T>(),
                actual,
            })
    }
}
