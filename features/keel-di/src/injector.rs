use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{
    future::{join_all, BoxFuture},
    FutureExt,
};

use crate::{
    arguments::{Argument, Arguments},
    context::{ContextId, Inquirer, STATIC_CONTEXT},
    errors::ResolveError,
    graph::{Graph, Link},
    lazy::{LazyInstance, LazySender},
    node::{Claim, NodeId, ProviderNode, SlotKey},
    provider::{ProviderDefinition, Scope},
    scope::ScopeClassifier,
    types::Instance,
};

/// Ids of the nodes a single logical resolution is currently working on
///
/// Only direct edges extend the chain, forward references start a new one.
#[derive(Debug, Clone, Default)]
pub(crate) struct Chain(Vec<NodeId>);
impl Chain {
    fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    fn extended(&self, id: NodeId) -> Chain {
        let mut ids = self.0.clone();
        ids.push(id);
        Chain(ids)
    }
}

/// A forward reference handed out as [`Lazy`](crate::Lazy), completed after the dependent resolved
struct ForwardLink {
    node: NodeId,
    sender: LazySender,
}

/// An instance constructed and cached during one resolution
#[derive(Clone)]
struct Constructed {
    node: NodeId,
    key: SlotKey,
    instance: Instance,
}

/// A forward reference waiting for the resolution which handed it out to complete
struct PendingLink {
    declarer: Constructed,
    target: NodeId,
    context: Option<ContextId>,
    sender: LazySender,
}

#[derive(Default)]
struct ForwardState {
    links: VecDeque<PendingLink>,
    constructed: Vec<Constructed>,
}

/// Forward references of one top level resolution
///
/// They are linked once the resolution completed, so the declaring node never waits on its target.
#[derive(Default)]
pub(crate) struct ForwardQueue {
    state: Mutex<ForwardState>,
}
impl ForwardQueue {
    fn state(&self) -> MutexGuard<'_, ForwardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn constructed(
        &self,
        constructed: Constructed,
        context: Option<ContextId>,
        links: Vec<ForwardLink>,
    ) {
        let mut state = self.state();
        state
            .links
            .extend(links.into_iter().map(|link| PendingLink {
                declarer: constructed.clone(),
                target: link.node,
                context: context.clone(),
                sender: link.sender,
            }));
        state.constructed.push(constructed);
    }

    /// Declarer, target and context of the next link to complete
    fn peek(&self) -> Option<(NodeId, NodeId, Option<ContextId>)> {
        self.state()
            .links
            .front()
            .map(|link| (link.declarer.node, link.target, link.context.clone()))
    }

    fn pop(&self) -> Option<PendingLink> {
        self.state().links.pop_front()
    }

    /// Instances of this resolution holding `declarer`, the declarer itself included
    fn holding(&self, graph: &Graph, declarer: NodeId) -> Vec<Constructed> {
        self.state()
            .constructed
            .iter()
            .filter(|c| c.node == declarer || graph.find_path(c.node, &[declarer]).is_some())
            .cloned()
            .collect()
    }
}

/// Uncaches the declarers of links never completed - their lazy handles report `Abandoned`
struct UnlinkedGuard<'a> {
    graph: &'a Graph,
    forwards: &'a ForwardQueue,
}
impl Drop for UnlinkedGuard<'_> {
    fn drop(&mut self) {
        while let Some(link) = self.forwards.pop() {
            let declarer = self.graph.node(link.declarer.node);
            tracing::warn!(
                "Forward reference of {} to {} was never linked",
                declarer.token,
                self.graph.node(link.target).token
            );
            declarer.invalidate(link.declarer.key, &link.declarer.instance);
        }
    }
}

/// Resolves `id` and links every forward reference handed out on the way
pub(crate) async fn resolve_root(
    graph: &Graph,
    id: NodeId,
    context: Option<ContextId>,
) -> Result<Instance, ResolveError> {
    let forwards = ForwardQueue::default();
    let unlinked = UnlinkedGuard {
        graph,
        forwards: &forwards,
    };
    let injector = Injector {
        graph,
        forwards: &forwards,
    };

    let result = injector
        .resolve(id, context, Inquirer::Root, Chain::default())
        .await;
    // Nodes constructed before a failure stay cached, so their links are completed regardless
    let linked = injector.link_forward().await;
    drop(unlinked);

    result.and_then(|instance| linked.map(|()| instance))
}

/// Removes a claimed slot if the resolution owning it is dropped before it completed
struct PendingGuard<'g> {
    node: &'g ProviderNode,
    key: SlotKey,
    generation: u64,
    armed: bool,
}
impl<'g> PendingGuard<'g> {
    fn publish(mut self, result: Result<Instance, ResolveError>) -> Result<Instance, ResolveError> {
        self.armed = false;
        self.node.publish(self.key, self.generation, result)
    }
}
impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                "Resolution of {} was dropped before it completed",
                self.node.token
            );
            self.node.abandon(self.key, self.generation);
        }
    }
}

/// Resolves provider nodes of a sealed graph
#[derive(Clone, Copy)]
pub(crate) struct Injector<'g> {
    graph: &'g Graph,
    forwards: &'g ForwardQueue,
}

impl<'g> Injector<'g> {
    /// Resolves the instance of `id` for `context`
    ///
    /// Returns the cached instance if there is one, waits for a resolution already in flight,
    /// or resolves the dependencies and instantiates the provider.
    pub(crate) fn resolve(
        self,
        id: NodeId,
        context: Option<ContextId>,
        inquirer: Inquirer,
        chain: Chain,
    ) -> BoxFuture<'g, Result<Instance, ResolveError>> {
        async move {
            let node = self.graph.node(id);

            // A node twice on the same chain can never resolve
            if chain.contains(id) {
                let path = self.graph.path(chain.0.iter().copied().chain([id]));
                tracing::error!("Circular dependency detected: {path}");
                return Err(ResolveError::CircularDependency { path });
            }

            let effective = self.effective_context(node, context.as_ref())?;
            let key = SlotKey {
                context: effective.id(),
                inquirer: (node.scope == Scope::Transient).then_some(inquirer),
            };

            let generation = match node.claim(key) {
                Claim::Resolved(instance) => return Ok(instance),
                Claim::Pending(rx) => {
                    // Waiting on someone who waits on us would never complete
                    if let Some(cycle) = self.graph.find_path(id, &chain.0) {
                        let path = self.graph.path(chain.0.iter().copied().chain(cycle));
                        tracing::error!("Circular dependency detected: {path}");
                        return Err(ResolveError::CircularDependency { path });
                    }

                    return match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(ResolveError::Abandoned {
                            token: node.token.clone(),
                        }),
                    };
                }
                Claim::Vacant(generation) => generation,
            };

            let guard = PendingGuard {
                node,
                key,
                generation,
                armed: true,
            };
            let chain = chain.extended(id);
            let (result, forward_links) = self.instantiate(node, context.clone(), &chain).await;
            let instance = guard.publish(result)?;

            let constructed = Constructed {
                node: id,
                key,
                instance: instance.clone(),
            };
            self.forwards.constructed(constructed, context, forward_links);
            Ok(instance)
        }
        .boxed()
    }

    /// The context the instances of `node` are cached under
    fn effective_context(
        self,
        node: &ProviderNode,
        context: Option<&ContextId>,
    ) -> Result<ContextId, ResolveError> {
        let classifier = ScopeClassifier::new(self.graph);
        if classifier.is_tree_static(node.id) {
            return Ok(STATIC_CONTEXT);
        }

        let Some(context) = context.filter(|context| !context.is_static()) else {
            return Err(ResolveError::InvalidScope {
                token: node.token.clone(),
                scope: node.scope,
            });
        };

        if classifier.is_tree_durable(node.id) {
            if let Some(parent) = context.derive() {
                return Ok(parent);
            }
        }
        Ok(context.clone())
    }

    /// Resolves all dependencies and produces the instance
    async fn instantiate(
        self,
        node: &'g ProviderNode,
        context: Option<ContextId>,
        chain: &Chain,
    ) -> (Result<Instance, ResolveError>, Vec<ForwardLink>) {
        let links = self.graph.links(node.id);

        // Siblings resolve concurrently - every one of them runs to completion
        let resolved = join_all(
            links
                .iter()
                .map(|link| self.resolve_link(node, link, context.clone(), chain)),
        )
        .await;

        let mut values = Vec::with_capacity(resolved.len());
        let mut forward_links = Vec::new();
        let mut error = None;
        for result in resolved {
            match result {
                Ok((argument, forward)) => {
                    values.push(argument);
                    forward_links.extend(forward);
                }
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = error {
            return (Err(e), Vec::new());
        }

        let args = Arguments::new(node.token.clone(), values);
        let result = match &node.definition {
            ProviderDefinition::Class { constructor, .. } => {
                let mut args = args;
                constructor.construct(&mut args)
            }
            ProviderDefinition::Factory { factory, .. } => factory.construct(args).await,
            ProviderDefinition::Value(instance) => Ok(instance.clone()),
            ProviderDefinition::Alias(_) => {
                return match args.instance(0) {
                    Ok(Some(target)) => (Ok(target.clone()), forward_links),
                    _ => (
                        Err(ResolveError::UnknownDependency {
                            token: links[0].token.clone(),
                            requested_by: Some(node.token.clone()),
                            path: self.graph.path(chain.0.iter().copied()),
                        }),
                        Vec::new(),
                    ),
                };
            }
        };

        match result {
            Ok(instance) => {
                tracing::debug!("Constructed instance of {}", node.token);
                (Ok(instance), forward_links)
            }
            Err(cause) => {
                tracing::error!("Instantiating {} failed: {cause}", node.token);
                let error = ResolveError::Instantiation {
                    token: node.token.clone(),
                    path: self.graph.path(chain.0.iter().copied()),
                    cause: Arc::new(cause),
                };
                (Err(error), Vec::new())
            }
        }
    }

    async fn resolve_link(
        self,
        node: &'g ProviderNode,
        link: &'g Link,
        context: Option<ContextId>,
        chain: &Chain,
    ) -> Result<(Argument, Option<ForwardLink>), ResolveError> {
        let Some(dependency) = link.node else {
            if link.optional {
                return Ok((Argument::Absent, None));
            }

            tracing::error!(
                "{} needs {} but it is not available in module {}",
                node.token,
                link.token,
                self.graph.module(node.module).token
            );
            return Err(ResolveError::UnknownDependency {
                token: link.token.clone(),
                requested_by: Some(node.token.clone()),
                path: self.graph.path(chain.0.iter().copied()),
            });
        };

        if link.forward {
            let (lazy, sender) = LazyInstance::channel(link.token.clone());
            let forward = ForwardLink {
                node: dependency,
                sender,
            };
            return Ok((Argument::Deferred(lazy), Some(forward)));
        }

        match self
            .resolve(dependency, context, Inquirer::Node(node.id), chain.clone())
            .await
        {
            Ok(instance) => Ok((Argument::Resolved(instance), None)),
            Err(e) if link.optional && e.is_unknown_dependency() => Ok((Argument::Absent, None)),
            Err(e) => Err(e),
        }
    }

    /// Completes the lazy handles given out during this resolution
    ///
    /// A failed target uncaches its declarer together with every instance holding it.
    async fn link_forward(self) -> Result<(), ResolveError> {
        let mut failure = None;

        while let Some((declarer, target, context)) = self.forwards.peek() {
            // Nothing is pending on this resolution anymore, so the target starts a new chain
            let result = self
                .resolve(target, context, Inquirer::Node(declarer), Chain::default())
                .await;
            let Some(link) = self.forwards.pop() else {
                break;
            };

            if let Err(e) = &result {
                tracing::error!(
                    "Linking {} to {} failed: {e}",
                    self.graph.node(declarer).token,
                    self.graph.node(target).token
                );
                for held in self.forwards.holding(self.graph, declarer) {
                    self.graph
                        .node(held.node)
                        .invalidate(held.key, &held.instance);
                }
                failure.get_or_insert_with(|| e.clone());
            }
            let _ = link.sender.send(result);
        }

        failure.map_or(Ok(()), Err)
    }
}
