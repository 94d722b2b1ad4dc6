use std::{
    thread::{self, sleep},
    time::Duration,
};

use futures::{stream::FuturesUnordered, StreamExt};
use futures_channel::oneshot;

use crate::{
    container::Container,
    errors::BootstrapError,
    injector::resolve_root,
    node::NodeId,
    provider::Scope,
    scope::ScopeClassifier,
};

impl Container {
    /// Eagerly instantiates every static provider of every module
    ///
    /// Request bound and transient providers are left for the first request.
    pub async fn init(&self) -> Result<(), BootstrapError> {
        self.initiate(None).await
    }

    /// Like [`Container::init`], but fails with [`BootstrapError::Timeout`] after `timeout`
    pub async fn init_with_timeout(&self, timeout: Duration) -> Result<(), BootstrapError> {
        self.initiate(Some(timeout)).await
    }

    async fn initiate(&self, timeout: Option<Duration>) -> Result<(), BootstrapError> {
        // If we have a timeout - spawn a thread to signal once it's done
        let (timeout_tx, mut timeout_rx) = oneshot::channel::<()>();
        if let Some(timeout) = timeout {
            // We don't join the thread - it will just die after the timeout
            thread::spawn(move || {
                sleep(timeout);
                let _ = timeout_tx.send(());
            });
        };

        let graph = self.graph();
        let classifier = ScopeClassifier::new(graph);

        // Providers left per module, indexed by module id
        let mut remaining = vec![0_usize; graph.modules.len()];
        let mut provider_futures = FuturesUnordered::new();

        for module_id in &graph.order {
            let module = graph.module(*module_id);
            let mut nodes: Vec<NodeId> = module
                .providers
                .values()
                .copied()
                .filter(|id| {
                    graph.node(*id).scope != Scope::Transient && classifier.is_tree_static(*id)
                })
                .collect();
            nodes.sort();

            remaining[module_id.0] = nodes.len();
            if nodes.is_empty() {
                tracing::debug!("{} dependencies initialized", module.token);
            }

            for id in nodes {
                let module_id = *module_id;
                provider_futures.push(async move {
                    let result = resolve_root(graph, id, None).await;
                    (module_id, result)
                });
            }
        }

        let provider_count = provider_futures.len();
        tracing::debug!(
            "Initializing {} modules with {provider_count} static providers",
            graph.modules.len()
        );

        loop {
            let providers_left = provider_futures.len();
            tracing::debug!(
                "Waiting for providers to finish [{} of {provider_count} complete]",
                provider_count - providers_left
            );

            futures::select! {
                result = provider_futures.next() => {
                    let Some((module_id, result)) = result else {
                        break;
                    };
                    let module = graph.module(module_id);

                    if let Err(error) = result {
                        // Dropping the other futures abandons their pending slots
                        return Err(BootstrapError::Resolve {
                            module: module.token.clone(),
                            error,
                        });
                    }

                    remaining[module_id.0] -= 1;
                    if remaining[module_id.0] == 0 {
                        tracing::debug!("{} dependencies initialized", module.token);
                    }
                }
                _ = timeout_rx => {
                    return Err(BootstrapError::Timeout)
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use crate::{
        builder::ContainerBuilder,
        errors::{BootstrapError, ResolveError},
        module::ModuleDefinition,
        provider::{Dependency, Provider, Scope},
        types::Token,
    };

    fn counted(name: &'static str, scope: Scope, constructed: &Arc<AtomicUsize>) -> Provider {
        let constructed = constructed.clone();
        Provider::class_with(vec![], move |_| {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
        .with_token(name)
        .scope(scope)
    }

    #[tokio::test]
    async fn it_constructs_static_providers_only() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let mut builder = ContainerBuilder::new();
        let shared = builder
            .register_module(
                ModuleDefinition::new("SharedModule")
                    .provider(counted("database", Scope::Singleton, &constructed))
                    .export("database"),
            )
            .unwrap();
        builder
            .register_module(
                ModuleDefinition::new("AppModule")
                    .import(shared)
                    .provider(counted("request", Scope::Request, &constructed))
                    .provider(counted("transient", Scope::Transient, &constructed))
                    .provider(
                        Provider::class_with(vec![Dependency::token("database")], |_| {
                            Ok::<_, Infallible>(())
                        })
                        .with_token("service"),
                    ),
            )
            .unwrap();
        let container = builder.build();

        container.init().await.unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);

        // Already constructed
        container.resolve("database", None).await.unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn it_names_the_failing_module() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_module(ModuleDefinition::new("BrokenModule").provider(
                Provider::class_with(vec![], |_| Err::<(), _>("no connection")).with_token("db"),
            ))
            .unwrap();
        let container = builder.build();

        let Err(BootstrapError::Resolve { module, error }) = container.init().await else {
            panic!("bootstrap must fail");
        };
        assert_eq!(module, Token::name("BrokenModule"));
        assert!(matches!(error, ResolveError::Instantiation { .. }));
    }

    #[tokio::test]
    async fn it_times_out() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_module(ModuleDefinition::new("SlowModule").provider(Provider::factory(
                vec![],
                |_| futures::future::pending::<Result<u8, Infallible>>(),
            )))
            .unwrap();
        let container = builder.build();

        let result = container.init_with_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(BootstrapError::Timeout)));
    }
}
