use std::{fmt::Debug, ops::Deref, sync::Arc};

use keel_di::{ArgumentError, Arguments, Dependency, Injectable};

/// A wrapper type to allow for config injections
///
/// This provides a simple way to retrieve configs published by
/// [`ConfigProvider::register`](crate::provider::ConfigProvider::register)
/// and inject them into a constructor as a dependency
///
/// # Example
/// ```rust
/// use keel_config::{config::Config, provider::ConfigProvider};
/// use keel_di::{ArgumentError, ContainerBuilder, ModuleDefinition, Provider};
///
/// pub struct ServerConfig {
///     port: u16,
/// }
///
/// pub struct Server {
///     port: u16,
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register_module(ModuleDefinition::new("ServerModule").provider(Provider::class_with(
///         vec![Config::<ServerConfig>::dependency()],
///         |args| {
///             let config = Config::<ServerConfig>::from_arguments(args, 0)?;
///             Ok::<_, ArgumentError>(Server { port: config.port })
///         },
///     )))
///     .unwrap();
///
/// let mut configs = ConfigProvider::new();
/// configs.add_config(ServerConfig { port: 8080 }).unwrap();
/// configs.register(&mut builder).unwrap();
///
/// let container = builder.build();
/// let server = futures::executor::block_on(container.get::<Server>(None)).unwrap();
/// assert_eq!(server.port, 8080);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}
impl<T: Debug> Debug for Config<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Config").field(&self.inner).finish()
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Injectable> Config<T> {
    /// The dependency to declare for a config argument
    pub fn dependency() -> Dependency {
        Dependency::on::<T>()
    }

    /// Takes the config out of the arguments of a constructor or factory
    pub fn from_arguments(args: &Arguments, index: usize) -> Result<Self, ArgumentError> {
        Ok(Config {
            inner: args.get(index)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use keel_di::{ArgumentError, ContainerBuilder, Dependency, ModuleDefinition, Provider};

    use super::Config;
    use crate::provider::ConfigProvider;

    struct DatabaseConfig {
        url: &'static str,
    }
    #[derive(Debug)]
    struct Database {
        url: &'static str,
    }
    struct Cache {
        enabled: bool,
    }

    #[tokio::test]
    async fn configs_are_visible_in_every_module() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_module(
                ModuleDefinition::new("DatabaseModule")
                    .provider(Provider::class_with(
                        vec![Config::<DatabaseConfig>::dependency()],
                        |args| {
                            let config = Config::<DatabaseConfig>::from_arguments(args, 0)?;
                            Ok::<_, ArgumentError>(Database { url: config.url })
                        },
                    ))
                    .provider(Provider::class_with(
                        vec![Dependency::on::<ConfigProvider>()],
                        |args| {
                            let configs = args.get::<ConfigProvider>(0)?;
                            let enabled = configs.get_config::<DatabaseConfig>()?.is_some();
                            Ok::<_, keel_di::DynError>(Cache { enabled })
                        },
                    )),
            )
            .unwrap();

        let mut configs = ConfigProvider::new();
        configs
            .add_config(DatabaseConfig {
                url: "postgres://localhost",
            })
            .unwrap();
        configs.register(&mut builder).unwrap();
        let container = builder.build();

        let database = container.get::<Database>(None).await.unwrap();
        assert_eq!(database.url, "postgres://localhost");
        assert!(container.get::<Cache>(None).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn missing_configs_fail_the_constructor() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_module(ModuleDefinition::new("DatabaseModule").provider(
                Provider::class_with(vec![Config::<DatabaseConfig>::dependency()], |_| {
                    Ok::<_, Infallible>(Database { url: "unused" })
                }),
            ))
            .unwrap();
        ConfigProvider::new().register(&mut builder).unwrap();
        let container = builder.build();

        let error = container.get::<Database>(None).await.unwrap_err();
        assert!(error.is_unknown_dependency());
    }
}
