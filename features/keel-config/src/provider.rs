use std::{
    any::TypeId,
    collections::HashMap,
    sync::Arc,
};

use keel_di::{
    ContainerBuilder, Injectable, Instance, ModuleDefinition, ModuleId, Provider, Token, TypeInfo,
};

use crate::errors::ConfigError;

/// Name of the global module the configs are published in
pub const CONFIG_MODULE: &str = "ConfigModule";

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type.
#[derive(Clone, Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, Instance>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// Returns `Ok(None)` if no config of the type was registered
    pub fn get_config<T: Injectable>(&self) -> Result<Option<Arc<T>>, ConfigError> {
        self.configs
            .get(&TypeId::of::<T>())
            .map(|instance| instance.downcast::<T>())
            .transpose()
            .map_err(|_| ConfigError::Missing(TypeInfo::of::<T>()))
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError`] runtime error
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        let info = TypeInfo::of::<T>();
        if self.configs.contains_key(&info.type_id) {
            return Err(ConfigError::AlreadyRegistered(info));
        }

        self.configs.insert(info.type_id, Instance::new(config));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Publishes every config and the registry itself as a global module
    ///
    /// Each config is provided and exported under the token of its type, so any
    /// module can depend on it without importing the config module.
    pub fn register(self, builder: &mut ContainerBuilder) -> Result<ModuleId, ConfigError> {
        let mut module = ModuleDefinition::new(CONFIG_MODULE).global();

        for instance in self.configs.values() {
            let token = Token::Type(instance.info);
            tracing::debug!("Registering config {token}");
            module = module
                .provider(Provider::instance(token.clone(), instance.clone()))
                .export(token);
        }

        let module = module
            .provider(Provider::value(self))
            .export(Token::of::<ConfigProvider>());

        Ok(builder.register_module(module)?)
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigProvider;
    use crate::errors::ConfigError;

    #[derive(Debug, PartialEq)]
    struct AppConfig {
        port: u16,
    }

    #[test]
    fn it_returns_registered_configs() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(AppConfig { port: 8080 })
            .unwrap()
            .maybe_add_config::<String>(None)
            .unwrap();

        assert_eq!(
            provider.get_config::<AppConfig>().unwrap().as_deref(),
            Some(&AppConfig { port: 8080 })
        );
        assert!(provider.get_config::<String>().unwrap().is_none());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn it_rejects_duplicate_configs() {
        let mut provider = ConfigProvider::new();
        provider.add_config(AppConfig { port: 1 }).unwrap();

        assert!(matches!(
            provider.add_config(AppConfig { port: 2 }),
            Err(ConfigError::AlreadyRegistered(_))
        ));
    }
}
