use std::{fmt::Debug, future::Future, sync::Arc};

use crate::{
    arguments::Arguments,
    factories::{Constructible, DynConstructor, DynFactory, FnConstructor, FnFactory},
    types::{DynError, Injectable, Instance, Token, TypeInfo},
};

/// Lifetime of the instances a provider produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance for the lifetime of the container
    #[default]
    Singleton,
    /// One instance per context id
    Request,
    /// One instance per context id and inquiring provider
    Transient,
}

/// Token of a dependency, either given directly or resolved on lookup
#[derive(Clone)]
pub enum DependencyToken {
    Direct(Token),
    Forward(Arc<dyn Fn() -> Token + Send + Sync>),
}
impl DependencyToken {
    /// Dereferences forward references
    pub fn token(&self) -> Token {
        match self {
            DependencyToken::Direct(token) => token.clone(),
            DependencyToken::Forward(resolve) => resolve(),
        }
    }
}
impl Debug for DependencyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyToken::Direct(token) => f.debug_tuple("Direct").field(token).finish(),
            DependencyToken::Forward(_) => f.debug_tuple("Forward").field(&self.token()).finish(),
        }
    }
}

/// Information about a provider dependency
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The required token
    pub token: DependencyToken,
    /// If it is optional or required
    pub optional: bool,
}
impl Dependency {
    /// Depends on the provider registered for type `T`
    pub fn on<T: 'static + ?Sized>() -> Self {
        Self::token(Token::of::<T>())
    }

    pub fn token(token: impl Into<Token>) -> Self {
        Dependency {
            token: DependencyToken::Direct(token.into()),
            optional: false,
        }
    }

    /// Depends on a token which is only looked up during resolution
    ///
    /// Forward edges may close a cycle. The dependent receives a
    /// [`Lazy`](crate::Lazy) handle instead of the instance itself.
    pub fn forward(resolve: impl Fn() -> Token + Send + Sync + 'static) -> Self {
        Dependency {
            token: DependencyToken::Forward(Arc::new(resolve)),
            optional: false,
        }
    }

    /// Resolves to an absent argument if the token can't be found
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.token, DependencyToken::Forward(_))
    }
}

/// How a provider produces its instance
#[derive(Clone)]
pub enum ProviderDefinition {
    /// Synchronous constructor called with the resolved constructor dependencies
    Class {
        constructor: Arc<dyn DynConstructor>,
        dependencies: Vec<Dependency>,
    },
    /// An existing instance
    Value(Instance),
    /// Asynchronous factory called with its inject list, in declared order
    Factory {
        factory: Arc<dyn DynFactory>,
        inject: Vec<Dependency>,
    },
    /// Forwards to the instance of another token
    Alias(Token),
}
impl ProviderDefinition {
    /// The dependencies in argument order
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            ProviderDefinition::Class { dependencies, .. } => dependencies.clone(),
            ProviderDefinition::Factory { inject, .. } => inject.clone(),
            ProviderDefinition::Value(_) => Vec::new(),
            ProviderDefinition::Alias(target) => vec![Dependency::token(target.clone())],
        }
    }

    /// The type produced, if known before instantiation
    pub fn supplies(&self) -> Option<TypeInfo> {
        match self {
            ProviderDefinition::Class { constructor, .. } => Some(constructor.supplies()),
            ProviderDefinition::Factory { factory, .. } => Some(factory.supplies()),
            ProviderDefinition::Value(instance) => Some(instance.info),
            ProviderDefinition::Alias(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProviderDefinition::Class { .. } => "Class",
            ProviderDefinition::Value(_) => "Value",
            ProviderDefinition::Factory { .. } => "Factory",
            ProviderDefinition::Alias(_) => "Alias",
        }
    }
}
impl Debug for ProviderDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderDefinition::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
            _ => f
                .debug_struct(self.kind())
                .field("supplies", &self.supplies().map(|info| info.type_name))
                .field("dependencies", &self.dependencies())
                .finish(),
        }
    }
}

/// A provider declaration, as handed over by whoever builds the module graph
///
/// # Example
/// ```rust
/// use keel_di::{Dependency, Provider, Scope};
///
/// struct Clock;
/// struct RequestLog(Vec<String>);
///
/// let clock = Provider::value(Clock);
/// let log = Provider::class_with(vec![Dependency::on::<Clock>()], |_args| {
///     Ok::<_, std::convert::Infallible>(RequestLog(Vec::new()))
/// })
/// .scope(Scope::Request);
/// let timestamp = Provider::alias("clock", keel_di::Token::of::<Clock>());
/// ```
#[derive(Debug, Clone)]
pub struct Provider {
    pub(crate) token: Token,
    pub(crate) definition: ProviderDefinition,
    pub(crate) scope: Scope,
    pub(crate) durable: bool,
}
impl Provider {
    pub fn new(token: impl Into<Token>, definition: ProviderDefinition) -> Self {
        Provider {
            token: token.into(),
            definition,
            scope: Scope::default(),
            durable: false,
        }
    }

    /// Provides `T` through its [`Constructible`] implementation
    pub fn class<T: Constructible>() -> Self {
        Self::class_with(T::dependencies(), T::construct)
    }

    /// Provides `T` through a synchronous constructor
    pub fn class_with<T, F, E>(dependencies: Vec<Dependency>, constructor: F) -> Self
    where
        T: Injectable,
        F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync + 'static,
        E: Into<DynError>,
    {
        Self::new(
            Token::of::<T>(),
            ProviderDefinition::Class {
                constructor: Arc::new(FnConstructor::new(constructor)),
                dependencies,
            },
        )
    }

    /// Provides an existing value
    pub fn value<T: Injectable>(value: T) -> Self {
        Self::instance(Token::of::<T>(), Instance::new(value))
    }

    /// Provides an existing, already type erased instance
    pub fn instance(token: impl Into<Token>, instance: Instance) -> Self {
        Self::new(token, ProviderDefinition::Value(instance))
    }

    /// Provides `T` through an asynchronous factory
    pub fn factory<T, F, Fut, E>(inject: Vec<Dependency>, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<DynError>,
    {
        Self::new(
            Token::of::<T>(),
            ProviderDefinition::Factory {
                factory: Arc::new(FnFactory::new(factory)),
                inject,
            },
        )
    }

    /// Makes `token` resolve to the instance of `target`
    pub fn alias(token: impl Into<Token>, target: impl Into<Token>) -> Self {
        Self::new(token, ProviderDefinition::Alias(target.into()))
    }

    /// Registers the provider under a different token
    pub fn with_token(mut self, token: impl Into<Token>) -> Self {
        self.token = token.into();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Marks a request scoped provider as durable
    ///
    /// Durable providers are cached under the context derived from the request context
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn definition(&self) -> &ProviderDefinition {
        &self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::{Dependency, Provider, ProviderDefinition, Scope};
    use crate::types::{Token, TypeInfo};

    struct Engine;

    #[test]
    fn alias_depends_on_its_target() {
        let alias = Provider::alias("motor", Token::of::<Engine>());
        let dependencies = alias.definition().dependencies();

        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].token.token(), Token::of::<Engine>());
        assert_eq!(alias.definition().supplies(), None);
    }

    #[test]
    fn forward_tokens_are_resolved_on_lookup() {
        let dependency = Dependency::forward(|| Token::name("late")).optional();

        assert!(dependency.is_forward());
        assert!(dependency.optional);
        assert_eq!(dependency.token.token(), Token::name("late"));
    }

    #[test]
    fn it_builds_scoped_providers() {
        let provider = Provider::value(Engine)
            .with_token("engine")
            .scope(Scope::Request)
            .durable();

        assert_eq!(provider.token(), &Token::name("engine"));
        assert_eq!(provider.scope, Scope::Request);
        assert!(provider.durable);
        assert!(matches!(provider.definition(), ProviderDefinition::Value(_)));
        assert_eq!(
            provider.definition().supplies(),
            Some(TypeInfo::of::<Engine>())
        );
    }
}
