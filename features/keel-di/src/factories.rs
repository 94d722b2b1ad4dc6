use std::{future::Future, marker::PhantomData};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    arguments::Arguments,
    provider::Dependency,
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// A type which knows how to construct itself from its dependencies
///
/// Register it with [`Provider::class`](crate::provider::Provider::class).
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use keel_di::{Arguments, Constructible, Dependency, DynError};
///
/// struct Database;
/// struct UserRepository {
///     db: Arc<Database>,
/// }
///
/// impl Constructible for UserRepository {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::on::<Database>()]
///     }
///
///     fn construct(args: &mut Arguments) -> Result<Self, DynError> {
///         Ok(UserRepository { db: args.get(0)? })
///     }
/// }
/// ```
pub trait Constructible: Injectable + Sized {
    /// Returns the constructor dependencies, in argument order
    fn dependencies() -> Vec<Dependency>;

    /// Constructs a new instance from its resolved dependencies
    fn construct(args: &mut Arguments) -> Result<Self, DynError>;
}

/// Wrapper Trait for synchronous constructors, providing instances of Any
pub trait DynConstructor: Send + Sync {
    fn supplies(&self) -> TypeInfo;

    fn construct(&self, args: &mut Arguments) -> Result<Instance, DynError>;
}

/// Wrapper Trait for asynchronous factories, providing instances of Any
pub trait DynFactory: Send + Sync {
    fn supplies(&self) -> TypeInfo;

    fn construct(&self, args: Arguments) -> BoxFuture<'static, Result<Instance, DynError>>;
}

pub(crate) struct FnConstructor<T, F> {
    constructor: F,
    _marker: PhantomData<fn() -> T>,
}
impl<T, F> FnConstructor<T, F> {
    pub(crate) fn new(constructor: F) -> Self {
        FnConstructor {
            constructor,
            _marker: PhantomData,
        }
    }
}
impl<T, F, E> DynConstructor for FnConstructor<T, F>
where
    T: Injectable,
    F: Fn(&mut Arguments) -> Result<T, E> + Send + Sync,
    E: Into<DynError>,
{
    fn supplies(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn construct(&self, args: &mut Arguments) -> Result<Instance, DynError> {
        // Forward the call to the specific implementation
        (self.constructor)(args).map(Instance::new).map_err(Into::into)
    }
}

pub(crate) struct FnFactory<T, F> {
    factory: F,
    _marker: PhantomData<fn() -> T>,
}
impl<T, F> FnFactory<T, F> {
    pub(crate) fn new(factory: F) -> Self {
        FnFactory {
            factory,
            _marker: PhantomData,
        }
    }
}
impl<T, F, Fut, E> DynFactory for FnFactory<T, F>
where
    T: Injectable,
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<DynError>,
{
    fn supplies(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn construct(&self, args: Arguments) -> BoxFuture<'static, Result<Instance, DynError>> {
        let construction_fut = (self.factory)(args);
        async move {
            construction_fut
                .await
                .map(Instance::new)
                .map_err(Into::into)
        }
        .boxed()
    }
}
