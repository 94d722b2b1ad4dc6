use std::{any::type_name, sync::Arc};

use crate::{
    errors::ArgumentError,
    lazy::{Lazy, LazyInstance},
    types::{Injectable, Instance, Token},
};

/// A single resolved dependency
#[derive(Debug, Clone)]
pub(crate) enum Argument {
    Resolved(Instance),
    /// Optional dependency which could not be found
    Absent,
    /// Forward reference, completed once its target resolved
    Deferred(LazyInstance),
}

/// The resolved dependencies of a provider, in declared order
///
/// Handed to class constructors and factories.
pub struct Arguments {
    requested_by: Token,
    values: Vec<Argument>,
}
impl Arguments {
    pub(crate) fn new(requested_by: Token, values: Vec<Argument>) -> Self {
        Arguments {
            requested_by,
            values,
        }
    }

    /// Token of the provider being constructed
    pub fn requested_by(&self) -> &Token {
        &self.requested_by
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a required argument
    ///
    /// Forward references are only returned if their target already resolved
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, ArgumentError> {
        self.get_optional(index)?
            .ok_or_else(|| ArgumentError::Absent {
                requested_by: self.requested_by.clone(),
                index,
            })
    }

    /// Returns an argument declared as optional, `None` if it was not found
    pub fn get_optional<T: Injectable>(&self, index: usize) -> Result<Option<Arc<T>>, ArgumentError> {
        match self.instance(index)? {
            Some(instance) => self.downcast(index, instance).map(Some),
            None => Ok(None),
        }
    }

    /// Returns an argument as a lazy handle
    ///
    /// Works for every argument, but is required for forward references whose
    /// target is still being resolved.
    pub fn get_lazy<T: Injectable>(&self, index: usize) -> Result<Lazy<T>, ArgumentError> {
        match self.argument(index)? {
            Argument::Deferred(lazy) => Ok(Lazy::new(lazy.clone())),
            Argument::Resolved(instance) => {
                self.downcast::<T>(index, instance)?;
                Ok(Lazy::new(LazyInstance::resolved(
                    Token::Type(instance.info),
                    instance.clone(),
                )))
            }
            Argument::Absent => Err(ArgumentError::Absent {
                requested_by: self.requested_by.clone(),
                index,
            }),
        }
    }

    /// Returns the type erased argument, `None` if it is absent
    pub fn instance(&self, index: usize) -> Result<Option<&Instance>, ArgumentError> {
        match self.argument(index)? {
            Argument::Resolved(instance) => Ok(Some(instance)),
            Argument::Absent => Ok(None),
            Argument::Deferred(lazy) => match lazy.try_get() {
                Some(Ok(instance)) => Ok(Some(instance)),
                _ => Err(ArgumentError::Unresolved {
                    requested_by: self.requested_by.clone(),
                    index,
                }),
            },
        }
    }

    fn argument(&self, index: usize) -> Result<&Argument, ArgumentError> {
        self.values
            .get(index)
            .ok_or_else(|| ArgumentError::OutOfRange {
                requested_by: self.requested_by.clone(),
                index,
                len: self.values.len(),
            })
    }

    fn downcast<T: Injectable>(
        &self,
        index: usize,
        instance: &Instance,
    ) -> Result<Arc<T>, ArgumentError> {
        instance
            .downcast()
            .map_err(|actual| ArgumentError::TypeMismatch {
                requested_by: self.requested_by.clone(),
                index,
                required: type_name::<T>(),
                actual,
            })
    }
}
