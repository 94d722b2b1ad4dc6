use std::{fmt::Display, sync::Arc};

use thiserror::Error;

use crate::{
    module::ModuleId,
    provider::Scope,
    types::{DynError, Token},
};

/// Chain of providers that were being resolved when an error occurred
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPath(pub(crate) Vec<Token>);
impl ResolutionPath {
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `sequence` appears in the path as consecutive entries
    pub fn contains_sequence(&self, sequence: &[Token]) -> bool {
        sequence.is_empty() || self.0.windows(sequence.len()).any(|window| window == sequence)
    }
}
impl Display for ResolutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }

        let display: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&display.join(" -> "))
    }
}

/// Errors while registering modules and providers
///
/// These are fatal, a container can't be built from a registry that produced one
#[derive(Error, Debug, Clone)]
pub enum RegistrationError {
    #[error("Module {0} is not registered")]
    UnknownModule(ModuleId),
    #[error("Module '{module}' can't export '{token}' - it is neither one of its providers nor an imported module")]
    UnknownExport { module: Token, token: Token },
    #[error("Module '{0}' has been registered twice")]
    DuplicateModule(Token),
    #[error("'{token}' has been registered twice in module '{module}'")]
    DuplicateProvider { module: Token, token: Token },
    #[error("'{token}' can't be overridden in module '{module}' - it was never registered there")]
    UnknownProvider { module: Token, token: Token },
}

/// Errors when resolving an instance
///
/// Cloned to every waiter of a failed resolution
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("'{}' needs '{token}' but it is not available in its module scope (path: {path})", requester(.requested_by))]
    UnknownDependency {
        token: Token,
        requested_by: Option<Token>,
        path: ResolutionPath,
    },
    #[error("Module {0} is not registered")]
    UnknownModule(ModuleId),
    #[error("A circular dependency exists through {path} - consider declaring one edge with `Dependency::forward`")]
    CircularDependency { path: ResolutionPath },
    #[error("'{token}' is {scope:?} scoped or depends on a request scoped provider - it can't be resolved without a context id")]
    InvalidScope { token: Token, scope: Scope },
    #[error("Instantiating '{token}' failed (path: {path}) - error: {cause}")]
    Instantiation {
        token: Token,
        path: ResolutionPath,
        cause: Arc<DynError>,
    },
    #[error("Resolution of '{token}' was abandoned before it completed")]
    Abandoned { token: Token },
    #[error("Failed to downcast, required: '{required}' actual: '{actual}'")]
    TypeMismatch {
        required: &'static str,
        actual: &'static str,
    },
}
impl ResolveError {
    /// The path leading to the error, if the error has one
    pub fn path(&self) -> Option<&ResolutionPath> {
        match self {
            ResolveError::UnknownDependency { path, .. }
            | ResolveError::CircularDependency { path }
            | ResolveError::Instantiation { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_unknown_dependency(&self) -> bool {
        matches!(self, ResolveError::UnknownDependency { .. })
    }

    pub fn is_circular_dependency(&self) -> bool {
        matches!(self, ResolveError::CircularDependency { .. })
    }
}

fn requester(requested_by: &Option<Token>) -> String {
    requested_by
        .as_ref()
        .map_or_else(|| String::from("<root>"), ToString::to_string)
}

/// Misuse of the arguments handed to a constructor or factory
#[derive(Error, Debug, Clone)]
pub enum ArgumentError {
    #[error("'{requested_by}' asked for argument {index} but only {len} were declared")]
    OutOfRange {
        requested_by: Token,
        index: usize,
        len: usize,
    },
    #[error("Argument {index} of '{requested_by}' is absent - access it as optional")]
    Absent { requested_by: Token, index: usize },
    #[error("Argument {index} of '{requested_by}' is a forward reference that is not resolved yet - access it lazily")]
    Unresolved { requested_by: Token, index: usize },
    #[error("Argument {index} of '{requested_by}' has type '{actual}', not '{required}'")]
    TypeMismatch {
        requested_by: Token,
        index: usize,
        required: &'static str,
        actual: &'static str,
    },
}

/// Errors while eagerly instantiating the container
#[derive(Error, Debug, Clone)]
pub enum BootstrapError {
    #[error("Initiation timed out")]
    Timeout,
    #[error("Initiating module '{module}' failed - error: {error}")]
    Resolve { module: Token, error: ResolveError },
}

#[cfg(test)]
mod tests {
    use super::ResolutionPath;
    use crate::types::Token;

    #[test]
    fn it_renders_the_path() {
        let path = ResolutionPath(vec![Token::name("A"), Token::name("B"), Token::name("A")]);

        assert_eq!(path.to_string(), "\"A\" -> \"B\" -> \"A\"");
        assert!(path.contains_sequence(&[Token::name("B"), Token::name("A")]));
        assert!(!path.contains_sequence(&[Token::name("A"), Token::name("A")]));
        assert_eq!(ResolutionPath::default().to_string(), "<root>");
    }
}
