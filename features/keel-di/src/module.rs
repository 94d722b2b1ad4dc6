use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

use crate::{
    node::NodeId,
    provider::Provider,
    types::Token,
};

/// Reference to a registered module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);
impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declaration of a module, as handed over by whoever builds the module graph
///
/// Providers are added first, then imports, then exports - so a definition
/// may export its own providers and its imports.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub(crate) token: Token,
    pub(crate) global: bool,
    pub(crate) providers: Vec<Provider>,
    pub(crate) imports: Vec<ModuleId>,
    pub(crate) exports: Vec<Token>,
}
impl ModuleDefinition {
    pub fn new(token: impl Into<Token>) -> Self {
        ModuleDefinition {
            token: token.into(),
            global: false,
            providers: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// A module identified by the type `T`
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::new(Token::of::<T>())
    }

    /// Global modules are imported by every other module
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn import(mut self, module: ModuleId) -> Self {
        self.imports.push(module);
        self
    }

    pub fn export(mut self, token: impl Into<Token>) -> Self {
        self.exports.push(token.into());
        self
    }
}

/// A registered module
#[derive(Debug)]
pub(crate) struct Module {
    pub(crate) id: ModuleId,
    pub(crate) token: Token,
    pub(crate) global: bool,
    pub(crate) providers: HashMap<Token, NodeId>,
    /// Ordered, the import graph is walked breadth first in this order
    pub(crate) imports: Vec<ModuleId>,
    pub(crate) exports: HashSet<Token>,
    pub(crate) distance: usize,
}
impl Module {
    pub(crate) fn new(id: ModuleId, token: Token, global: bool) -> Self {
        Module {
            id,
            token,
            global,
            providers: HashMap::new(),
            imports: Vec::new(),
            exports: HashSet::new(),
            distance: 0,
        }
    }

    /// Returns true if the import was added
    pub(crate) fn add_import(&mut self, module: ModuleId) -> bool {
        if module == self.id || self.imports.contains(&module) {
            return false;
        }
        self.imports.push(module);
        true
    }
}

/// Read only view of a module in a built container
#[derive(Debug, Clone, Copy)]
pub struct ModuleInfo<'c> {
    pub(crate) module: &'c Module,
}
impl<'c> ModuleInfo<'c> {
    pub fn id(&self) -> ModuleId {
        self.module.id
    }

    pub fn token(&self) -> &'c Token {
        &self.module.token
    }

    pub fn is_global(&self) -> bool {
        self.module.global
    }

    /// Length of the longest import chain from the root module
    pub fn distance(&self) -> usize {
        self.module.distance
    }

    pub fn imports(&self) -> &'c [ModuleId] {
        &self.module.imports
    }

    pub fn exports(&self) -> impl Iterator<Item = &'c Token> + 'c {
        self.module.exports.iter()
    }

    pub fn exports_token(&self, token: &Token) -> bool {
        self.module.exports.contains(token)
    }

    pub fn providers(&self) -> impl Iterator<Item = &'c Token> + 'c {
        self.module.providers.keys()
    }

    pub fn has_provider(&self, token: &Token) -> bool {
        self.module.providers.contains_key(token)
    }
}
