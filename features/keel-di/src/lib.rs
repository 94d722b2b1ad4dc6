//! Keel DI resolves instances out of a graph of modules and the providers they declare.
//!
//! Keel DI is split into two major parts:
//! 1. ContainerBuilder: Used to register modules, providers, imports and exports
//! 2. Container: The sealed graph, which produces instances on demand
//!
//! A module only sees its own providers and what its imports export. Providers are
//! either singletons, bound to a request context, or transient. Every instance is
//! constructed at most once per scope, even if requested concurrently.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use keel_di::{ContainerBuilder, Dependency, ModuleDefinition, Provider, Scope};
//!
//! struct Database {
//!     url: String,
//! }
//! struct Session {
//!     db: Arc<Database>,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! let database = builder
//!     .register_module(
//!         ModuleDefinition::new("DatabaseModule")
//!             .provider(Provider::value(Database {
//!                 url: "postgres://localhost".to_string(),
//!             }))
//!             .export(keel_di::Token::of::<Database>()),
//!     )
//!     .unwrap();
//! builder
//!     .register_module(
//!         ModuleDefinition::new("AppModule").import(database).provider(
//!             Provider::class_with(vec![Dependency::on::<Database>()], |args| {
//!                 Ok::<_, keel_di::ArgumentError>(Session { db: args.get(0)? })
//!             })
//!             .scope(Scope::Request),
//!         ),
//!     )
//!     .unwrap();
//! let container = builder.build();
//!
//! futures::executor::block_on(async {
//!     let request = container.create_context();
//!     let session = container.get::<Session>(Some(&request)).await.unwrap();
//!     assert_eq!(session.db.url, "postgres://localhost");
//!     container.release(&request);
//! });
//! ```

mod arguments;
mod bootstrap;
mod builder;
mod container;
mod context;
mod errors;
mod factories;
mod graph;
mod injector;
mod lazy;
mod module;
mod node;
mod provider;
mod scope;
mod types;

pub use arguments::Arguments;
pub use builder::ContainerBuilder;
pub use container::{Container, ResolveOptions};
pub use context::{ContextDeriver, ContextId, Inquirer, STATIC_CONTEXT, STATIC_CONTEXT_ID};
pub use errors::{
    ArgumentError, BootstrapError, RegistrationError, ResolutionPath, ResolveError,
};
pub use factories::{Constructible, DynConstructor, DynFactory};
pub use lazy::Lazy;
pub use module::{ModuleDefinition, ModuleId, ModuleInfo};
pub use node::NodeId;
pub use provider::{Dependency, DependencyToken, Provider, ProviderDefinition, Scope};
pub use types::{DynError, Injectable, Instance, Token, TypeInfo};
