//! Keel Config publishes application configs as a global module, so every provider can
//! depend on them without importing anything.
//!
//! Register the configs on a [`ConfigProvider`](provider::ConfigProvider), publish it with
//! [`ConfigProvider::register`](provider::ConfigProvider::register) and take them out of the
//! constructor arguments with [`Config`](config::Config).
//!
//! # Examples
//!
//! ```rust
//! use keel_config::{config::Config, provider::ConfigProvider};
//! use keel_di::{ArgumentError, ContainerBuilder, ModuleDefinition, Provider};
//!
//! struct DatabaseConfig {
//!     url: String,
//!     pool_size: usize,
//! }
//!
//! struct Pool {
//!     url: String,
//!     connections: usize,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .register_module(ModuleDefinition::new("DatabaseModule").provider(Provider::class_with(
//!         vec![Config::<DatabaseConfig>::dependency()],
//!         |args| {
//!             let config = Config::<DatabaseConfig>::from_arguments(args, 0)?;
//!             Ok::<_, ArgumentError>(Pool {
//!                 url: config.url.clone(),
//!                 connections: config.pool_size,
//!             })
//!         },
//!     )))
//!     .unwrap();
//!
//! let mut configs = ConfigProvider::new();
//! configs
//!     .add_config(DatabaseConfig {
//!         url: "postgres://localhost".to_string(),
//!         pool_size: 8,
//!     })
//!     .unwrap();
//! let config_module = configs.register(&mut builder).unwrap();
//! let container = builder.build();
//!
//! assert!(container.module(config_module).unwrap().is_global());
//! let pool = futures::executor::block_on(container.get::<Pool>(None)).unwrap();
//! assert_eq!(pool.url, "postgres://localhost");
//! assert_eq!(pool.connections, 8);
//! ```

pub mod config;
pub mod errors;
pub mod provider;
