//! Core resolution runtime for Wasil.
//!
//! Register services on a [`ServiceCollection`], build a validated
//! [`Provider`], resolve from it or from a [`Scope`].

pub mod args;
mod cache;
pub mod collection;
pub mod descriptor;
pub mod dispose;
pub mod error;
pub mod graph;
pub mod key;
pub mod lifetime;
pub mod module;
pub mod options;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod service;
mod validate;

pub use args::Args;
pub use collection::ServiceCollection;
pub use descriptor::{CreationStrategy, Definition, Instance, Param, ServiceDescriptor};
pub use dispose::Dispose;
pub use error::{BoxError, Result, WasilError};
pub use key::ServiceKey;
pub use lifetime::Lifetime;
pub use module::{ModuleRegistry, ServiceModule};
pub use options::ProviderOptions;
pub use provider::Provider;
pub use resolver::{BoxFuture, Resolver, ResolverExt};
pub use scope::Scope;
pub use service::{Injectable, Service};

#[cfg(feature = "async")]
pub use service::AsyncFactory;

pub mod prelude {
    pub use crate::args::Args;
    pub use crate::collection::ServiceCollection;
    pub use crate::descriptor::Param;
    pub use crate::dispose::Dispose;
    pub use crate::error::{BoxError, Result, WasilError};
    pub use crate::key::ServiceKey;
    pub use crate::lifetime::Lifetime;
    pub use crate::provider::Provider;
    pub use crate::resolver::{Resolver, ResolverExt};
    pub use crate::scope::Scope;
    pub use crate::service::{Injectable, Service};
}
