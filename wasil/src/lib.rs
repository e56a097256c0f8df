//! # Wasil: dependency resolution runtime for Rust
//!
//! Register services with a lifetime, build a validated provider, and
//! resolve fully-constructed object graphs from it or from a scope.
//!
//! ```rust
//! use std::sync::Arc;
//! use wasil::prelude::*;
//!
//! struct Config { url: &'static str }
//!
//! #[derive(Injectable)]
//! struct Repo { config: Arc<Config> }
//!
//! #[derive(Injectable)]
//! struct UserService { repo: Arc<Repo> }
//!
//! let provider = ServiceCollection::new()
//!     .add_singleton(Service::instance(Config { url: "postgres://localhost" }))
//!     .add_scoped(Service::<Repo>::constructor())
//!     .add_transient(Service::<UserService>::constructor())
//!     .build_provider()
//!     .unwrap();
//!
//! let scope = provider.create_scope();
//! let service = scope.resolve::<UserService>().unwrap();
//! assert_eq!(service.repo.config.url, "postgres://localhost");
//! ```
//!
//! Build-time validation catches missing registrations, dependency cycles
//! and singletons capturing shorter-lived services before anything is
//! constructed.

pub use wasil_container::*;
pub use wasil_derive::*;
pub use wasil_support::*;

pub mod prelude {
    pub use wasil_container::prelude::*;
    pub use wasil_derive::Injectable;
}
