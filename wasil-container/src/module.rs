//! Service modules: groups of related registrations.
//!
//! # Examples
//! ```rust
//! use wasil_container::prelude::*;
//! use wasil_container::module::{ModuleRegistry, ServiceModule};
//!
//! struct Settings { retries: u32 }
//! struct Mailer { retries: u32 }
//!
//! struct MailModule;
//!
//! impl ServiceModule for MailModule {
//!     fn register(&self, registry: &mut dyn ModuleRegistry) {
//!         registry.register_singleton(Service::instance(Settings { retries: 3 }).into());
//!         registry.register_transient(
//!             Service::factory(vec![Param::of::<Settings>()], |args| {
//!                 Ok(Mailer { retries: args.take::<Settings>()?.retries })
//!             })
//!             .into(),
//!         );
//!     }
//! }
//!
//! let provider = ServiceCollection::new()
//!     .add_module(&MailModule)
//!     .build_provider()
//!     .unwrap();
//! assert_eq!(provider.resolve::<Mailer>().unwrap().retries, 3);
//! ```

use crate::descriptor::Definition;
use crate::lifetime::Lifetime;

/// A module that registers related services.
///
/// Split registrations by domain instead of one giant block:
///
/// ```rust,ignore
/// ServiceCollection::new()
///     .add_module(&DatabaseModule)
///     .add_module(&AuthModule)
///     .add_module(&MailModule)
/// ```
pub trait ServiceModule: Send + Sync {
    /// Registers this module's services. Called once per `add_module`.
    fn register(&self, registry: &mut dyn ModuleRegistry);

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The registration surface a [`ServiceModule`] sees.
///
/// Decoupled from [`ServiceCollection`](crate::collection::ServiceCollection)
/// so modules can be tested against a recording registry.
pub trait ModuleRegistry {
    fn register(&mut self, lifetime: Lifetime, definition: Definition);

    fn register_singleton(&mut self, definition: Definition) {
        self.register(Lifetime::Singleton, definition);
    }

    fn register_scoped(&mut self, definition: Definition) {
        self.register(Lifetime::Scoped, definition);
    }

    fn register_transient(&mut self, definition: Definition) {
        self.register(Lifetime::Transient, definition);
    }
}
