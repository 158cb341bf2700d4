//! # Request-scoped service location.
//!
//! `dew_services` resolves, lazily constructs and caches service instances by
//! type. Each inbound request gets its own [`ServiceContainer`], and request
//! handling code asks that container for the services it needs. A service
//! that depends on other services pulls them from the same container while it
//! is being constructed, so dependencies are requested imperatively rather
//! than wired through constructors.
//!
//! ## Service lifetimes
//!
//! The lifetime of an instance is chosen by the caller at the call site, not
//! at registration time. There is no registration step at all: any type
//! implementing [`Service`] and [`Default`] can be requested.
//!
//! - **Transient** ([`get_service_instance`]): a new instance is constructed
//!   for each call and never cached.
//! - **Scoped** ([`get_service_scoped`]): one instance per container, which
//!   usually means one instance per request.
//! - **Singleton** ([`get_service_singleton`]): one instance for the whole
//!   process, shared by every container created from the same
//!   [`SharedServices`].
//!
//! [`get_service`] returns the most durable instance that already exists
//! (singleton, then scoped) and falls back to a new transient instance.
//!
//! Every operation also has a `_with` form taking initialization
//! [`ServiceArgs`] and the root authorization flag. The arguments are only
//! used when an instance is actually constructed.
//!
//! ## Root services
//!
//! Some services should never be created by accident as another service's
//! dependency, for example a database service that needs a connection string.
//! Such services implement the [`RootService`] marker and return it from
//! [`Service::as_root_service`]. Requesting them fails with
//! [`ServiceError::ServiceNotInitialized`] unless the caller authorizes the
//! construction. How authorization works is configured through [`RootGate`].
//!
//! ## Example
//!
//! ```
//! use dew_services::{
//!     RootService, Service, ServiceArgs, ServiceError, ServiceRegistry,
//!     ServiceResult, SharedServices, Svc,
//! };
//!
//! #[derive(Default)]
//! struct Logger;
//!
//! impl Service for Logger {
//!     fn request_dependency_services(
//!         &mut self,
//!         _services: &ServiceRegistry,
//!     ) -> ServiceResult<()> {
//!         Ok(())
//!     }
//!
//!     fn init_service(
//!         &mut self,
//!         _args: Option<&mut ServiceArgs>,
//!     ) -> ServiceResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Database {
//!     logger: Option<Svc<Logger>>,
//!     url: String,
//! }
//!
//! impl RootService for Database {}
//!
//! impl Service for Database {
//!     fn request_dependency_services(
//!         &mut self,
//!         services: &ServiceRegistry,
//!     ) -> ServiceResult<()> {
//!         self.logger = Some(services.get_service_singleton()?);
//!         Ok(())
//!     }
//!
//!     fn init_service(
//!         &mut self,
//!         args: Option<&mut ServiceArgs>,
//!     ) -> ServiceResult<()> {
//!         if let Some(args) = args {
//!             self.url = args.take_argument("url")?;
//!         }
//!         Ok(())
//!     }
//!
//!     fn as_root_service(&self) -> Option<&dyn RootService> {
//!         Some(self)
//!     }
//! }
//!
//! fn main() -> Result<(), ServiceError> {
//!     // Created once and shared by every request.
//!     let shared = SharedServices::new();
//!
//!     // Created for each request.
//!     let container = shared.create_container();
//!
//!     // Root services must be explicitly authorized...
//!     assert!(container.get_service_scoped::<Database>().is_err());
//!
//!     // ...and then behave like any other service.
//!     let mut args = ServiceArgs::new();
//!     args.add("url", "postgres://localhost/app".to_owned())?;
//!     let database: Svc<Database> =
//!         container.get_service_scoped_with(Some(args), true)?;
//!     let again: Svc<Database> = container.get_service_scoped()?;
//!
//!     assert!(Svc::ptr_eq(&database, &again));
//!     assert_eq!("postgres://localhost/app", again.url);
//!     assert!(shared.contains::<Logger>());
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! A container belongs to one request and is not meant to be used by several
//! threads at once. The singletons are shared by all requests. By default, a
//! single re-entrant lock serializes first-time singleton construction so each
//! singleton is constructed exactly once. See [`SingletonConstruction`].
//!
//! [`get_service`]: ServiceRegistry::get_service
//! [`get_service_instance`]: ServiceRegistry::get_service_instance
//! [`get_service_scoped`]: ServiceRegistry::get_service_scoped
//! [`get_service_singleton`]: ServiceRegistry::get_service_singleton

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::needless_doctest_main
)]

mod args;
mod container;
mod gate;
mod registry;
mod service;
mod shared;

pub use args::*;
pub use container::*;
pub use gate::*;
pub use registry::*;
pub use service::*;
pub use shared::*;
