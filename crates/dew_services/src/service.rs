#![allow(clippy::used_underscore_binding)]

use crate::{ArgsError, ServiceArgs, ServiceRegistry};
use derive_more::Display;
use downcast_rs::{impl_downcast, DowncastSync};
use std::{
    any::{Any, TypeId},
    error::Error,
    fmt::{Display as FmtDisplay, Formatter},
};

/// A reference-counted pointer holding a service. Services are always shared
/// through [`Arc<T>`](std::sync::Arc) since singletons outlive the request
/// (and the thread) that created them.
pub type Svc<T> = std::sync::Arc<T>;

/// A service pointer holding an instance of `dyn Service`.
pub type DynSvc = Svc<dyn Service>;

/// A result from attempting to construct, initialize or look up a service.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// The capability set every service implements.
///
/// Services are created through [`Default`], then given a chance to pull
/// whatever they depend on from the registry that is constructing them, then
/// initialized with the arguments supplied by the caller. Nothing is
/// auto-wired: a service asks for its dependencies itself.
///
/// ```
/// use dew_services::{
///     Service, ServiceArgs, ServiceRegistry, ServiceResult, SharedServices,
///     Svc,
/// };
///
/// #[derive(Default)]
/// struct Clock;
///
/// impl Service for Clock {
///     fn request_dependency_services(
///         &mut self,
///         _services: &ServiceRegistry,
///     ) -> ServiceResult<()> {
///         Ok(())
///     }
///
///     fn init_service(
///         &mut self,
///         _args: Option<&mut ServiceArgs>,
///     ) -> ServiceResult<()> {
///         Ok(())
///     }
/// }
///
/// #[derive(Default)]
/// struct Greeter {
///     clock: Option<Svc<Clock>>,
///     greeting: String,
/// }
///
/// impl Service for Greeter {
///     fn request_dependency_services(
///         &mut self,
///         services: &ServiceRegistry,
///     ) -> ServiceResult<()> {
///         self.clock = Some(services.get_service_singleton()?);
///         Ok(())
///     }
///
///     fn init_service(
///         &mut self,
///         args: Option<&mut ServiceArgs>,
///     ) -> ServiceResult<()> {
///         self.greeting = match args {
///             Some(args) => args.get_argument::<String>("greeting")?.clone(),
///             None => "hello".to_owned(),
///         };
///         Ok(())
///     }
/// }
///
/// let shared = SharedServices::new();
/// let container = shared.create_container();
/// let greeter: Svc<Greeter> = container.get_service_scoped().unwrap();
/// assert_eq!("hello", greeter.greeting);
/// assert!(shared.contains::<Clock>());
/// ```
pub trait Service: DowncastSync {
    /// Requests the services this one depends on. Called exactly once per
    /// constructed instance, before [`Service::init_service`].
    fn request_dependency_services(
        &mut self,
        services: &ServiceRegistry,
    ) -> ServiceResult<()>;

    /// Completes setup using the arguments supplied by the caller, if any.
    fn init_service(
        &mut self,
        args: Option<&mut ServiceArgs>,
    ) -> ServiceResult<()>;

    /// Queries whether this service carries the [`RootService`] capability.
    ///
    /// Root services override this to return `Some(self)`:
    ///
    /// ```
    /// # use dew_services::{RootService, Service, ServiceArgs, ServiceRegistry, ServiceResult};
    /// #[derive(Default)]
    /// struct Database;
    ///
    /// impl RootService for Database {}
    ///
    /// impl Service for Database {
    /// #   fn request_dependency_services(&mut self, _: &ServiceRegistry) -> ServiceResult<()> { Ok(()) }
    /// #   fn init_service(&mut self, _: Option<&mut ServiceArgs>) -> ServiceResult<()> { Ok(()) }
    ///     // ...
    ///     fn as_root_service(&self) -> Option<&dyn RootService> {
    ///         Some(self)
    ///     }
    /// }
    /// ```
    fn as_root_service(&self) -> Option<&dyn RootService> {
        None
    }
}

impl_downcast!(sync Service);

/// Marks a privileged service. Root services are only constructed when the
/// caller explicitly authorizes it, so they never come to life implicitly as
/// somebody else's dependency. See [`RootGate`](crate::RootGate).
pub trait RootService: Send + Sync {}

/// Type information about a service. This is the key services are cached
/// under.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl FmtDisplay for ServiceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// An error that has occurred while resolving a service.
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum ServiceError {
    /// A root service was requested without authorization.
    #[display(
        fmt = "{} is a root service and its construction was not authorized",
        service_info
    )]
    ServiceNotInitialized {
        /// The service that was requested.
        service_info: ServiceInfo,
    },

    /// The instance cached under a service's identity is not of the
    /// requested type. This is a bug in the registry, not in the caller.
    #[display(fmt = "the instance cached for {} has the wrong type", service_info)]
    InvalidCast {
        /// The service that was requested.
        service_info: ServiceInfo,
    },

    /// A service requested itself, directly or transitively, while it was
    /// being constructed.
    #[display(
        fmt = "a cycle was detected during construction of {} [{}]",
        service_info,
        "fmt_cycle(cycle)"
    )]
    CycleDetected {
        /// The service that was requested.
        service_info: ServiceInfo,

        /// The chain of services being constructed, ending with the service
        /// that was requested again.
        cycle: Vec<ServiceInfo>,
    },

    /// A strict argument lookup failed during initialization.
    #[display(fmt = "{}", _0)]
    Args(ArgsError),

    /// A service failed to set itself up.
    #[display(
        fmt = "an error occurred during activation of {}: {}",
        service_info,
        inner
    )]
    ActivationFailed {
        /// The service that failed.
        service_info: ServiceInfo,

        /// The error reported by the service.
        inner: Box<dyn Error + Send + Sync + 'static>,
    },
}

impl ServiceError {
    /// Wraps a custom error raised while activating the service `S`.
    #[must_use]
    pub fn activation_failed<S: ?Sized + Any>(
        inner: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        ServiceError::ActivationFailed {
            service_info: ServiceInfo::of::<S>(),
            inner: inner.into(),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceError::Args(inner) => Some(inner),
            ServiceError::ActivationFailed { inner, .. } => {
                Some(inner.as_ref())
            }
            _ => None,
        }
    }
}

impl From<ArgsError> for ServiceError {
    fn from(error: ArgsError) -> Self {
        ServiceError::Args(error)
    }
}

fn fmt_cycle(cycle: &[ServiceInfo]) -> String {
    let mut joined = String::new();
    for item in cycle {
        if !joined.is_empty() {
            joined.push_str(" -> ");
        }
        joined.push_str(item.name());
    }
    joined
}
