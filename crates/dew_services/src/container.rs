use crate::{ServiceRegistry, SharedServices, Svc};
use std::{
    fmt::{Debug, Formatter},
    ops::Deref,
};

/// A per-request service container. Owns one scoped map and resolves
/// singletons through the [`SharedServices`] it was created from.
///
/// Cloning a container does not clone the services inside of it. When the
/// last handle is dropped, the scoped map is dropped along with every scoped
/// instance nobody else holds on to.
///
/// ```
/// use dew_services::{
///     Service, ServiceArgs, ServiceRegistry, ServiceResult, SharedServices,
///     Svc,
/// };
///
/// #[derive(Default)]
/// struct RequestId(u64);
///
/// impl Service for RequestId {
///     fn request_dependency_services(
///         &mut self,
///         _services: &ServiceRegistry,
///     ) -> ServiceResult<()> {
///         Ok(())
///     }
///
///     fn init_service(
///         &mut self,
///         args: Option<&mut ServiceArgs>,
///     ) -> ServiceResult<()> {
///         let id = args
///             .as_deref()
///             .and_then(ServiceArgs::get_argument_of::<u64>);
///         if let Some(id) = id {
///             self.0 = *id;
///         }
///         Ok(())
///     }
/// }
///
/// let shared = SharedServices::new();
/// let container = shared.create_container();
///
/// let mut args = ServiceArgs::new();
/// args.add_typed(7u64).unwrap();
/// let first: Svc<RequestId> =
///     container.get_service_scoped_with(Some(args), false).unwrap();
/// let second: Svc<RequestId> = container.get_service_scoped().unwrap();
///
/// assert_eq!(7, second.0);
/// assert!(Svc::ptr_eq(&first, &second));
///
/// // Another request gets its own scoped instance.
/// let other = shared.create_container();
/// let third: Svc<RequestId> = other.get_service_scoped().unwrap();
/// assert_eq!(0, third.0);
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    registry: Svc<ServiceRegistry>,
}

impl ServiceContainer {
    /// Creates a container with an empty scoped map backed by the given
    /// store. [`SharedServices::create_container`] does the same.
    #[must_use]
    pub fn new(shared: SharedServices) -> Self {
        ServiceContainer {
            registry: Svc::new(ServiceRegistry::new(shared)),
        }
    }

    /// Gets the registry resolving services for this container.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Checks whether two handles refer to the same container.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Svc::ptr_eq(&this.registry, &other.registry)
    }
}

impl Deref for ServiceContainer {
    type Target = ServiceRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl Debug for ServiceContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServiceContainer")
            .field(&*self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_refer_to_the_same_container() {
        let shared = SharedServices::new();
        let container = shared.create_container();
        let clone = container.clone();
        assert!(ServiceContainer::ptr_eq(&container, &clone));
        assert!(!ServiceContainer::ptr_eq(
            &container,
            &shared.create_container()
        ));
    }
}
