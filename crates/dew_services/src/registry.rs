use crate::{
    DynSvc, Service, ServiceArgs, ServiceError, ServiceInfo, ServiceResult,
    SharedServices, Svc,
};
use parking_lot::Mutex;
use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::{Debug, Formatter},
    thread::ThreadId,
};
use tracing::{debug, trace};

/// Resolves services for one container. Holds the scoped map owned by the
/// container and a handle to the process-wide singletons.
///
/// Every retrieval operation is generic over the service type and comes in
/// two forms: one taking the initialization arguments and the root
/// authorization flag, and a shorthand that passes no arguments and
/// `is_root = false`.
///
/// Arguments are only used when a new instance is actually constructed. A
/// request answered from a cache ignores them.
pub struct ServiceRegistry {
    shared: SharedServices,
    scoped: Mutex<HashMap<ServiceInfo, DynSvc>>,
    resolving: ResolutionStacks,
}

/// The services being constructed by one registry, tracked separately for
/// each thread using it.
type ResolutionStacks = Mutex<HashMap<ThreadId, Vec<ServiceInfo>>>;

impl ServiceRegistry {
    pub(crate) fn new(shared: SharedServices) -> Self {
        ServiceRegistry {
            shared,
            scoped: Mutex::default(),
            resolving: Mutex::default(),
        }
    }

    /// Gets the process-wide store backing this registry.
    #[must_use]
    pub fn shared(&self) -> &SharedServices {
        &self.shared
    }

    /// Gets the most durable existing instance of a service: the singleton if
    /// one exists, else the scoped instance if one exists, else a new
    /// transient instance. The new instance is not cached.
    pub fn get_service<T: Service + Default>(&self) -> ServiceResult<Svc<T>> {
        self.get_service_with(None, false)
    }

    /// Like [`ServiceRegistry::get_service`], constructing the transient
    /// fallback with the given arguments and authorization.
    pub fn get_service_with<T: Service + Default>(
        &self,
        args: Option<ServiceArgs>,
        is_root: bool,
    ) -> ServiceResult<Svc<T>> {
        if let Some(service) = self.shared.get(ServiceInfo::of::<T>()) {
            trace!(service = std::any::type_name::<T>(), "singleton hit");
            return downcast(service);
        }

        if let Some(service) = self.scoped_instance()? {
            trace!(service = std::any::type_name::<T>(), "scoped hit");
            return Ok(service);
        }

        self.get_service_instance_with(args, is_root)
    }

    /// Constructs a new instance of a service. Never cached.
    pub fn get_service_instance<T: Service + Default>(
        &self,
    ) -> ServiceResult<Svc<T>> {
        self.get_service_instance_with(None, false)
    }

    /// Like [`ServiceRegistry::get_service_instance`], constructing the
    /// instance with the given arguments and authorization.
    pub fn get_service_instance_with<T: Service + Default>(
        &self,
        args: Option<ServiceArgs>,
        is_root: bool,
    ) -> ServiceResult<Svc<T>> {
        let service = self.construct::<T>(args, is_root)?;
        debug!(service = std::any::type_name::<T>(), "constructed transient");
        Ok(Svc::new(service))
    }

    /// Gets the instance of a service scoped to this container, constructing
    /// it on first request.
    pub fn get_service_scoped<T: Service + Default>(
        &self,
    ) -> ServiceResult<Svc<T>> {
        self.get_service_scoped_with(None, false)
    }

    /// Like [`ServiceRegistry::get_service_scoped`], constructing the
    /// instance with the given arguments and authorization if needed.
    pub fn get_service_scoped_with<T: Service + Default>(
        &self,
        args: Option<ServiceArgs>,
        is_root: bool,
    ) -> ServiceResult<Svc<T>> {
        if let Some(service) = self.scoped_instance()? {
            trace!(service = std::any::type_name::<T>(), "scoped hit");
            return Ok(service);
        }

        // The scoped map is not locked during construction since the service
        // may request other scoped services from this registry.
        let service_info = ServiceInfo::of::<T>();
        let service: DynSvc = Svc::new(self.construct::<T>(args, is_root)?);
        let service = match self.scoped.lock().entry(service_info) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                debug!(service = service_info.name(), "cached scoped");
                entry.insert(service).clone()
            }
        };

        downcast(service)
    }

    /// Gets the process-wide instance of a service, constructing it on first
    /// request from any container.
    pub fn get_service_singleton<T: Service + Default>(
        &self,
    ) -> ServiceResult<Svc<T>> {
        self.get_service_singleton_with(None, false)
    }

    /// Like [`ServiceRegistry::get_service_singleton`], constructing the
    /// instance with the given arguments and authorization if needed.
    pub fn get_service_singleton_with<T: Service + Default>(
        &self,
        args: Option<ServiceArgs>,
        is_root: bool,
    ) -> ServiceResult<Svc<T>> {
        let service = self.shared.get_or_try_insert_with(
            ServiceInfo::of::<T>(),
            || {
                let service = self.construct::<T>(args, is_root)?;
                Ok(Svc::new(service) as DynSvc)
            },
        )?;

        downcast(service)
    }

    /// Checks whether an instance of `T` is scoped to this container.
    #[must_use]
    pub fn has_scoped<T: Service>(&self) -> bool {
        self.scoped.lock().contains_key(&ServiceInfo::of::<T>())
    }

    /// Checks whether a process-wide instance of `T` exists.
    #[must_use]
    pub fn has_singleton<T: Service>(&self) -> bool {
        self.shared.contains::<T>()
    }

    fn scoped_instance<T: Service>(&self) -> ServiceResult<Option<Svc<T>>> {
        let service = self.scoped.lock().get(&ServiceInfo::of::<T>()).cloned();
        service.map(downcast::<T>).transpose()
    }

    /// Creates, gates, wires and initializes a new instance. The instance is
    /// only handed back if every step succeeded.
    fn construct<T: Service + Default>(
        &self,
        mut args: Option<ServiceArgs>,
        is_root: bool,
    ) -> ServiceResult<T> {
        let service_info = ServiceInfo::of::<T>();
        let _guard = ResolutionGuard::enter(&self.resolving, service_info)?;

        let mut service = T::default();
        self.shared
            .root_gate()
            .check(&service, is_root, args.is_some())?;
        service.request_dependency_services(self)?;
        service.init_service(args.as_mut())?;

        Ok(service)
    }
}

impl Debug for ServiceRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let scoped = self.scoped.lock();
        f.debug_struct("ServiceRegistry")
            .field(
                "scoped",
                &scoped.keys().map(ServiceInfo::name).collect::<Vec<_>>(),
            )
            .field("shared", &self.shared)
            .finish()
    }
}

fn downcast<T: Service>(service: DynSvc) -> ServiceResult<Svc<T>> {
    service
        .downcast_arc::<T>()
        .map_err(|_| ServiceError::InvalidCast {
            service_info: ServiceInfo::of::<T>(),
        })
}

/// Tracks the services being constructed by the current thread. Requesting a
/// service that is already on this thread's stack is a cycle. Other threads
/// constructing the same service through the same registry are not.
struct ResolutionGuard<'a> {
    stacks: &'a ResolutionStacks,
    thread: ThreadId,
}

impl<'a> ResolutionGuard<'a> {
    fn enter(
        stacks: &'a ResolutionStacks,
        service_info: ServiceInfo,
    ) -> ServiceResult<Self> {
        let thread = std::thread::current().id();
        let mut stacks_by_thread = stacks.lock();
        let resolving = stacks_by_thread.entry(thread).or_default();
        if resolving.contains(&service_info) {
            let mut cycle = resolving.clone();
            cycle.push(service_info);
            return Err(ServiceError::CycleDetected {
                service_info,
                cycle,
            });
        }

        resolving.push(service_info);
        Ok(ResolutionGuard { stacks, thread })
    }
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        let mut stacks = self.stacks.lock();
        if let Entry::Occupied(mut entry) = stacks.entry(self.thread) {
            entry.get_mut().pop();
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}
