use crate::{
    DynSvc, RootGate, Service, ServiceContainer, ServiceInfo, ServiceResult,
    Svc,
};
use parking_lot::{ReentrantMutex, RwLock};
use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::{Debug, Formatter},
};
use tracing::{debug, warn};

/// How first-time construction of a singleton is coordinated between
/// requests running at the same time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SingletonConstruction {
    /// A single process-wide lock guards the check, construction and caching
    /// of singletons, so each singleton is constructed exactly once. The lock
    /// is re-entrant: a singleton may request other singletons while it is
    /// being constructed on the same thread.
    #[default]
    Serialized,

    /// No lock is taken while constructing. Two requests may construct the
    /// same singleton concurrently; the first one cached wins and the other
    /// instance is dropped.
    Unsynchronized,
}

/// The process-wide state shared by every [`ServiceContainer`]: the singleton
/// map and the container configuration.
///
/// Cloning a [`SharedServices`] does not clone the singletons inside of it.
/// Both handles refer to the same singletons, so the store can be handed to
/// every worker of a web server.
///
/// ```
/// use dew_services::{RootGate, SharedServices};
///
/// let shared = SharedServices::builder()
///     .root_gate(RootGate::ExplicitFlag)
///     .build();
///
/// let first = shared.create_container();
/// let second = shared.clone().create_container();
/// assert!(shared.is_empty());
/// # drop((first, second));
/// ```
#[derive(Clone)]
pub struct SharedServices {
    inner: Svc<SharedInner>,
}

struct SharedInner {
    singletons: RwLock<HashMap<ServiceInfo, DynSvc>>,
    construction_lock: ReentrantMutex<()>,
    root_gate: RootGate,
    singleton_construction: SingletonConstruction,
}

impl SharedServices {
    /// Creates a store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        SharedServices::builder().build()
    }

    /// Creates a builder for configuring a store.
    #[must_use]
    pub fn builder() -> SharedServicesBuilder {
        SharedServicesBuilder::default()
    }

    /// Creates a fresh container with an empty scoped map backed by this
    /// store. Typically called once per inbound request.
    #[must_use]
    pub fn create_container(&self) -> ServiceContainer {
        ServiceContainer::new(self.clone())
    }

    /// Gets the policy used to authorize construction of root services.
    #[must_use]
    pub fn root_gate(&self) -> RootGate {
        self.inner.root_gate
    }

    /// Gets the policy used to coordinate singleton construction.
    #[must_use]
    pub fn singleton_construction(&self) -> SingletonConstruction {
        self.inner.singleton_construction
    }

    /// Checks whether a singleton of type `T` has been constructed.
    #[must_use]
    pub fn contains<T: Service>(&self) -> bool {
        self.inner
            .singletons
            .read()
            .contains_key(&ServiceInfo::of::<T>())
    }

    /// Gets the number of constructed singletons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.singletons.read().len()
    }

    /// Checks whether no singletons have been constructed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.singletons.read().is_empty()
    }

    pub(crate) fn get(&self, service_info: ServiceInfo) -> Option<DynSvc> {
        self.inner.singletons.read().get(&service_info).cloned()
    }

    /// Gets the cached singleton, or constructs and caches one. Nothing is
    /// cached if construction fails.
    pub(crate) fn get_or_try_insert_with<F>(
        &self,
        service_info: ServiceInfo,
        construct: F,
    ) -> ServiceResult<DynSvc>
    where
        F: FnOnce() -> ServiceResult<DynSvc>,
    {
        if let Some(service) = self.get(service_info) {
            return Ok(service);
        }

        match self.inner.singleton_construction {
            SingletonConstruction::Serialized => {
                let _lock = self.inner.construction_lock.lock();

                // Another request may have finished constructing it while we
                // were waiting for the lock.
                if let Some(service) = self.get(service_info) {
                    return Ok(service);
                }

                let service = construct()?;
                Ok(self.insert_first(service_info, service))
            }
            SingletonConstruction::Unsynchronized => {
                let service = construct()?;
                Ok(self.insert_first(service_info, service))
            }
        }
    }

    fn insert_first(&self, service_info: ServiceInfo, service: DynSvc) -> DynSvc {
        match self.inner.singletons.write().entry(service_info) {
            Entry::Occupied(entry) => {
                warn!(
                    service = service_info.name(),
                    "singleton was constructed concurrently, discarding the duplicate"
                );
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                debug!(service = service_info.name(), "cached singleton");
                entry.insert(service).clone()
            }
        }
    }
}

impl Default for SharedServices {
    fn default() -> Self {
        SharedServices::new()
    }
}

impl Debug for SharedServices {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let singletons = self.inner.singletons.read();
        f.debug_struct("SharedServices")
            .field(
                "singletons",
                &singletons.keys().map(ServiceInfo::name).collect::<Vec<_>>(),
            )
            .field("root_gate", &self.inner.root_gate)
            .field(
                "singleton_construction",
                &self.inner.singleton_construction,
            )
            .finish()
    }
}

/// A builder for [`SharedServices`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedServicesBuilder {
    root_gate: RootGate,
    singleton_construction: SingletonConstruction,
}

impl SharedServicesBuilder {
    /// Sets the policy used to authorize construction of root services.
    #[must_use]
    pub fn root_gate(mut self, root_gate: RootGate) -> Self {
        self.root_gate = root_gate;
        self
    }

    /// Sets how first-time construction of singletons is coordinated.
    #[must_use]
    pub fn singleton_construction(
        mut self,
        singleton_construction: SingletonConstruction,
    ) -> Self {
        self.singleton_construction = singleton_construction;
        self
    }

    /// Builds the store. The store starts without any singletons.
    #[must_use]
    pub fn build(self) -> SharedServices {
        SharedServices {
            inner: Svc::new(SharedInner {
                singletons: RwLock::new(HashMap::new()),
                construction_lock: ReentrantMutex::new(()),
                root_gate: self.root_gate,
                singleton_construction: self.singleton_construction,
            }),
        }
    }
}
