use crate::{Service, ServiceError, ServiceInfo, ServiceResult};
use tracing::warn;

/// Decides when a [`RootService`](crate::RootService) may be constructed.
///
/// The gate is evaluated on every construction attempt. A rejection is never
/// remembered, so a later, properly authorized request for the same service
/// succeeds.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RootGate {
    /// Root services are only constructed when the caller passes
    /// `is_root = true`.
    #[default]
    ExplicitFlag,

    /// Root services are also constructed when the caller supplies
    /// initialization arguments, even with `is_root = false`.
    ArgsPresent,
}

impl RootGate {
    /// Checks whether a request with the given flag and arguments may
    /// construct a root service.
    #[must_use]
    pub fn authorizes(self, is_root: bool, has_args: bool) -> bool {
        match self {
            RootGate::ExplicitFlag => is_root,
            RootGate::ArgsPresent => is_root || has_args,
        }
    }

    /// Rejects a freshly created, not yet initialized service if it is a root
    /// service and the request is not authorized to construct it.
    pub(crate) fn check<S: Service>(
        self,
        service: &S,
        is_root: bool,
        has_args: bool,
    ) -> ServiceResult<()> {
        if service.as_root_service().is_none()
            || self.authorizes(is_root, has_args)
        {
            return Ok(());
        }

        let service_info = ServiceInfo::of::<S>();
        warn!(
            service = service_info.name(),
            gate = ?self,
            "root service requested without authorization"
        );
        Err(ServiceError::ServiceNotInitialized { service_info })
    }
}
