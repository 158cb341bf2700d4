use crate::ServiceContainerExt;
use actix_web::{
    dev::Payload, error::ErrorInternalServerError, FromRequest, HttpRequest,
};
use dew_services::{
    Service, ServiceContainer, ServiceRegistry, ServiceResult, Svc,
};
use futures_util::future::{err, ok, Ready};
use std::{
    fmt::{Debug, Display, Formatter},
    ops::Deref,
};
use tracing::warn;

const MISSING_CONTAINER: &str =
    "no service container is attached to this request";

fn request_container(req: &HttpRequest) -> actix_web::Result<ServiceContainer> {
    req.service_container().ok_or_else(|| {
        warn!(path = req.path(), "{}", MISSING_CONTAINER);
        ErrorInternalServerError(MISSING_CONTAINER)
    })
}

/// The [`ServiceContainer`] of the current request, as a handler parameter.
///
/// Extraction fails with an internal server error if the
/// [`DewServices`](crate::DewServices) middleware did not run for the
/// request.
#[derive(Clone, Debug)]
pub struct RequestServices(ServiceContainer);

impl RequestServices {
    /// Converts a [`RequestServices`] to the container it wraps.
    #[must_use]
    pub fn into_inner(value: RequestServices) -> ServiceContainer {
        value.0
    }
}

impl Deref for RequestServices {
    type Target = ServiceRegistry;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for RequestServices {
    type Error = actix_web::Error;
    type Future = Ready<actix_web::Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match request_container(req) {
            Ok(container) => ok(RequestServices(container)),
            Err(error) => err(error),
        }
    }
}

macro_rules! service_extractor {
    ($(#[$attr:meta])* $name:ident => $resolve:ident) => {
        $(#[$attr])*
        pub struct $name<T: Service>(Svc<T>);

        impl<T: Service> $name<T> {
            #[doc = concat!("Converts a [`", stringify!($name), "`] to the service it wraps.")]
            pub fn into_inner(value: $name<T>) -> Svc<T> {
                value.0
            }
        }

        impl<T: Service> Clone for $name<T> {
            fn clone(&self) -> Self {
                $name(Svc::clone(&self.0))
            }
        }

        impl<T: Service> Deref for $name<T> {
            type Target = T;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<T: Service + Debug> Debug for $name<T> {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl<T: Service + Display> Display for $name<T> {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&*self.0, f)
            }
        }

        impl<T: Service + Default> FromRequest for $name<T> {
            type Error = actix_web::Error;
            type Future = Ready<actix_web::Result<Self>>;

            fn from_request(
                req: &HttpRequest,
                _payload: &mut Payload,
            ) -> Self::Future {
                let container = match request_container(req) {
                    Ok(container) => container,
                    Err(error) => return err(error),
                };

                let service: ServiceResult<Svc<T>> = container.$resolve();
                match service {
                    Ok(service) => ok($name(service)),
                    Err(error) => err(ErrorInternalServerError(error)),
                }
            }
        }
    };
}

service_extractor! {
    /// A service resolved with
    /// [`get_service`](ServiceRegistry::get_service) from the request's
    /// container: the existing singleton, else the existing scoped instance,
    /// else a new transient instance.
    ///
    /// Root services can't be constructed through an extractor. Construct
    /// them in the [`DewServices`](crate::DewServices) configuration callback
    /// and they will be found here.
    Injected => get_service
}

service_extractor! {
    /// A service scoped to the request's container, constructed on first use.
    Scoped => get_service_scoped
}

service_extractor! {
    /// A process-wide service, constructed on first use from any request.
    Singleton => get_service_singleton
}
