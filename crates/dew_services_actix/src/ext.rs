use actix_web::HttpMessage;
use dew_services::ServiceContainer;

/// Gives access to the [`ServiceContainer`] attached to a request by the
/// [`DewServices`](crate::DewServices) middleware.
///
/// Implemented for both [`HttpRequest`](actix_web::HttpRequest) and
/// [`ServiceRequest`](actix_web::dev::ServiceRequest), so handlers and
/// middleware running after [`DewServices`](crate::DewServices) can both
/// reach the container.
pub trait ServiceContainerExt {
    /// Gets the container attached to this request, if any.
    fn service_container(&self) -> Option<ServiceContainer>;
}

impl<M: HttpMessage> ServiceContainerExt for M {
    fn service_container(&self) -> Option<ServiceContainer> {
        self.extensions().get::<ServiceContainer>().cloned()
    }
}
