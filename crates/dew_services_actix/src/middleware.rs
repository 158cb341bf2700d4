use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    Error, HttpMessage,
};
use dew_services::{ServiceContainer, ServiceResult, SharedServices};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::{future::Future, rc::Rc};
use tracing::{debug, warn};

type ConfigureSync = dyn Fn(&ServiceContainer) -> ServiceResult<()>;
type ConfigureAsync =
    dyn Fn(ServiceContainer) -> LocalBoxFuture<'static, ServiceResult<()>>;

/// The callback run for each request right after its container is created.
/// A middleware holds exactly one of the two forms.
#[derive(Clone)]
enum ConfigureServices {
    Sync(Rc<ConfigureSync>),
    Async(Rc<ConfigureAsync>),
}

impl ConfigureServices {
    async fn run(self, container: ServiceContainer) -> ServiceResult<()> {
        match self {
            ConfigureServices::Sync(configure) => configure(&container),
            ConfigureServices::Async(configure) => configure(container).await,
        }
    }
}

/// Middleware creating one [`ServiceContainer`] per request.
///
/// The container is stored in the request extensions, where handlers and
/// later middleware find it through
/// [`ServiceContainerExt`](crate::ServiceContainerExt) or the
/// [`RequestServices`](crate::RequestServices) and [`Injected`](crate::Injected)
/// extractors. Before the rest of the pipeline runs, the configuration
/// callback is invoked once with the new container. If it fails, the request
/// ends with an internal server error.
///
/// ## Example
///
/// ```no_run
/// use actix_web::{get, App, HttpResponse, HttpServer, Responder};
/// use dew_services_actix::{
///     DewServices, Injected, Service, ServiceArgs, ServiceRegistry,
///     ServiceResult, SharedServices,
/// };
///
/// #[derive(Default)]
/// struct Greeting {
///     text: String,
/// }
///
/// impl Service for Greeting {
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
///         if let Some(args) = args {
///             self.text = args.take_argument("text")?;
///         }
///         Ok(())
///     }
/// }
///
/// #[actix_web::main]
/// async fn main() -> std::io::Result<()> {
///     let shared = SharedServices::new();
///     HttpServer::new(move || {
///         App::new()
///             .wrap(DewServices::new(shared.clone(), |container| {
///                 let mut args = ServiceArgs::new();
///                 args.add("text", "hello".to_owned())?;
///                 container
///                     .get_service_singleton_with::<Greeting>(Some(args), false)?;
///                 Ok(())
///             }))
///             .service(index)
///     })
///     .bind(("127.0.0.1", 8080))?
///     .run()
///     .await
/// }
///
/// #[get("/")]
/// async fn index(greeting: Injected<Greeting>) -> impl Responder {
///     HttpResponse::Ok().body(greeting.text.clone())
/// }
/// ```
pub struct DewServices {
    shared: SharedServices,
    configure: ConfigureServices,
}

impl DewServices {
    /// Creates the middleware with a synchronous configuration callback.
    pub fn new<F>(shared: SharedServices, configure: F) -> Self
    where
        F: Fn(&ServiceContainer) -> ServiceResult<()> + 'static,
    {
        DewServices {
            shared,
            configure: ConfigureServices::Sync(Rc::new(configure)),
        }
    }

    /// Creates the middleware with an asynchronous configuration callback.
    /// The returned future is awaited before the rest of the pipeline runs.
    pub fn new_async<F, Fut>(shared: SharedServices, configure: F) -> Self
    where
        F: Fn(ServiceContainer) -> Fut + 'static,
        Fut: Future<Output = ServiceResult<()>> + 'static,
    {
        DewServices {
            shared,
            configure: ConfigureServices::Async(Rc::new(move |container| {
                Box::pin(configure(container))
            })),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for DewServices
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>
        + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = DewServicesMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(DewServicesMiddleware {
            service: Rc::new(service),
            shared: self.shared.clone(),
            configure: self.configure.clone(),
        }))
    }
}

/// The service produced by the [`DewServices`] middleware.
pub struct DewServicesMiddleware<S> {
    service: Rc<S>,
    shared: SharedServices,
    configure: ConfigureServices,
}

impl<S, B> Service<ServiceRequest> for DewServicesMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>
        + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let container = self.shared.create_container();
        if req.extensions_mut().insert(container.clone()).is_some() {
            warn!(
                path = req.path(),
                "replaced a service container attached by another middleware"
            );
        }
        debug!(path = req.path(), "attached service container");

        let service = Rc::clone(&self.service);
        let configure = self.configure.clone();
        Box::pin(async move {
            configure
                .run(container)
                .await
                .map_err(ErrorInternalServerError)?;
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestServices, ServiceContainerExt};
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use dew_services::{
        RootService, Service as DewService, ServiceArgs, ServiceError,
        ServiceRegistry, Svc,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl DewService for Counter {
        fn request_dependency_services(
            &mut self,
            _services: &ServiceRegistry,
        ) -> ServiceResult<()> {
            Ok(())
        }

        fn init_service(
            &mut self,
            _args: Option<&mut ServiceArgs>,
        ) -> ServiceResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RequestId(usize);

    impl DewService for RequestId {
        fn request_dependency_services(
            &mut self,
            services: &ServiceRegistry,
        ) -> ServiceResult<()> {
            let counter: Svc<Counter> = services.get_service_singleton()?;
            self.0 = counter.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn init_service(
            &mut self,
            _args: Option<&mut ServiceArgs>,
        ) -> ServiceResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Secrets;

    impl RootService for Secrets {}

    impl DewService for Secrets {
        fn request_dependency_services(
            &mut self,
            _services: &ServiceRegistry,
        ) -> ServiceResult<()> {
            Ok(())
        }

        fn init_service(
            &mut self,
            _args: Option<&mut ServiceArgs>,
        ) -> ServiceResult<()> {
            Ok(())
        }

        fn as_root_service(&self) -> Option<&dyn RootService> {
            Some(self)
        }
    }

    async fn request_ids(services: RequestServices) -> HttpResponse {
        let first: Svc<RequestId> = match services.get_service_scoped() {
            Ok(id) => id,
            Err(error) => {
                return HttpResponse::InternalServerError()
                    .body(error.to_string())
            }
        };
        let second: Svc<RequestId> = match services.get_service_scoped() {
            Ok(id) => id,
            Err(error) => {
                return HttpResponse::InternalServerError()
                    .body(error.to_string())
            }
        };
        HttpResponse::Ok().body(format!("{} {}", first.0, second.0))
    }

    #[actix_web::test]
    async fn each_request_gets_its_own_container() {
        let shared = SharedServices::new();
        let app = test::init_service(
            App::new()
                .wrap(DewServices::new(shared.clone(), |_| Ok(())))
                .route("/", web::get().to(request_ids)),
        )
        .await;

        let first = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        let second = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/").to_request(),
        )
        .await;

        assert_eq!(&first[..], b"0 0");
        assert_eq!(&second[..], b"1 1");
        assert!(shared.contains::<Counter>());
    }

    #[actix_web::test]
    async fn sync_callback_runs_before_the_handler() {
        let calls = Rc::new(AtomicUsize::new(0));
        let seen = Rc::clone(&calls);
        let app = test::init_service(
            App::new()
                .wrap(DewServices::new(SharedServices::new(), move |container| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    container.get_service_scoped::<RequestId>()?;
                    Ok(())
                }))
                .route(
                    "/",
                    web::get().to(|services: RequestServices| async move {
                        HttpResponse::Ok()
                            .body(services.has_scoped::<RequestId>().to_string())
                    }),
                ),
        )
        .await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        assert_eq!(&body[..], b"true");
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[actix_web::test]
    async fn async_callback_is_awaited_before_the_handler() {
        let app = test::init_service(
            App::new()
                .wrap(DewServices::new_async(
                    SharedServices::new(),
                    |container| async move {
                        container
                            .get_service_scoped_with::<Secrets>(None, true)?;
                        Ok::<_, ServiceError>(())
                    },
                ))
                .route(
                    "/",
                    web::get().to(|req: actix_web::HttpRequest| async move {
                        let has_secrets = req
                            .service_container()
                            .map_or(false, |c| c.has_scoped::<Secrets>());
                        HttpResponse::Ok().body(has_secrets.to_string())
                    }),
                ),
        )
        .await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        assert_eq!(&body[..], b"true");
    }

    #[actix_web::test]
    async fn failing_callback_ends_the_request() {
        let handled = Rc::new(AtomicUsize::new(0));
        let counter = Rc::clone(&handled);
        let app = test::init_service(
            App::new()
                .wrap(DewServices::new(SharedServices::new(), |container| {
                    container.get_service_singleton::<Secrets>()?;
                    Ok(())
                }))
                .route(
                    "/",
                    web::get().to(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async { HttpResponse::Ok().finish() }
                    }),
                ),
        )
        .await;

        let result = test::try_call_service(
            &app,
            test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        match result {
            Err(error) => assert_eq!(
                StatusCode::INTERNAL_SERVER_ERROR,
                error.as_response_error().status_code()
            ),
            Ok(response) => {
                panic!("request should have failed: {}", response.status())
            }
        }
        assert_eq!(0, handled.load(Ordering::SeqCst));
    }
}
