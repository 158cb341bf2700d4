//! Spawns a web server that listens on localhost. A password must be sent to
//! access the index page via the query string. Try connecting to
//! <http://localhost:8080/> without any query strings, then connect with the
//! query string `?code=my_secret_password`.
//!
//! The expected password is read once into a root singleton when the first
//! request arrives. The authenticator is scoped to each request and pulls the
//! password service from the request's container.
//!
//! Set `RUST_LOG=debug` to see services being constructed.

use actix_web::{
    get, web::Query, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use dew_services_actix::{
    DewServices, Injected, RootService, Service, ServiceArgs,
    ServiceContainer, ServiceRegistry, ServiceResult, SharedServices, Svc,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct PasswordStore {
    password: String,
}

impl RootService for PasswordStore {}

impl Service for PasswordStore {
    fn request_dependency_services(
        &mut self,
        _services: &ServiceRegistry,
    ) -> ServiceResult<()> {
        Ok(())
    }

    fn init_service(
        &mut self,
        args: Option<&mut ServiceArgs>,
    ) -> ServiceResult<()> {
        if let Some(args) = args {
            self.password = args.take_argument("password")?;
        }
        Ok(())
    }

    fn as_root_service(&self) -> Option<&dyn RootService> {
        Some(self)
    }
}

#[derive(Default)]
struct QueryRequestAuthenticator {
    passwords: Option<Svc<PasswordStore>>,
}

impl QueryRequestAuthenticator {
    fn is_allowed(&self, request: &HttpRequest) -> bool {
        #[derive(Deserialize)]
        struct QueryData {
            code: String,
        }

        let query = match Query::<QueryData>::from_query(request.query_string())
        {
            Ok(query) => query,
            Err(_) => return false,
        };

        self.passwords
            .as_ref()
            .map_or(false, |passwords| query.code == passwords.password)
    }
}

impl Service for QueryRequestAuthenticator {
    fn request_dependency_services(
        &mut self,
        services: &ServiceRegistry,
    ) -> ServiceResult<()> {
        self.passwords = Some(services.get_service_singleton()?);
        Ok(())
    }

    fn init_service(
        &mut self,
        _args: Option<&mut ServiceArgs>,
    ) -> ServiceResult<()> {
        Ok(())
    }
}

fn configure_services(container: &ServiceContainer) -> ServiceResult<()> {
    let mut args = ServiceArgs::new();
    args.add("password", "my_secret_password".to_owned())?;
    container.get_service_singleton_with::<PasswordStore>(Some(args), true)?;
    container.get_service_scoped::<QueryRequestAuthenticator>()?;
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let shared = SharedServices::new();
    HttpServer::new(move || {
        App::new()
            .wrap(DewServices::new(shared.clone(), configure_services))
            .service(index)
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}

#[get("/")]
async fn index(
    request: HttpRequest,
    auth: Injected<QueryRequestAuthenticator>,
) -> impl Responder {
    if auth.is_allowed(&request) {
        HttpResponse::Ok().body("You got the password right!")
    } else {
        HttpResponse::Forbidden().body("Incorrect password")
    }
}
