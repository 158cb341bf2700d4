//! Per-request service containers for actix-web applications.
//!
//! Wrap an application in the [`DewServices`] middleware to give every
//! request its own [`ServiceContainer`]. The container is stored in the
//! request extensions, and a configuration callback can prepare it (for
//! example by constructing root services) before the handler runs.
//!
//! Handlers then receive services through the [`Injected`], [`Scoped`] and
//! [`Singleton`] extractors, or the whole container through
//! [`RequestServices`]. Other middleware can reach the container through
//! [`ServiceContainerExt`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

pub use dew_services::*;

mod ext;
mod extract;
mod middleware;

pub use ext::*;
pub use extract::*;
pub use middleware::*;
