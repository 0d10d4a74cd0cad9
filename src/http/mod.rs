pub mod envelope;
pub mod error;
pub mod handlers;

use actix_web::{web, App, HttpServer};

use crate::config::SupervisorConfigLoader;
use crate::registry::Supervisor;

pub use error::HttpError;
pub use handlers::AppState;

/// Runs the control API described in spec.md §6 until the returned server
/// handle is stopped or the process is signaled. Mirrors the teacher's own
/// status server: bind failures are reported distinctly from later runtime
/// errors.
pub async fn run_server<L>(
    host: &str,
    port: u16,
    registry: std::sync::Arc<Supervisor>,
    loader: L,
) -> Result<(), HttpError>
where
    L: SupervisorConfigLoader + Send + Sync + Clone + 'static,
{
    let data = web::Data::new(AppState { registry, loader });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(web::resource("/status").to(handlers::status_handler::<L>))
            .service(web::resource("/reread").to(handlers::reread_handler::<L>))
            .service(web::resource("/update").to(handlers::update_handler::<L>))
            .service(web::resource("/start/{name}").to(handlers::start_handler::<L>))
            .service(web::resource("/stop/{name}").to(handlers::stop_handler::<L>))
            .service(web::resource("/restart/{name}").to(handlers::restart_handler::<L>))
    })
    .bind((host, port))
    .map_err(|source| HttpError::Bind {
        addr: format!("{host}:{port}"),
        source,
    })?;

    server.run().await?;
    Ok(())
}
