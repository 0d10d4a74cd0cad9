use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};

use crate::config::SupervisorConfigLoader;
use crate::registry::Supervisor;

use super::envelope::{self, Envelope};

pub struct AppState<L: SupervisorConfigLoader> {
    pub registry: Arc<Supervisor>,
    pub loader: L,
}

pub async fn status_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
) -> impl Responder {
    HttpResponse::Ok().json(Envelope::ok(state.registry.status()))
}

pub async fn reread_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
) -> impl Responder {
    match state.loader.load_config() {
        Ok(cfg) => HttpResponse::Ok().json(Envelope::ok(state.registry.diff(&cfg.programs))),
        Err(err) => HttpResponse::Ok().json(envelope::err(err.to_string())),
    }
}

pub async fn update_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
) -> impl Responder {
    match state.loader.load_config() {
        Ok(cfg) => {
            state.registry.reload(cfg.programs);
            HttpResponse::Ok().json(envelope::ok_empty())
        }
        Err(err) => HttpResponse::Ok().json(envelope::err(err.to_string())),
    }
}

pub async fn start_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
    name: web::Path<String>,
) -> impl Responder {
    dispatch(state.registry.start_program(name.as_str()))
}

pub async fn stop_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
    name: web::Path<String>,
) -> impl Responder {
    dispatch(state.registry.stop_program(name.as_str()))
}

pub async fn restart_handler<L: SupervisorConfigLoader>(
    state: web::Data<AppState<L>>,
    name: web::Path<String>,
) -> impl Responder {
    dispatch(state.registry.restart_program(name.as_str()))
}

fn dispatch(result: Result<(), crate::registry::RegistryError>) -> HttpResponse {
    match result {
        Ok(()) => HttpResponse::Ok().json(envelope::ok_empty()),
        Err(err) => HttpResponse::Ok().json(envelope::err(err.to_string())),
    }
}
