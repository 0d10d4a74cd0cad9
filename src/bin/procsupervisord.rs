use std::sync::{Arc, OnceLock};

use clap::Parser;
use nix::sys::signal::{self, SigHandler, Signal};
use tracing::{error, info};

use procsupervisor::cli::DaemonArgs;
use procsupervisor::config::{SupervisorConfigLoader, SupervisorConfigLoaderFile};
use procsupervisor::{Logging, Supervisor};

#[actix_web::main]
async fn main() {
    if let Err(err) = Logging::try_init() {
        eprintln!("{err}");
    }

    let args = DaemonArgs::parse();

    let loader = SupervisorConfigLoaderFile::new(&args.config);
    let cfg = match loader.load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let registry = Arc::new(Supervisor::from_snapshot(cfg.programs));
    for status in registry.status() {
        if let Err(err) = registry.start_program(&status.name) {
            error!(program = %status.name, error = %err, "initial start failed");
        }
    }

    install_shutdown_handler(registry.clone());

    info!(host = %args.host, port = args.port, "control API listening");
    if let Err(err) = procsupervisor::http::run_server(&args.host, args.port, registry, loader).await
    {
        error!(error = %err, "control API stopped with error");
        std::process::exit(1);
    }
}

static REGISTRY: OnceLock<Arc<Supervisor>> = OnceLock::new();

/// SIGINT/SIGTERM/SIGQUIT all trigger an orderly shutdown: stop every
/// program and release its listeners (spec.md §6 "Process signals to the
/// supervisor"). `ctrlc`'s termination feature covers SIGINT/SIGTERM and
/// also folds SIGHUP in (see DESIGN.md for why a separate no-op SIGHUP path
/// was not built); it has no way to add SIGQUIT to that set, so SIGQUIT is
/// wired separately through `nix` straight onto the same shutdown path.
fn install_shutdown_handler(registry: Arc<Supervisor>) {
    let _ = REGISTRY.set(registry.clone());

    let result = ctrlc::set_handler(move || {
        info!("shutdown signal received, stopping all programs");
        registry.shutdown_all();
        std::process::exit(0);
    });
    if let Err(err) = result {
        error!(error = %err, "failed to install shutdown handler");
    }

    // SAFETY: installs a signal handler at startup, before any other thread
    // is spawned; the handler only reads the `OnceLock` set just above.
    let result = unsafe { signal::signal(Signal::SIGQUIT, SigHandler::Handler(handle_sigquit)) };
    if let Err(err) = result {
        error!(error = %err, "failed to install SIGQUIT handler");
    }
}

extern "C" fn handle_sigquit(_: std::os::raw::c_int) {
    if let Some(registry) = REGISTRY.get() {
        registry.shutdown_all();
    }
    std::process::exit(0);
}
