use std::io::Write;
use std::sync::Arc;

use actix_web::{test, web, App};
use tempfile::tempdir;

use procsupervisor::config::SupervisorConfigLoaderFile;
use procsupervisor::http::handlers::{self, AppState};
use procsupervisor::Supervisor;

fn write_config(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("supervisor.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{contents}").unwrap();
    path
}

#[actix_web::test]
async fn status_lists_registered_programs() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        dir.path(),
        r#"
[program.idle]
directory = "/tmp"
command = "/bin/sleep 3600"
auto_restart = false
"#,
    );
    let loader = SupervisorConfigLoaderFile::new(&config_path);
    let registry = Arc::new(Supervisor::new());
    registry.add_program(
        "idle",
        procsupervisor::ProgramConfig {
            directory: "/tmp".into(),
            command: "/bin/sleep 3600".to_string(),
            args: Vec::new(),
            auto_restart: false,
            stdout_logfile: None,
            stderr_logfile: None,
            max_retry: 0,
            listen_addrs: Vec::new(),
            stop_timeout: 1,
            stop_before_restart: false,
        },
    );

    let data = web::Data::new(AppState { registry, loader });
    let app = test::init_service(
        App::new()
            .app_data(data.clone())
            .service(web::resource("/status").to(
                handlers::status_handler::<SupervisorConfigLoaderFile>,
            )),
    )
    .await;

    let req = test::TestRequest::get().uri("/status").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["status"], 0);
    assert_eq!(resp["data"][0]["name"], "idle");
}

#[actix_web::test]
async fn start_unknown_program_reports_failure_envelope() {
    let dir = tempdir().unwrap();
    let config_path = write_config(dir.path(), "");
    let loader = SupervisorConfigLoaderFile::new(&config_path);
    let registry = Arc::new(Supervisor::new());

    let data = web::Data::new(AppState { registry, loader });
    let app = test::init_service(
        App::new().app_data(data.clone()).service(
            web::resource("/start/{name}")
                .to(handlers::start_handler::<SupervisorConfigLoaderFile>),
        ),
    )
    .await;

    let req = test::TestRequest::post().uri("/start/ghost").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 1);
}

#[actix_web::test]
async fn reread_reports_diff_against_empty_registry() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        dir.path(),
        r#"
[program.fresh]
directory = "/tmp"
command = "/bin/true"
"#,
    );
    let loader = SupervisorConfigLoaderFile::new(&config_path);
    let registry = Arc::new(Supervisor::new());

    let data = web::Data::new(AppState { registry, loader });
    let app = test::init_service(
        App::new().app_data(data.clone()).service(
            web::resource("/reread").to(handlers::reread_handler::<SupervisorConfigLoaderFile>),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/reread").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["status"], 0);
    assert!(resp["data"]["inserts"].get("fresh").is_some());
}
