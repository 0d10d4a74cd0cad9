use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::Value;

use procsupervisor::cli::{CtlArgs, CtlCommand};

#[derive(serde::Deserialize)]
struct Envelope {
    status: u8,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

fn main() {
    let args = CtlArgs::parse();

    let (method, path) = match &args.command {
        CtlCommand::Status => ("GET", "/status".to_string()),
        CtlCommand::Reread => ("GET", "/reread".to_string()),
        CtlCommand::Update => ("POST", "/update".to_string()),
        CtlCommand::Start { name } => ("POST", format!("/start/{name}")),
        CtlCommand::Stop { name } => ("POST", format!("/stop/{name}")),
        CtlCommand::Restart { name } => ("POST", format!("/restart/{name}")),
    };

    let url = format!("{}{}", args.url.trim_end_matches('/'), path);

    let client = reqwest::blocking::Client::new();
    let result: Result<Envelope, reqwest::Error> = match method {
        "GET" => client.get(&url).send().and_then(fetch),
        _ => client.post(&url).send().and_then(fetch),
    };

    match result {
        Ok(envelope) if envelope.status == 0 => {
            if let Some(data) = envelope.data {
                println!("{}", serde_json::to_string_pretty(&data).unwrap());
            } else if !envelope.message.is_empty() {
                println!("{}", envelope.message);
            }
        }
        Ok(envelope) => {
            eprintln!("error: {}", envelope.message);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("request failed: {err}");
            std::process::exit(1);
        }
    }
}

fn fetch<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T, reqwest::Error> {
    response.json()
}
