use clap::{Parser, Subcommand};
use serde_json::Value;

use session_setup::http::{ErrorBody, HANDSHAKE_PATH, STOP_PATH};
use session_setup::protocol::{HandshakeRequest, HostCredential, StopRequest};

#[derive(Parser)]
#[command(name = "session-cli")]
#[command(about = "Client for the session setup service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:7070")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the session handshake
    Handshake {
        /// Credential for a host, as HOST=TOKEN (repeatable)
        #[arg(short, long = "credential", value_parser = parse_credential)]
        credentials: Vec<(String, String)>,

        /// Client feature to advertise (repeatable)
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// Stop the session
    Stop,
}

fn parse_credential(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((host, token)) if !host.is_empty() => Ok((host.to_string(), token.to_string())),
        _ => Err(format!("expected HOST=TOKEN, got {:?}", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Handshake { credentials, features } => {
            let mut request = HandshakeRequest::default();
            request.capabilities.features = features;
            for (host, token) in credentials {
                request.config.credentials.insert(host, HostCredential::new(token));
            }
            client
                .post(format!("{}{}", cli.url, HANDSHAKE_PATH))
                .json(&request)
                .send()
                .await?
        }
        Commands::Stop => {
            client
                .post(format!("{}{}", cli.url, STOP_PATH))
                .json(&StopRequest {})
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => eprintln!("Error ({}): {} [{}]", status, body.message, body.code),
            Err(_) => eprintln!("Error: server returned status {}: {}", status, text),
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
