use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relreg-client")]
#[command(about = "Send a lookup request file to a Relreg server and store the response")]
struct Args {
    /// Request body to send
    #[arg(short, long, default_value = "request.json")]
    request: PathBuf,

    /// Where to write the response on success
    #[arg(short, long, default_value = "response.json")]
    output: PathBuf,

    /// Server URL
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    url: String,
}

/// Pretty-print with four-space indentation
fn to_pretty_json(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

fn failure_message(code: u16, body: &Value) -> String {
    let error = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("no error message in response");
    format!("[HTTP {}] {}", code, error)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    let request_str = std::fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request file: {}", args.request.display()))?;
    let request_json: Value = serde_json::from_str(&request_str)
        .with_context(|| format!("{} is not valid JSON", args.request.display()))?;

    log::info!("Sending {} to {}", args.request.display(), args.url);
    let response = reqwest::Client::new()
        .get(&args.url)
        .json(&request_json)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", args.url))?;

    let code = response.status();
    let data: Value = response.json().await.context("Response was not JSON")?;

    if !code.is_success() {
        anyhow::bail!(failure_message(code.as_u16(), &data));
    }

    std::fs::write(&args.output, to_pretty_json(&data)?)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    log::info!("Response written to {}", args.output.display());

    Ok(())
}
