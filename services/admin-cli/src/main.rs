//! `webrocket-admin`: a thin CLI over the admin HTTP surface (spec §6).
//!
//! Every subcommand makes one request and prints the response body (or, on
//! a non-2xx response, the `HttpErrorEnvelope` and a non-zero exit code).

use clap::{Parser, Subcommand};
use webrocket_protocol::http::{CreateChannelRequest, CreateVhostRequest, HttpErrorEnvelope};

#[derive(Parser)]
#[command(name = "webrocket-admin", about = "Administer a webrocket server's vhosts, channels, and workers")]
struct Cli {
    /// Base URL of the admin HTTP endpoint.
    #[arg(long, env = "WEBROCKET_ADMIN_URL", default_value = "http://127.0.0.1:8082")]
    url: String,

    /// The 40-hex admin cookie, sent as `X-Admin-Cookie`.
    #[arg(long, env = "WEBROCKET_ADMIN_COOKIE")]
    cookie: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    ListVhosts,
    AddVhost { path: String },
    DeleteVhost { path: String },
    ShowVhost { path: String },
    ClearVhosts,
    RegenerateVhostToken { path: String },
    ListChannels { vhost: String },
    AddChannel { vhost: String, name: String },
    DeleteChannel { vhost: String, name: String },
    ClearChannels { vhost: String },
    ListWorkers { vhost: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_owned();

    let response = match cli.command {
        Command::ListVhosts => get(&client, &cli.cookie, &format!("{base}/vhosts")).await?,
        Command::AddVhost { path } => {
            post_json(&client, &cli.cookie, &format!("{base}/vhosts"), &CreateVhostRequest { path }).await?
        }
        Command::DeleteVhost { path } => delete(&client, &cli.cookie, &format!("{base}/vhosts{path}")).await?,
        Command::ShowVhost { path } => get(&client, &cli.cookie, &format!("{base}/vhosts{path}")).await?,
        Command::ClearVhosts => delete(&client, &cli.cookie, &format!("{base}/vhosts")).await?,
        Command::RegenerateVhostToken { path } => {
            post_empty(&client, &cli.cookie, &format!("{base}/vhosts{path}/token/regenerate")).await?
        }
        Command::ListChannels { vhost } => get(&client, &cli.cookie, &format!("{base}/vhosts{vhost}/channels")).await?,
        Command::AddChannel { vhost, name } => {
            post_json(
                &client,
                &cli.cookie,
                &format!("{base}/vhosts{vhost}/channels"),
                &CreateChannelRequest { name },
            )
            .await?
        }
        Command::DeleteChannel { vhost, name } => {
            delete(&client, &cli.cookie, &format!("{base}/vhosts{vhost}/channels/{name}")).await?
        }
        Command::ClearChannels { vhost } => delete(&client, &cli.cookie, &format!("{base}/vhosts{vhost}/channels")).await?,
        Command::ListWorkers { vhost } => get(&client, &cli.cookie, &format!("{base}/vhosts{vhost}/workers")).await?,
    };

    println!("{response}");
    Ok(())
}

async fn get(client: &reqwest::Client, cookie: &str, url: &str) -> Result<String, String> {
    let resp = client.get(url).header("X-Admin-Cookie", cookie).send().await.map_err(|e| e.to_string())?;
    body_or_error(resp).await
}

async fn delete(client: &reqwest::Client, cookie: &str, url: &str) -> Result<String, String> {
    let resp = client.delete(url).header("X-Admin-Cookie", cookie).send().await.map_err(|e| e.to_string())?;
    body_or_error(resp).await
}

async fn post_empty(client: &reqwest::Client, cookie: &str, url: &str) -> Result<String, String> {
    let resp = client.post(url).header("X-Admin-Cookie", cookie).send().await.map_err(|e| e.to_string())?;
    body_or_error(resp).await
}

async fn post_json<T: serde::Serialize>(
    client: &reqwest::Client,
    cookie: &str,
    url: &str,
    body: &T,
) -> Result<String, String> {
    let resp = client
        .post(url)
        .header("X-Admin-Cookie", cookie)
        .json(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    body_or_error(resp).await
}

async fn body_or_error(resp: reqwest::Response) -> Result<String, String> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| e.to_string())?;
    if status.is_success() {
        return Ok(text);
    }
    match serde_json::from_str::<HttpErrorEnvelope>(&text) {
        Ok(envelope) => Err(format!("{status} {}: {}", envelope.code, envelope.message)),
        Err(_) => Err(format!("{status}: {text}")),
    }
}
