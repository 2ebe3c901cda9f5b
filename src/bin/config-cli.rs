use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Management CLI for the configuration client", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONFIG_CLIENT_ADMIN_URL", default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "CONFIG_CLIENT_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show client and refresh loop status
    Status,
    /// Print the installed configuration snapshot
    Snapshot {
        /// Print only this key's value
        #[arg(long)]
        key: Option<String>,
    },
    /// Trigger an immediate refresh
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            if let Some(json) = read_json(res).await? {
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        Commands::Snapshot { key } => {
            let res = client
                .get(format!("{}/admin/snapshot", cli.url))
                .headers(headers)
                .send()
                .await?;
            let Some(json) = read_json(res).await? else {
                return Ok(());
            };
            match key {
                Some(key) => match json["values"].get(&key) {
                    Some(Value::String(value)) => println!("{}", value),
                    _ => eprintln!("Key '{}' is not set", key),
                },
                None => println!("{}", serde_json::to_string_pretty(&json)?),
            }
        }
        Commands::Refresh => {
            let res = client
                .post(format!("{}/admin/refresh", cli.url))
                .headers(headers)
                .send()
                .await?;
            if let Some(json) = read_json(res).await? {
                println!("{}", json["status"].as_str().unwrap_or("refresh requested"));
            }
        }
    }

    Ok(())
}

async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        return Ok(None);
    }

    Ok(Some(res.json().await?))
}
