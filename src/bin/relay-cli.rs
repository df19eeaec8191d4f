use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Command-line client for the event relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an event through the relay
    AddEvent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        user_id: String,
    },
    /// List a user's events
    Events { user_id: String },
    /// Show circuit breaker state
    Circuit,
    /// Check relay health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::AddEvent { name, user_id } => {
            client
                .post(format!("{}/addEvent", base))
                .json(&json!({ "name": name, "userId": user_id }))
                .send()
                .await?
        }
        Commands::Events { user_id } => {
            client
                .get(format!("{}/getEventsByUserId/{}", base, user_id))
                .send()
                .await?
        }
        Commands::Circuit => client.get(format!("{}/circuit", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Some(secs) = retry_after {
            eprintln!("Retry after: {}s", secs);
        }
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
