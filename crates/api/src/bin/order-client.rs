//! Command-line client for the order worker's HTTP API.

use clap::{Parser, Subcommand};
use domain::Order;
use lifecycle::LifecycleSignal;
use reqwest::{Client, Response};

#[derive(Parser, Debug)]
#[command(name = "order-client")]
#[command(about = "Submit orders to the order worker and drive their lifecycle", long_about = None)]
struct Cli {
    /// Worker URL
    #[arg(short, long, env = "ORDER_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a lifecycle for an order
    Submit {
        /// Order as JSON: {"id": "...", "line_items": [...]}
        #[arg(short, long)]
        order: String,
        /// Block until the lifecycle ends and print its outcome
        #[arg(short, long)]
        wait: bool,
    },

    /// Deliver a signal to a running lifecycle
    Signal {
        /// Instance ID returned by submit
        id: String,
        /// One of pick, ship, deliver, cancel
        signal: LifecycleSignal,
    },

    /// Query the current order status
    Status {
        /// Instance ID
        id: String,
    },

    /// Wait for the terminal outcome
    Result {
        /// Instance ID
        id: String,
    },
}

async fn print_response(response: Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("server answered {status}").into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.server.trim_end_matches('/');
    let client = Client::new();

    let response = match cli.command {
        Commands::Submit { order, wait } => {
            let order: Order = serde_json::from_str(&order)?;
            client
                .post(format!("{base}/orders"))
                .query(&[("wait", wait)])
                .json(&order)
                .send()
                .await?
        }
        Commands::Signal { id, signal } => {
            client
                .post(format!("{base}/orders/{id}/signals/{signal}"))
                .send()
                .await?
        }
        Commands::Status { id } => client.get(format!("{base}/orders/{id}/status")).send().await?,
        Commands::Result { id } => client.get(format!("{base}/orders/{id}/result")).send().await?,
    };

    print_response(response).await
}
