//! Atelier CLI - database migrations, backend API access, webhook testing.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! atelier migrate
//!
//! # Store or remove the backend API token
//! atelier token set tok_live_abc123
//! atelier token clear
//!
//! # Inspect and update orders through the backend API
//! atelier orders list
//! atelier orders get 1
//! atelier orders set-status 1 shipped
//!
//! # Sign a webhook payload, optionally delivering it to a local server
//! atelier webhook sign --payload-file event.json
//! atelier webhook sign --payload-file event.json --send http://127.0.0.1:3000/api/webhooks/stripe
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `token` - Manage the stored API token
//! - `orders` - Backend order API
//! - `webhook sign` - Produce `Stripe-Signature` headers for test deliveries

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use atelier_core::{OrderId, OrderStatus};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage the backend API token
    Token {
        /// Token file (default: ~/.config/atelier/token)
        #[arg(long, env = "ATELIER_TOKEN_FILE", global = true)]
        token_file: Option<PathBuf>,

        #[command(subcommand)]
        action: TokenAction,
    },
    /// Read and update orders through the backend API
    Orders {
        /// Backend API base URL
        #[arg(long, env = "STOREFRONT_API_BASE_URL", global = true)]
        api_url: Option<String>,

        /// Token file (default: ~/.config/atelier/token)
        #[arg(long, env = "ATELIER_TOKEN_FILE", global = true)]
        token_file: Option<PathBuf>,

        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Payment webhook helpers
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a bearer token
    Set {
        /// The token value
        token: String,
    },
    /// Remove the stored token
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List all orders
    List,
    /// Show one order
    Get {
        /// Order ID
        id: OrderId,
    },
    /// Change an order's status
    SetStatus {
        /// Order ID
        id: OrderId,

        /// New status (`pending`, `processing`, `shipped`, `delivered`, `cancelled`, `refunded`)
        status: OrderStatus,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Sign a payload with the webhook secret
    Sign {
        /// Webhook signing secret
        #[arg(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        /// File containing the raw event JSON
        #[arg(short, long)]
        payload_file: PathBuf,

        /// Unix timestamp to sign with (default: now)
        #[arg(short, long)]
        timestamp: Option<i64>,

        /// POST the signed payload to this URL
        #[arg(long)]
        send: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Token { token_file, action } => {
            let store = commands::token::store(token_file)?;
            match action {
                TokenAction::Set { token } => commands::token::set(&store, &token)?,
                TokenAction::Clear => commands::token::clear(&store)?,
            }
        }
        Commands::Orders {
            api_url,
            token_file,
            action,
        } => {
            let client = commands::orders::client(api_url, token_file)?;
            match action {
                OrdersAction::List => commands::orders::list(&client).await?,
                OrdersAction::Get { id } => commands::orders::get(&client, &id).await?,
                OrdersAction::SetStatus { id, status } => {
                    commands::orders::set_status(&client, &id, status).await?;
                }
            }
        }
        Commands::Webhook { action } => match action {
            WebhookAction::Sign {
                secret,
                payload_file,
                timestamp,
                send,
            } => {
                commands::webhook::sign(secret, &payload_file, timestamp, send.as_deref())
                    .await?;
            }
        },
    }
    Ok(())
}
