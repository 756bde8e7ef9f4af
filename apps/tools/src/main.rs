use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::{
    config::{build_context, load_settings},
    export_csv, export_file_name, list_orders, lookup_order, review_item,
};
use shared::{
    domain::{DocumentId, OrderStatus},
    protocol::OrderListQuery,
};
use tracing_subscriber::EnvFilter;

/// Admin tasks against the configured order store. Backend settings come
/// from `server.toml` and `APP__*` variables, as for the server.
#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured SQLite database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists item records, optionally filtered.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Accepts or rejects a single pending item.
    Review {
        document_id: String,
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        accept: bool,
        #[arg(long)]
        reject: bool,
    },
    /// Writes the CSV export, by default to `webnd-orders-<date>.csv`.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Prints the tracking view of an order.
    Track { order_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings()?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    let ctx = build_context(&settings).await?;

    match cli.command {
        Command::List {
            search,
            status,
            json,
        } => {
            let items = list_orders(&ctx, &OrderListQuery { search, status }).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    let record = &item.record;
                    println!(
                        "{}  {}  {:<8}  {}  {}  {} ({})  {}",
                        item.document_id,
                        record.order_id,
                        record.status,
                        record.buyer_roll_number,
                        record.buyer_name,
                        record.printed_name,
                        record.size,
                        record.product_type,
                    );
                }
                println!("{} item(s)", items.len());
            }
        }
        Command::Review {
            document_id,
            accept,
            reject,
        } => {
            if accept == reject {
                bail!("pass exactly one of --accept or --reject");
            }
            let item = review_item(&ctx, &DocumentId(document_id), accept).await?;
            println!(
                "item {} of order {} is now {}",
                item.document_id, item.record.order_id, item.record.status
            );
        }
        Command::Export {
            out,
            search,
            status,
        } => {
            let items = list_orders(&ctx, &OrderListQuery { search, status }).await?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(export_file_name(chrono::Local::now().date_naive()))
            });
            std::fs::write(&path, export_csv(&items))?;
            println!("wrote {} item(s) to {}", items.len(), path.display());
        }
        Command::Track { order_id } => {
            let order = lookup_order(&ctx, &order_id).await?;
            println!(
                "Order {} ({}) for {} <{}>",
                order.order_id, order.product_type, order.buyer_name, order.buyer_email
            );
            for (index, item) in order.items.iter().enumerate() {
                print!("  #{} {} ({}) {}", index + 1, item.printed_name, item.size, item.status);
                if let Some(position) = &item.position {
                    print!("  position: {position}");
                }
                println!();
            }
            for step in &order.timeline {
                let mark = if step.completed { "x" } else { " " };
                println!("  [{mark}] {}. {} - {}", step.step, step.title, step.description);
            }
        }
    }

    Ok(())
}
