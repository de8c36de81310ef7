use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use autoreact::config::Config;
use autoreact::db::models::{MonitoringList, SignerAccount};
use autoreact::farcaster::client::NeynarClient;
use autoreact::farcaster::hubs::{self, ActionSubmitter};
use autoreact::farcaster::message;
use autoreact::keys::DatabaseKeyProvider;
use autoreact::pipeline::batch;
use autoreact::pipeline::list::ListProcessor;

/// Autoreact: automated likes and recasts for Farcaster monitoring lists.
///
/// Watches the accounts on each list, picks out casts that match the list's
/// filters, and reacts to each of them exactly once.
#[derive(Parser)]
#[command(name = "autoreact", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Process every auto-interaction list once
    Run {
        /// Number of lists to process in parallel (default: 1)
        #[arg(long, default_value = "1")]
        concurrency: u32,

        /// Print the batch report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show configured auto-interaction lists
    Lists,

    /// Show recent actions and failures for a list
    History {
        /// The list id
        #[arg(long)]
        list: String,

        /// Number of rows to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Import lists from a JSON file (one list object or an array)
    ImportList {
        /// Path to the JSON file
        path: String,
    },

    /// Store a signer account. The private key is read from SIGNER_PRIVATE_KEY.
    ImportAccount {
        /// Internal account id that lists refer to
        #[arg(long)]
        id: String,

        /// The account's FID
        #[arg(long)]
        fid: String,
    },

    /// Show system status (DB stats, lists, hubs)
    Status,
}

/// An import file holds either a single list or several.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListImport {
    Many(Vec<MonitoringList>),
    One(MonitoringList),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autoreact=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing autoreact database...");
            let config = Config::load()?;
            let db = autoreact::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext steps:");
            println!("  1. Set NEYNAR_API_KEY in your .env file");
            println!("  2. autoreact import-account --id <id> --fid <fid>");
            println!("  3. autoreact import-list <file.json>");
        }

        Commands::Run { concurrency, json } => {
            let config = Config::load()?;
            config.require_neynar()?;
            config.require_hubs()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;

            let content = NeynarClient::new(
                &config.neynar_api_url,
                &config.neynar_api_key,
                config.fetch_timeout,
            )?;
            let endpoints = hubs::http_chain(
                &config.hub_urls,
                config.hub_api_key.clone(),
                config.hub_timeout,
            )?;
            let submitter = ActionSubmitter::new(endpoints, config.network, config.hub_timeout);

            info!(hubs = ?submitter.endpoint_names(), "Hub fallback chain");

            let processor = ListProcessor::new(
                Arc::clone(&db),
                Arc::new(content),
                Arc::new(DatabaseKeyProvider::new(Arc::clone(&db))),
                submitter,
            );

            let report = batch::run(&processor, concurrency as usize, !json).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                autoreact::output::terminal::display_batch_report(&report);
            }
        }

        Commands::Lists => {
            let config = Config::load()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;
            let lists = db.list_auto_interaction_lists().await?;
            autoreact::output::terminal::display_lists(&lists);
        }

        Commands::History { list, limit } => {
            let config = Config::load()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;

            let Some(found) = db.get_list(&list).await? else {
                anyhow::bail!("No auto-interaction list with id {list}. See `autoreact lists`.");
            };

            let actions = db.recent_actions(&list, limit).await?;
            let failures = db.recent_failures(&list, limit).await?;
            autoreact::output::terminal::display_history(&found, &actions, &failures);
        }

        Commands::ImportList { path } => {
            let config = Config::load()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;

            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {path}"))?;
            let lists = match serde_json::from_str::<ListImport>(&raw)
                .with_context(|| format!("{path} is not a valid list (or array of lists)"))?
            {
                ListImport::Many(lists) => lists,
                ListImport::One(list) => vec![list],
            };

            for list in &lists {
                db.upsert_list(list).await?;
                println!(
                    "  {} {} ({}, {} FIDs)",
                    "✓".green(),
                    list.name,
                    list.id,
                    list.tracked_account_ids().len()
                );
            }
            println!("\n{}", format!("Imported {} lists.", lists.len()).bold());
        }

        Commands::ImportAccount { id, fid } => {
            let config = Config::load()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;

            let private_key = std::env::var("SIGNER_PRIVATE_KEY").context(
                "SIGNER_PRIVATE_KEY not set. Export the hex-encoded Ed25519 signer key \
                 for this account before importing it.",
            )?;

            // Reject bad input now rather than on the first run
            message::parse_fid(&fid)?;
            message::parse_signing_key(&private_key)?;

            db.upsert_signer_account(&SignerAccount {
                id: id.clone(),
                platform_account_id: fid.clone(),
                private_key,
            })
            .await?;

            println!("{} Account {id} (FID {fid}) stored.", "✓".green());
        }

        Commands::Status => {
            let config = Config::load()?;
            let db = autoreact::db::open_sqlite(&config.db_path)?;
            autoreact::status::show(&db, &config.db_path, &config.hub_urls).await?;
        }
    }

    Ok(())
}
