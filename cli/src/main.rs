mod commands;
mod config;
mod lifecycle;
mod providers;
mod router;
mod server;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_cache_activate, cmd_cache_install, cmd_cache_status, cmd_fetch, cmd_find,
    cmd_find_country, cmd_ingredient_add, cmd_ingredient_list, cmd_ingredient_remove,
    cmd_recipe_add, cmd_recipe_list, cmd_recipe_unsynced, cmd_sync,
};
use crate::config::Config;
use crate::providers::ApiClient;
use crate::sync::SyncCoordinator;
use larder_core::cache::CacheStore;
use larder_core::db::Database;
use larder_core::service::Session;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "An offline-first recipe keeper CLI",
    long_about = "\n\n  ██╗      █████╗ ██████╗ ██████╗ ███████╗██████╗
  ██║     ██╔══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗
  ██║     ███████║██████╔╝██║  ██║█████╗  ██████╔╝
  ██║     ██╔══██║██╔══██╗██║  ██║██╔══╝  ██╔══██╗
  ███████╗██║  ██║██║  ██║██████╔╝███████╗██║  ██║
  ╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝ ╚══════╝╚═╝  ╚═╝
        your recipes, online or not.
"
)]
struct Cli {
    /// Treat the network as unavailable
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the ingredient list used for recipe search
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage saved recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Search online for recipes matching your ingredient list
    Find {
        /// Latitude for country-based search (requires --lon)
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        /// Longitude for country-based search (requires --lat)
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push unsynced recipes to the sync server
    Sync {
        /// Wait for a deferred sync signal before pushing
        #[arg(long)]
        background: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a URL through the offline-aware request router
    Fetch {
        /// URL to fetch
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the offline response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Start the recipe sync server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient
    Add {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient
    Remove {
        /// Ingredient name to remove
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all ingredients
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Save a recipe locally
    Add {
        /// Recipe name
        name: String,
        /// Short description
        description: String,
        /// Path to an image file, stored inline as a data URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all saved recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes not yet pushed to the sync server
    Unsynced {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Download the app shell into the static cache region
    Install {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop cache regions left over from older versions
    Activate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show cache regions and entry counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let session = Session::open(&config.db_path)?;
    let store = CacheStore::open(&config.cache_dir)?;
    let client = ApiClient::new(&store, &config, cli.offline)?;
    let coordinator =
        SyncCoordinator::new(client.http().clone(), &config.base_url, config.sync_token());

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add { name, json } => cmd_ingredient_add(&session, &name, json),
            IngredientCommands::Remove { name, json } => {
                cmd_ingredient_remove(&session, &name, json)
            }
            IngredientCommands::List { json } => cmd_ingredient_list(&session, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                name,
                description,
                image,
                json,
            } => {
                cmd_recipe_add(
                    &session,
                    &coordinator,
                    cli.offline,
                    &name,
                    &description,
                    image.as_deref(),
                    json,
                )
                .await
            }
            RecipeCommands::List { json } => cmd_recipe_list(&session, json),
            RecipeCommands::Unsynced { json } => cmd_recipe_unsynced(&session, json),
        },
        Commands::Find { lat, lon, json } => {
            if let (Some(lat), Some(lon)) = (lat, lon) {
                cmd_find_country(&client, lat, lon, json).await
            } else {
                cmd_find(&session, &client, json).await
            }
        }
        Commands::Sync { background, json } => {
            cmd_sync(&session, &coordinator, background, json).await
        }
        Commands::Fetch {
            url,
            navigate,
            json,
        } => cmd_fetch(&client, &url, navigate, json).await,
        Commands::Cache { command } => match command {
            CacheCommands::Install { json } => {
                cmd_cache_install(&client, &store, &config.base_url, json).await
            }
            CacheCommands::Activate { json } => cmd_cache_activate(&store, json),
            CacheCommands::Status { json } => cmd_cache_status(&store, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let db = Database::open(&config.db_path)?;
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            server::start_server(db, port, &bind, api_key).await
        }
    }
}
