use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod api;
mod feed;
mod watch;
mod output;
mod telemetry;

mod browse;
mod catalog;
mod admin;

use api::{ApiClient, ApiConfig};

#[derive(Parser)]
#[command(name = "biz", about = "Business directory client")]
struct Cli {
    /// Backend base URL (overrides BIZ_API_URL)
    #[arg(global = true, long)]
    api_url: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Browse(browse::BrowseCmd),
    Catalog(catalog::CatalogCmd),
    Admin(admin::AdminCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and BIZ_LOG_FORMAT
    telemetry::config::init_tracing();
    let cfg = ApiConfig::from_env().with_base_url(cli.api_url);
    let api = ApiClient::from_config(cfg)?;

    match cli.command {
        Commands::Browse(args) => browse::run(api, args).await?,
        Commands::Catalog(args) => catalog::run(&api, args).await?,
        Commands::Admin(args) => admin::run(&api, args).await?,
    }

    Ok(())
}
