use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use identity_resolve::{api, db::Database, models::IdentifyRequest};

#[derive(Parser)]
#[command(name = "identify")]
#[command(about = "Reconcile contact records into customer identities")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Server options used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Resolve a single observation and print the identity as JSON
    Resolve {
        /// Email address to match
        #[arg(long)]
        email: Option<String>,

        /// Phone number to match
        #[arg(long)]
        phone: Option<String>,

        #[command(flatten)]
        database: DatabaseArgs,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "IDENTIFY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port for HTTP API
    #[arg(short, long, env = "IDENTIFY_PORT", default_value = "3000")]
    port: u16,

    /// Delete all stored contacts before serving
    #[arg(long)]
    reset: bool,

    #[command(flatten)]
    database: DatabaseArgs,
}

#[derive(Args)]
struct DatabaseArgs {
    /// SQLite database file (defaults to the per-user data directory)
    #[arg(long, env = "IDENTIFY_DATABASE")]
    database: Option<PathBuf>,
}

impl DatabaseArgs {
    fn open(&self) -> anyhow::Result<Database> {
        let db = match &self.database {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate().context("Failed to run database migrations")?;
        Ok(db)
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "identity_resolve=debug,tower_http=debug".into()),
    );

    // stderr keeps stdout clean for `resolve` output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let db = args.database.open()?;
    if args.reset {
        let removed = db.reset()?;
        tracing::info!("Reset database, removed {} contacts", removed);
    }

    let app = api::create_router(db);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Identity server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve(args)) => serve(args).await?,
        Some(Commands::Resolve {
            email,
            phone,
            database,
        }) => {
            let db = database.open()?;
            let observation = IdentifyRequest {
                email,
                phone_number: phone,
            }
            .into_observation()?;
            let contact = db.identify(&observation)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "contact": contact }))?
            );
        }
        None => serve(cli.serve).await?,
    }

    Ok(())
}
