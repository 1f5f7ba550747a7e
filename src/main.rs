// ABOUTME: CLI entry point for schema-backup
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Args, Parser, Subcommand};
use schema_backup::commands::{self, CommonArgs};

#[derive(Parser)]
#[command(name = "schema-backup")]
#[command(
    about = "Schema-driven NDJSON backup and transactional restore for SQLite and PostgreSQL",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Table catalog (TOML)
    #[arg(long)]
    catalog: Option<String>,
    /// Database URL (postgres://..., sqlite://path or a .db/.sqlite/.sqlite3 file)
    #[arg(long)]
    database: Option<String>,
    /// Database dialect (sqlite or postgres); inferred from the URL when omitted
    #[arg(long)]
    dialect: Option<String>,
    /// Only these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,
    /// Configuration file (TOML); flags override its values
    #[arg(long)]
    config: Option<String>,
    /// Abort if the whole operation takes longer than this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl From<TargetArgs> for CommonArgs {
    fn from(args: TargetArgs) -> Self {
        CommonArgs {
            config: args.config,
            catalog: args.catalog,
            database: args.database,
            dialect: args.dialect,
            tables: args.tables.unwrap_or_default(),
            timeout_secs: args.timeout_secs,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the selected tables to an NDJSON backup stream
    Export {
        #[command(flatten)]
        target: TargetArgs,
        /// Rows fetched per page (default 1000)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Output file, or - for stdout
        #[arg(long, default_value = "-")]
        output: String,
        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Restore a backup stream into existing tables, all or nothing
    Import {
        #[command(flatten)]
        target: TargetArgs,
        /// Input file, or - for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Summarize a backup stream without connecting to a database
    Inspect {
        /// Input file, or - for stdin
        #[arg(long, default_value = "-")]
        input: String,
        /// Compare the stream's schema hash against this catalog
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Print the structural hash of a catalog
    SchemaHash {
        #[arg(long)]
        catalog: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout can carry a backup stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            target,
            batch_size,
            output,
            no_progress,
        } => commands::export(target.into(), batch_size, &output, !no_progress).await,
        Commands::Import { target, input } => commands::import(target.into(), &input).await,
        Commands::Inspect { input, catalog } => commands::inspect(&input, catalog.as_deref()),
        Commands::SchemaHash { catalog } => commands::schema_hash(&catalog),
    }
}
