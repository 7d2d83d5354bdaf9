use clap::{Args, Parser, Subcommand};
use pgrant_core::{Action, ObjectKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "pgrant", version, about = "Inspect and change Postgres access levels")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the labels shown for each object kind and action.
    Labels {
        /// Only this object kind
        #[arg(long)]
        kind: Option<ObjectKind>,

        /// Registry overrides from a config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Classify a privilege list without touching a database.
    Resolve {
        #[arg(long)]
        kind: ObjectKind,

        /// Comma-separated privilege tokens, e.g. SELECT,INSERT
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        tokens: Option<String>,

        /// JSON file holding a token array or a principal record with `pgPrivileges`
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the REVOKE/GRANT steps between held tokens and a target action.
    Plan {
        #[arg(long)]
        kind: ObjectKind,

        /// Comma-separated privilege tokens currently held (may be empty)
        #[arg(long, default_value = "")]
        tokens: String,

        #[arg(long)]
        target: Action,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Read the access level of principals on objects.
    Show {
        #[command(flatten)]
        selection: Selection,

        /// Also print the combined level of the whole selection
        #[arg(long, default_value_t = false)]
        aggregate: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Move principals on objects to an access level.
    Set {
        #[command(flatten)]
        selection: Selection,

        #[arg(long)]
        action: Action,

        /// Print the plans without applying them
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Only change the selected objects, not their schemas, owned
        /// sequences or schema members
        #[arg(long, default_value_t = false)]
        no_propagate: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Validate a config file against the embedded JSON Schema.
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Which (object, principal) pairs a bulk command addresses.
#[derive(Args, Debug, Clone)]
pub struct Selection {
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(long)]
    pub kind: ObjectKind,

    /// Object names, `name` or `schema.name`; repeatable
    #[arg(long = "object")]
    pub objects: Vec<String>,

    /// Schema for unqualified names; with no --object, every object of the
    /// kind in this schema
    #[arg(long)]
    pub in_schema: Option<String>,

    /// Role names; repeatable
    #[arg(long = "principal", required = true)]
    pub principals: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Labels { kind, config, json } => {
            commands::offline::run_labels(kind, config.as_deref(), json)?
        }
        Command::Resolve {
            kind,
            tokens,
            input,
            config,
            json,
        } => commands::offline::run_resolve(
            kind,
            tokens.as_deref(),
            input.as_deref(),
            config.as_deref(),
            json,
        )?,
        Command::Plan {
            kind,
            tokens,
            target,
            config,
            json,
        } => commands::offline::run_plan(kind, &tokens, target, config.as_deref(), json)?,
        Command::Show {
            selection,
            aggregate,
            json,
        } => commands::access::run_show(&selection, aggregate, json).await?,
        Command::Set {
            selection,
            action,
            dry_run,
            no_propagate,
            json,
        } => commands::access::run_set(&selection, action, dry_run, !no_propagate, json).await?,
        Command::Check { config } => commands::check::run_check(&config)?,
    }

    Ok(())
}
