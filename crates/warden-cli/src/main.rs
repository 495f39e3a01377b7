//! Warden CLI.
//!
//! Offline tooling for ABAC policies stored as JSON.
//!
//! # Quick Start
//!
//! ```bash
//! # Start from the standard policies
//! warden seed > policies.json
//!
//! # Check every document compiles
//! warden validate policies.json
//!
//! # May subject 5 update file 10?
//! warden check --subject-id 5 --action update --resource-type file \
//!     --resource file-10.json --explain
//!
//! # Which files may subject 5 list?
//! warden filter --subject-id 5 --action read_list --resource-type file --sql
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Warden - attribute-based access control policies, checked offline.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Read configuration from this file only.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where policies and subjects are read from. Defaults come from `[store]`.
#[derive(Args)]
struct StoreArgs {
    /// JSON array of policy documents.
    #[arg(long, value_name = "FILE")]
    policies: Option<PathBuf>,

    /// JSON array of subject records.
    #[arg(long, value_name = "FILE")]
    subjects: Option<PathBuf>,
}

#[derive(Args)]
struct RequestArgs {
    /// Subject (user) id.
    #[arg(long)]
    subject_id: i64,

    /// Action, e.g. read, update, read_list.
    #[arg(long)]
    action: String,

    /// Resource type, e.g. file.
    #[arg(long)]
    resource_type: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every policy document and report rejects.
    Validate {
        /// JSON array of policy documents.
        path: PathBuf,
    },

    /// Decide one access request.
    Check {
        #[command(flatten)]
        stores: StoreArgs,

        #[command(flatten)]
        request: RequestArgs,

        /// JSON object with the resource instance's fields.
        #[arg(long, value_name = "FILE")]
        resource: Option<PathBuf>,

        /// Resource instance id.
        #[arg(long)]
        resource_id: Option<String>,

        /// Show the deciding policy and any faults.
        #[arg(long)]
        explain: bool,
    },

    /// Compile the row filter for a list query.
    Filter {
        #[command(flatten)]
        stores: StoreArgs,

        #[command(flatten)]
        request: RequestArgs,

        /// JSON array of rows to run the filter against.
        #[arg(long, value_name = "FILE")]
        rows: Option<PathBuf>,

        /// Render as a parameterised SQL clause.
        #[arg(long)]
        sql: bool,
    },

    /// List the attribute paths policies can use.
    Attributes,

    /// Print the standard seed policies as JSON.
    Seed,

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (toml, json).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    let config = commands::load_config(cli.config.as_deref())?;
    init_logging(&config.logging.level);
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Validate { path } => commands::validate::run(&path),
        Commands::Check {
            stores,
            request,
            resource,
            resource_id,
            explain,
        } => {
            let facade = commands::open_facade(&config, stores.policies, stores.subjects)?;
            commands::check::run(
                &facade,
                request.subject_id,
                &request.action,
                &request.resource_type,
                resource.as_deref(),
                resource_id.as_deref(),
                explain,
            )
        }
        Commands::Filter {
            stores,
            request,
            rows,
            sql,
        } => {
            let facade = commands::open_facade(&config, stores.policies, stores.subjects)?;
            commands::filter::run(
                &facade,
                request.subject_id,
                &request.action,
                &request.resource_type,
                rows.as_deref(),
                sql,
            )
        }
        Commands::Attributes => {
            commands::attributes::run();
            Ok(())
        }
        Commands::Seed => commands::seed::run(),
        Commands::Config(ConfigCommands::Show { format }) => commands::config::show(&config, &format),
    }
}
