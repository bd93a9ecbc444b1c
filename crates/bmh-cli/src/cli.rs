use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "bmhctl",
    about = "Bare-metal host allocation and firmware configuration controller",
    version
)]
pub struct Cli {
    /// Admin API of a running controller instance.
    #[arg(long, env = "BMH_URL", global = true)]
    pub remote: Option<String>,

    /// Bearer token for the admin API.
    #[arg(long, env = "BMH_TOKEN", global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the controller's admin API server (local only).
    Serve {
        /// Path to the controller's operational config file.
        #[arg(long)]
        config: PathBuf,

        /// Directory of hardware profile YAML files.
        #[arg(long)]
        profiles_dir: PathBuf,

        /// Base URL of the external bare-metal operator's HTTP surface.
        #[arg(long)]
        operator_url: String,

        /// Use an in-memory (ephemeral) store instead of the embedded database.
        #[arg(long)]
        ephemeral: bool,

        /// Path to the embedded database file.
        #[arg(long)]
        store_path: Option<String>,

        /// Rotate the admin API bearer token even if one already exists.
        #[arg(long)]
        rotate_token: bool,

        #[arg(long, default_value_t = 8090)]
        port: u16,

        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Run one reconcile cycle for a node allocation request.
    Reconcile {
        nar_id: String,
    },

    /// Show controller-wide status.
    Status,

    /// Fetch a stored object.
    Get {
        #[command(subcommand)]
        entity: GetEntity,
    },

    /// Drive a deallocation step for an allocated node.
    Deallocate {
        nar_id: String,
        node_id: String,
    },

    /// List recent audit events.
    Events {
        #[arg(long)]
        nar_id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
pub enum GetEntity {
    /// Fetch a node allocation request by id.
    Nar { id: String },
    /// Fetch an allocated node by id.
    Node { id: String },
}
