mod cli;
mod commands;
mod output;

use anyhow::Result;
use cli::{Cli, Command, GetEntity};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            profiles_dir,
            operator_url,
            ephemeral,
            store_path,
            rotate_token,
            port,
            bind,
        } => {
            commands::serve(
                config,
                profiles_dir,
                operator_url,
                ephemeral,
                store_path,
                rotate_token,
                port,
                bind,
            )
            .await
        }
        Command::Reconcile { nar_id } => commands::reconcile(nar_id, cli.remote, cli.token).await,
        Command::Status => commands::status(cli.remote, cli.token).await,
        Command::Get { entity } => match entity {
            GetEntity::Nar { id } => commands::get_nar(id, cli.remote, cli.token).await,
            GetEntity::Node { id } => commands::get_node(id, cli.remote, cli.token).await,
        },
        Command::Deallocate { nar_id, node_id } => {
            commands::deallocate(nar_id, node_id, cli.remote, cli.token).await
        }
        Command::Events { nar_id, limit } => {
            commands::events(nar_id, limit, cli.remote, cli.token).await
        }
    }
}
