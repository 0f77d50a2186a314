//! hostfwctl - control client for the host firmware activation daemon

use anyhow::Result;
use clap::{Parser, Subcommand};
use hostfwctl::commands;

#[derive(Parser)]
#[command(name = "hostfwctl")]
#[command(about = "Inspect and drive host firmware activation", long_about = None)]
#[command(version = hostfw_shared::VERSION)]
struct Cli {
    /// Control socket path (default: $HOSTFWD_SOCKET or /run/hostfw/hostfwd.sock)
    #[arg(long, global = true)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show known images and their activation state
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// Start activating a staged image
    Activate {
        /// Image id (staging directory name)
        id: String,
    },

    /// Delete an image that is not activating
    Delete {
        id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.as_deref();

    let output = match cli.command {
        Commands::Status { json } => commands::status(socket, json).await?,
        Commands::Activate { id } => commands::activate(socket, &id).await?,
        Commands::Delete { id } => commands::delete(socket, &id).await?,
    };
    println!("{}", output.trim_end());
    Ok(())
}
