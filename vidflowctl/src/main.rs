//! `vidflowctl` converts every video under a folder to MP4, optionally
//! keeps watching it, and can undo moves into the error folder.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().into_command();
    let verbose = match &command {
        Command::Convert(args) => args.common.verbose,
        Command::Undo(args) => args.common.verbose,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    if verbose { "debug" } else { "info" }.into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match command {
        Command::Convert(args) => {
            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            info!("interrupt received; finishing in-flight work");
                            shutdown.cancel();
                        }
                        Err(err) => warn!("cannot listen for Ctrl-C: {}", err),
                    }
                }
            });
            cli::convert::run(args, shutdown).await
        }
        Command::Undo(args) => cli::undo::run(args).await,
    }
}
