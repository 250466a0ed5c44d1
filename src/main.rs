mod cli;
mod config;
mod error;
mod games;
mod http;
mod provider;
mod provisioner;
mod reconciler;
mod remote;
mod shared_key;
mod ssh;
mod state;
mod tags;
pub mod utils;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use error::Result;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gscp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    let outcome = tokio::select! {
        result = cli.execute() => Outcome::Finished(result),
        _ = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };

    match outcome {
        Outcome::Finished(Ok(())) => {}
        Outcome::Finished(Err(err)) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
        Outcome::Interrupted => {
            eprintln!("interrupted");
            std::process::exit(130);
        }
    }
}

enum Outcome {
    Finished(Result<()>),
    Interrupted,
}
