use clap::Parser;
use handbook_cli::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handbook_cli::init_tracing();
    run(Cli::parse()).await
}
