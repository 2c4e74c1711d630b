use clap::Parser;
use stylepins::api::init_tracing;
use stylepins::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli::run(cli).await
}
