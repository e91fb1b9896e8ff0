use anyhow::Result;
use clap::Parser;
use vigil_cli::{init_tracing, run_dashboard, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run_dashboard(cli).await
}
