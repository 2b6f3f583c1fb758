use anyhow::Result;
use clap::Parser;
use swarmsim_app::Cli;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    info!(command = ?cli.command, "swarmsim starting");
    let output = cli.execute()?;
    println!("{output}");
    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so stdout stays machine-readable JSON.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
