use clap::Parser;
use ringfence_cli::{execute, logging, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_format());

    let mut stdout = std::io::stdout().lock();
    let succeeded = execute(cli, &mut stdout).await?;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
