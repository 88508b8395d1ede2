use clap::Parser;
use op_deployer::cli::CLI;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let CLI { opts, command } = CLI::parse();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            signal_token.cancel();
        }
    });

    command.run(&opts, cancel).await
}
