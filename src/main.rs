use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use flowrr::cli::Cli;
use flowrr::{client, EchoServer, UnixFabric};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "flowrr=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let fabric = UnixFabric::open(&cli.fabric_root)
        .wrap_err_with(|| format!("Failed to open fabric at {}", cli.fabric_root.display()))?;

    if cli.listen {
        let config = cli.server_config();
        info!(name = %config.name, dif = ?config.dif, "Starting echo server");
        let server = EchoServer::new(fabric, config);
        server.run().await.wrap_err("Failed to run echo server")?;
    } else {
        let config = cli.client_config();
        tokio::select! {
            response = client::run(&fabric, &config) => {
                let response = response.wrap_err("Echo probe failed")?;
                println!("Response: '{}'", String::from_utf8_lossy(&response));
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted");
            }
        }
    }

    Ok(())
}
