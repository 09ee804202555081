use crl_updater::{config::Config, crl::CrlService, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let service = CrlService::start(&config.crl)?;

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, updating CRL");
                    match service.update_now().await {
                        Ok(url) => info!("Installed CRL from {}", url),
                        Err(e) => error!("CRL update failed: {}", e),
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
            }
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    service.shutdown();
    Ok(())
}
