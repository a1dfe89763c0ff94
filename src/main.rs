use anyhow::Result;
use dhan_ltp_alert::{
    config::AppConfig,
    feed::FeedAdapter,
    relay::{AlertRelay, TelegramClient},
    utils,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::from_env().inspect_err(|e| error!(error = %e, "[INIT] bad configuration"))?;
    info!(
        security_id = %cfg.security_id,
        segment = %cfg.segment,
        interval_secs = cfg.send_interval.as_secs(),
        versions = ?cfg.feed_versions,
        "[INIT] dhan-ltp-alert starting"
    );

    let telegram = TelegramClient::new(
        &cfg.telegram_api_url,
        &cfg.telegram_bot_token,
        cfg.telegram_chat_id.clone(),
    )?;
    let relay = AlertRelay::new(telegram, &cfg);

    let mut feed = FeedAdapter::connect(&cfg).await?;
    feed.on_tick(relay);
    feed.subscribe(cfg.segment, &cfg.security_id).await?;

    tokio::select! {
        res = feed.run() => {
            if let Err(e) = res {
                error!(error = %e, "[FEED] feed stopped");
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("[SHUTDOWN] signal received; exiting");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(err) => {
            tracing::warn!(error = %err, "[SHUTDOWN] failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = term.recv() => {},
    }

    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;
}
