use apns::MemoryPushClient;
use apns_http::{cli::Args, ApnsHttpServer};
use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    info!(
        "APNSHTTPSERVER|START|bind={} push={} feedback={}",
        config.bind_addr, config.client.push_addr, config.client.feedback_addr
    );

    let server = match ApnsHttpServer::start(config, MemoryPushClient::new).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
