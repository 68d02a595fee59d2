mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use teleglogger_docker::DockerRuntime;
use teleglogger_logs::{Dispatcher, PumpManager};
use teleglogger_notify::{LogNotifier, Notifier, TelegramNotifier};

use crate::config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting teleglogger");

    let notifier: Arc<dyn Notifier> = match args.telegram()? {
        Some(telegram) => Arc::new(
            TelegramNotifier::connect(telegram.token, telegram.chat_id)
                .await
                .context("failed to authorize telegram bot")?,
        ),
        None => {
            tracing::info!("telegram delivery disabled");
            Arc::new(LogNotifier)
        }
    };

    let runtime = DockerRuntime::connect()
        .await
        .context("failed to connect to docker")?;

    tracing::info!(pattern = %args.match_re.pattern(), "matching log lines");
    let dispatcher = Dispatcher::new(args.match_re.clone(), notifier);
    let manager = PumpManager::new(Arc::new(runtime), dispatcher, args.pump_settings());

    manager.run().await.context("pump manager stopped")
}
