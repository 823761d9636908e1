//! livemsg - Main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use livemsg::{
    cli::{Cli, Command, DemoView},
    config::Config,
    context::ConversationContext,
    engine::Engine,
    transport::ConsoleTransport,
    views::{CounterView, NoticeView, PagerView},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config) => {
            init_logging("warn");
            let config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{:#?}", config);
            Ok(())
        }
        Some(Command::Demo { view, items }) => {
            init_logging("info");
            run_demo(view, items).await
        }
        None => {
            init_logging("info");
            run_demo(DemoView::Pager, 23).await
        }
    }
}

fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_demo(view: DemoView, items: usize) -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::info!(
        channel = %config.demo.channel_id,
        user = %config.demo.user_id,
        "Starting demo"
    );

    let transport = Arc::new(ConsoleTransport::new(
        config.demo.channel_id.clone(),
        config.demo.user_id.clone(),
    ));
    let ctx = ConversationContext::new(
        config.demo.channel_id.clone(),
        config.demo.user_id.clone(),
        transport.clone(),
    );
    let engine = Arc::new(Engine::new(config.engine.clone()));

    println!(
        "Type `/react <id> <emoji>` to press a button, text to answer a prompt, `/quit` to leave."
    );

    match view {
        DemoView::Counter => {
            engine
                .create(Arc::clone(&ctx), CounterView::new("Counter"))
                .update()
                .await?;
        }
        DemoView::Pager => {
            let entries = (1..=items).map(|i| format!("Entry number {}", i)).collect();
            engine
                .create(Arc::clone(&ctx), PagerView::new("Entries", entries, 5))
                .update()
                .await?;
        }
        DemoView::Notice => {
            engine
                .create(Arc::clone(&ctx), NoticeView::new("This message will not change."))
                .update()
                .await?;
        }
    }

    Arc::clone(&engine).run(transport.events()).await;
    engine.shutdown().await;
    Ok(())
}
