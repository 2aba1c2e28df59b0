//! Self-organizing agent cluster core — demo binary
//!
//! Runs the adaptive loop against whatever is piped on stdin, or a built-in
//! sample task when run without input, and prints each phase event as it
//! happens.

use std::io::{self, IsTerminal, Read};

use agent_cluster_core::demo_loop;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let input = read_input()?;
    info!(chars = input.len(), "running adaptive loop");

    let loop_ = demo_loop();
    let events = loop_.execute(&input).await;

    for event in events {
        println!("{}", serde_json::to_string_pretty(&event)?);
    }

    Ok(())
}

fn read_input() -> anyhow::Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok("Summarize the quarterly report and flag any numbers that look wrong.".to_string());
    }
    let mut buf = String::new();
    stdin.read_to_string(&mut buf)?;
    let trimmed = buf.trim();
    if trimmed.is_empty() {
        Ok("Summarize the quarterly report and flag any numbers that look wrong.".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}
