//! gateway-cli: list models and stream chat through a configured gateway
//!
//! Usage:
//!   gateway-cli models [--config <path>]                  List models across all providers
//!   gateway-cli chat <model> <prompt> [--config <path>]   Stream output parts as JSON lines

use ai_gateway_rust::config::GatewayConfig;
use ai_gateway_rust::types::{ChatRequest, Message};
use ai_gateway_rust::{CancelHandle, OutputPart, Router, RouterBuilder};
use anyhow::{bail, Context};
use futures::StreamExt;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "models" => cmd_models(&args[2..]).await,
        "chat" => cmd_chat(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("gateway-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"gateway-cli: provider-agnostic AI gateway

USAGE:
    gateway-cli <COMMAND> [OPTIONS]

COMMANDS:
    models [--config <path>]                 List models across all configured providers
    chat <model> <prompt> [--config <path>]  Stream a chat reply as JSON output parts
    version                                  Show version information
    help                                     Show this help message

ENVIRONMENT:
    AI_GATEWAY_CONFIG       Gateway config file (YAML)
    RUST_LOG                Log filter (default: info)"#
    );
}

/// Split `--config <path>` out of the argument list.
fn split_config_flag(args: &[String]) -> anyhow::Result<(Option<PathBuf>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((config, rest))
}

async fn load_router(config: Option<PathBuf>) -> anyhow::Result<Router> {
    let path = match config.or_else(|| std::env::var_os("AI_GATEWAY_CONFIG").map(PathBuf::from)) {
        Some(p) => p,
        None => bail!("no config: pass --config <path> or set AI_GATEWAY_CONFIG"),
    };
    let config = GatewayConfig::load(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(RouterBuilder::new().with_config(&config)?.build())
}

async fn cmd_models(args: &[String]) -> anyhow::Result<()> {
    let (config, _) = split_config_flag(args)?;
    let router = load_router(config).await?;
    let models = router.list_models().await;
    for m in models.iter() {
        match &m.owned_by {
            Some(owner) => println!("{:<48} {owner}", m.id),
            None => println!("{}", m.id),
        }
    }
    eprintln!("{} model(s)", models.len());
    Ok(())
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let (config, rest) = split_config_flag(args)?;
    let [model, prompt @ ..] = rest.as_slice() else {
        bail!("usage: gateway-cli chat <model> <prompt>");
    };
    if prompt.is_empty() {
        bail!("usage: gateway-cli chat <model> <prompt>");
    }
    let router = load_router(config).await?;

    let cancel = CancelHandle::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let request = ChatRequest::new(model.as_str(), vec![Message::user(prompt.join(" "))]);
    let mut parts = router.chat_stream(request, &cancel).await?;
    let mut failed = false;
    while let Some(part) = parts.next().await {
        failed |= matches!(part, OutputPart::Error { .. });
        println!("{}", serde_json::to_string(&part)?);
    }
    if cancel.is_cancelled() {
        eprintln!("cancelled");
    }
    if failed {
        std::process::exit(2);
    }
    Ok(())
}
