use anyhow::Context;
use colored::Colorize;
use dap_commitments::{decode, decode_hex, detect_bridge_mode, encode, CommitmentMode};
use dap_server::{ProxyConfig, ProxyServer};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::CheckConfig(args) => cmd_check_config(args, &cli.format),
        Command::Encode(args) => cmd_encode(args, &cli.format),
        Command::Decode(args) => cmd_decode(args, &cli.format),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ProxyConfig> {
    match path {
        Some(path) => ProxyConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ProxyConfig::default()),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
            signal.cancel();
        });
        ProxyServer::new(config).serve(shutdown).await
    })?;
    Ok(())
}

fn cmd_check_config(args: CheckConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(Some(args.config.as_path()))?;
    config.validate()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "valid": true,
                "bind_addr": config.bind_addr.to_string(),
                "cache_targets": config.secondary.cache_targets,
                "fallback_targets": config.secondary.fallback_targets,
            })
        ),
        OutputFormat::Text => {
            println!("{} {} is valid", "✓".green().bold(), args.config.display().to_string().bold());
            println!("  Listen: {}", config.bind_addr.to_string().cyan());
            println!("  Memstore: {}", enabled(config.memstore.enabled));
            println!("  Object store: {}", enabled(config.object_store.root.is_some()));
            println!("  KV cache: {}", enabled(config.kv_cache.enabled));
            println!("  Cache targets: {}", list(&config.secondary.cache_targets));
            println!("  Fallback targets: {}", list(&config.secondary.fallback_targets));
        }
    }
    Ok(())
}

fn cmd_encode(args: EncodeArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mode: CommitmentMode = args.mode.parse()?;
    let commitment = decode_hex(&args.commitment)?;
    let encoded = format!("0x{}", hex::encode(encode(&commitment, mode)));
    match format {
        OutputFormat::Json => println!("{}", json!({ "mode": mode.as_str(), "encoded": encoded })),
        OutputFormat::Text => println!("{encoded}"),
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let encoded = decode_hex(&args.commitment)?;
    let mode = match args.mode.as_deref() {
        Some(name) => name.parse::<CommitmentMode>()?,
        None => detect_bridge_mode(&encoded)?,
    };
    let (commitment, version) = decode(&encoded, mode)?;
    let commitment = format!("0x{}", hex::encode(commitment));
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "mode": mode.as_str(),
                "cert_version": version.to_string(),
                "commitment": commitment,
            })
        ),
        OutputFormat::Text => {
            println!("  Mode: {}", mode.as_str().yellow());
            println!("  Version: {version}");
            println!("  Commitment: {}", commitment.cyan());
        }
    }
    Ok(())
}

fn enabled(on: bool) -> colored::ColoredString {
    if on { "enabled".green() } else { "disabled".dimmed() }
}

fn list(names: &[String]) -> String {
    if names.is_empty() { "(none)".into() } else { names.join(", ") }
}
