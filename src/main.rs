//! Zentinel Token Exchange CLI
//!
//! Reads a form-encoded RFC 8693 token request from stdin, runs it through the
//! exchange engine and prints the JSON token response or error body.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use zentinel_token_exchange::exchange::{
    parse_form, ExchangeConfiguration, IssuerConfig, JwtTokenIssuer, TokenExchangeResponse,
    GRANT_TYPE_TOKEN_EXCHANGE,
};
use zentinel_token_exchange::jwt::{HttpKeySource, JwtTokenValidator, KeyCache};
use zentinel_token_exchange::{ExchangeError, GrantDependencies, GrantRegistry, TokenExchangeError};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "zentinel-token-exchange")]
#[command(about = "OAuth 2.0 Token Exchange (RFC 8693) engine")]
struct Args {
    /// Path to JSON configuration file
    #[arg(long, env = "EXCHANGE_CONFIG")]
    config: PathBuf,

    /// Authenticated client making the request
    #[arg(long, env = "EXCHANGE_CLIENT_ID")]
    client_id: String,

    /// Enable verbose logging
    #[arg(short, long, env = "EXCHANGE_VERBOSE")]
    verbose: bool,
}

/// Configuration file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    exchange: ExchangeConfiguration,
    issuer: IssuerConfig,
}

impl FileConfig {
    fn load(path: &PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: FileConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.exchange.validate().map_err(|e| anyhow!(e))?;
        config.issuer.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }
}

fn print_error(err: &ExchangeError) -> Result<()> {
    let body = TokenExchangeError::from(err);
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = FileConfig::load(&args.config)?;

    info!(
        allow_delegation = config.exchange.allow_delegation,
        allow_impersonation = config.exchange.allow_impersonation,
        max_delegation_chain_depth = config.exchange.max_delegation_chain_depth,
        trusted_issuers = config.exchange.trusted_issuers.len(),
        "Configuration loaded"
    );

    let key_source = HttpKeySource::new(config.exchange.resolver_timeout())
        .map_err(|e| anyhow!("{}", e))?;
    let key_cache = Arc::new(KeyCache::new(
        Arc::new(key_source),
        Duration::from_secs(config.exchange.key_cache_ttl_secs),
    ));
    let deps = GrantDependencies {
        validator: Arc::new(JwtTokenValidator::new(key_cache)),
        issuer: Arc::new(JwtTokenIssuer::new(&config.issuer)?),
    };

    let mut body = String::new();
    tokio::io::stdin()
        .read_to_string(&mut body)
        .await
        .context("Failed to read request from stdin")?;

    let params = match parse_form(body.trim()) {
        Ok(params) => params,
        Err(e) => {
            print_error(&e)?;
            std::process::exit(1);
        }
    };

    let grant_type = params
        .get("grant_type")
        .map(String::as_str)
        .unwrap_or(GRANT_TYPE_TOKEN_EXCHANGE);

    let registry = GrantRegistry::with_defaults();
    let Some(grant) = registry.build(grant_type, config.exchange, deps)? else {
        warn!(grant_type = %grant_type, "Unsupported grant type");
        print_error(&ExchangeError::invalid_request("unsupported grant_type"))?;
        std::process::exit(1);
    };

    // Ctrl-C drops the grant future, cancelling in-flight token resolution.
    let outcome = tokio::select! {
        outcome = grant.grant(&params, &args.client_id) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, exchange cancelled");
            std::process::exit(130);
        }
    };

    match outcome {
        Ok(issued) => {
            let response = TokenExchangeResponse::from_issued(issued);
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(e) => {
            print_error(&e)?;
            std::process::exit(1);
        }
    }
}
