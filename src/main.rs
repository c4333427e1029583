use std::{env, process::ExitCode, time::Duration};

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wikiwatcher::{
    api::{ClientConfig, MediaWikiClient},
    cache::CacheConfig,
    service::Service,
};

/// Answer wikiwatcher request targets like `/articleHistory/Cat?tags=[bot]` against the MediaWiki API.
#[derive(Debug, clap::Parser)]
#[command(version)]
struct CommandLine {
    /// Request targets, each printed on its own line in the given order.
    #[arg(required = true)]
    targets: Vec<String>,
    /// MediaWiki `api.php` endpoint, overrides `WIKIWATCHER_API_URL`.
    #[arg(long)]
    api_url: Option<String>,
    /// Timeout of every single API request, overrides `WIKIWATCHER_TIMEOUT_MS`.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Upper limit of API pages fetched per history, overrides `WIKIWATCHER_MAX_PAGES`.
    #[arg(long)]
    max_pages: Option<usize>,
}

impl CommandLine {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(api_url) = &self.api_url {
            config.api_url.clone_from(api_url);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        config
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = CommandLine::parse();

    let config = args.client_config();
    let max_pages = config.max_pages;
    let client = match MediaWikiClient::new(config) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(message = "Failed to set up the HTTP client", %error);
            return ExitCode::FAILURE;
        }
    };

    let mut service = Service::new(client, CacheConfig::default(), max_pages);
    let mut all_succeeded = true;
    for target in &args.targets {
        let response = service.handle(target);
        if !response.is_success() {
            all_succeeded = false;
            tracing::warn!(message = "Request did not succeed", target, status = response.status);
        }
        println!("{}", response.body);
    }

    if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WIKIWATCHER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("wikiwatcher=info,warn"));

    let format = env::var("WIKIWATCHER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // stdout carries the response bodies
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
