use anyhow::{Context, Result};
use clap::Parser;
use httpdata::datasource::{Diagnostic, RetryConfig, upgrade_state};
use httpdata::logging::TracingLogger;
use httpdata::{HttpDataSource, HttpDataSourceConfig, HttpFetcher};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// httpdata - read-only HTTP data source
///
/// Performs an HTTP GET and prints the response status, headers and body as
/// JSON state.
///
/// Examples:
///   httpdata fetch https://example.com/version
///   httpdata fetch https://example.com/api -H Accept=application/json --timeout 2000
///   httpdata read sources.json
#[derive(Parser, Debug)]
#[command(author, version = env!("HTTPDATA_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch a single URL
    Fetch(FetchArgs),

    /// Read every data source described in a JSON file, concurrently
    Read(ReadArgs),

    /// Upgrade saved state to the current schema
    Upgrade(UpgradeArgs),
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// The URL to GET (http or https)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Deadline for the whole request in milliseconds
    #[arg(long = "timeout", value_name = "MS", env = "HTTPDATA_TIMEOUT")]
    pub timeout: Option<i64>,

    /// Extra attempts after a transport failure
    #[arg(long = "retry-attempts", value_name = "N", env = "HTTPDATA_RETRY_ATTEMPTS")]
    pub retry_attempts: Option<i64>,

    /// Delay before the first retry in milliseconds
    #[arg(long = "retry-min-delay", value_name = "MS")]
    pub retry_min_delay: Option<i64>,

    /// Maximum delay between retries in milliseconds
    #[arg(long = "retry-max-delay", value_name = "MS")]
    pub retry_max_delay: Option<i64>,

    /// Print state in the version 0 shape (includes response_body_base64_std)
    #[arg(long)]
    pub legacy: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReadArgs {
    /// JSON object mapping data source names to configurations
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct UpgradeArgs {
    /// JSON state file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Schema version the state was written with
    #[arg(long = "from-version", default_value_t = 0)]
    pub from_version: u32,
}

impl FetchArgs {
    fn to_config(&self) -> HttpDataSourceConfig {
        let retry = (self.retry_attempts.is_some()
            || self.retry_min_delay.is_some()
            || self.retry_max_delay.is_some())
        .then(|| RetryConfig {
            attempts: self.retry_attempts,
            min_delay_ms: self.retry_min_delay,
            max_delay_ms: self.retry_max_delay,
        });

        HttpDataSourceConfig {
            url: self.url.clone(),
            request_headers: (!self.headers.is_empty())
                .then(|| self.headers.iter().cloned().collect()),
            request_timeout: self.timeout,
            retry,
        }
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}

fn report(diagnostic: &Diagnostic) {
    let label = match diagnostic.severity {
        httpdata::datasource::Severity::Error => "Error",
        httpdata::datasource::Severity::Warning => "Warning",
    };
    eprintln!("{}: {}\n\n  {}\n", label, diagnostic.summary, diagnostic.detail);
}

fn data_source() -> Result<HttpDataSource<HttpFetcher>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("httpdata/", env!("HTTPDATA_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(HttpDataSource::new(HttpFetcher::new(
        client,
        Arc::new(TracingLogger),
    )))
}

async fn fetch(args: FetchArgs) -> Result<ExitCode> {
    let source = data_source()?;
    let config = args.to_config();

    let (state, warnings) = if args.legacy {
        match source.read_legacy(&config).await {
            Ok(outcome) => (serde_json::to_value(outcome.state)?, outcome.warnings),
            Err(e) => {
                report(&Diagnostic::from(&e));
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        match source.read(&config).await {
            Ok(outcome) => (serde_json::to_value(outcome.state)?, outcome.warnings),
            Err(e) => {
                report(&Diagnostic::from(&e));
                return Ok(ExitCode::FAILURE);
            }
        }
    };

    warnings.iter().for_each(report);
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(ExitCode::SUCCESS)
}

async fn read(args: ReadArgs) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let configs: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let source = data_source()?;
    let mut failed = false;
    let mut output = serde_json::Map::new();

    for (name, result) in source.read_all(&configs).await {
        let entry = match result {
            Ok(outcome) => json!({ "state": outcome.state, "warnings": outcome.warnings }),
            Err(e) => {
                failed = true;
                log::warn!("{}: {}", name, e);
                json!({
                    "error": {
                        "kind": e.kind(),
                        "summary": e.summary(),
                        "detail": e.to_string(),
                    }
                })
            }
        };
        output.insert(name, entry);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn upgrade(args: UpgradeArgs) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let state = upgrade_state(value, args.from_version)?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => fetch(args).await,
        Commands::Read(args) => read(args).await,
        Commands::Upgrade(args) => upgrade(args),
    }
}
