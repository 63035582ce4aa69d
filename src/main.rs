use anyhow::{Context, Result};
use clap::Parser;

use riffle::{fetch_feed, resolve_favicon, FetchOptions, RecordConfig, DEFAULT_TIME_FORMAT};

/// Normalize an RSS/Atom feed into a uniform record.
#[derive(Parser, Debug)]
#[command(name = "riffle", version, about)]
struct Cli {
    /// Feed (or page, with --favicon) URL to process
    url: String,

    /// Resolve the page's favicon instead of parsing a feed
    #[arg(long)]
    favicon: bool,

    /// strftime-style format for the derived update_time field
    #[arg(long, default_value = DEFAULT_TIME_FORMAT)]
    time_format: String,

    /// Jitter bound in seconds for stories with missing timestamps
    #[arg(long, default_value_t = 1)]
    fuzz: u32,

    /// User-Agent header sent with requests
    #[arg(long)]
    user_agent: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    if cli.favicon {
        println!("{}", resolve_favicon(&client, &cli.url).await);
        return Ok(());
    }

    let record = RecordConfig::new(cli.time_format, cli.fuzz)
        .context("invalid record configuration")?;
    let options = FetchOptions {
        user_agent: cli.user_agent,
        record,
        ..FetchOptions::default()
    };

    let record = fetch_feed(&client, &cli.url, &options)
        .await
        .with_context(|| format!("failed to fetch feed from '{}'", cli.url))?;
    println!("{}", serde_json::to_string_pretty(&record.to_json())?);

    Ok(())
}
