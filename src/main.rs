//! CLI entry point for `channel-archiver`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use channel_archiver::config::{DEFAULT_API_BASE_URL, resolve_auth_token};
use channel_archiver::{
    Config, HistoryFetcher, HttpMessageSource, Materializer, MessageId, RecordStore,
};

#[derive(Parser)]
#[command(name = "channel-archiver", version, about = "Back up a chat channel and its attachments")]
struct Cli {
    /// get-raw downloads the raw message pages, parse downloads the attachments they reference
    #[arg(long, value_enum, default_value_t = Mode::GetRaw)]
    mode: Mode,

    /// Channel to download
    #[arg(long, env = "CHANNEL_ARCHIVER_CHANNEL")]
    channel: String,

    /// Start from messages older than this one (default: the newest message)
    #[arg(long, value_name = "MESSAGE_ID")]
    before: Option<String>,

    /// Continue from the oldest page already saved for this channel
    #[arg(long, conflicts_with = "before")]
    resume: bool,

    /// Authorization token (falls back to the auth file)
    #[arg(long, env = "CHANNEL_ARCHIVER_AUTH", hide_env_values = true)]
    auth: Option<String>,

    /// File holding the authorization token
    #[arg(long, value_name = "FILE", default_value = "auth")]
    auth_file: PathBuf,

    /// Directory holding raw_<channel> and parsed_<channel>
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// REST API root of the chat service
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE_URL)]
    api_base: String,

    /// Maximum simultaneous attachment downloads
    #[arg(long, value_name = "N", default_value_t = 10)]
    concurrency: usize,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Fetch message history into page files
    GetRaw,
    /// Download attachments referenced by saved pages
    Parse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config {
        channel: cli.channel.clone(),
        output_dir: cli.output_dir.clone(),
        api_base_url: cli.api_base.clone(),
        max_concurrent_downloads: cli.concurrency,
        ..Default::default()
    };
    config.validate()?;

    match cli.mode {
        Mode::GetRaw => cmd_get_raw(&cli, config).await,
        Mode::Parse => cmd_parse(config).await,
    }
}

async fn cmd_get_raw(cli: &Cli, mut config: Config) -> anyhow::Result<()> {
    config.auth_token = Some(resolve_auth_token(cli.auth.as_deref(), &cli.auth_file)?);

    let store = RecordStore::from_config(&config);
    let start = match (&cli.before, cli.resume) {
        (Some(before), _) => Some(MessageId::new(before.trim())),
        (None, true) => {
            let frontier = store.frontier()?;
            match &frontier {
                Some(id) => info!(cursor = %id, "Resuming from the oldest saved page"),
                None => info!("No saved pages yet, starting from the newest message"),
            }
            frontier
        }
        (None, false) => None,
    };

    let source = HttpMessageSource::new(&config)?;
    let fetcher = HistoryFetcher::new(source, store, config.page_size);
    let report = fetcher
        .run(start)
        .await
        .with_context(|| format!("fetching history of channel {}", config.channel))?;

    info!(
        pages = report.pages_written,
        messages = report.messages,
        "We're done!"
    );
    Ok(())
}

async fn cmd_parse(config: Config) -> anyhow::Result<()> {
    let materializer = Materializer::from_config(&config)?;
    let report = materializer
        .run()
        .await
        .with_context(|| format!("downloading attachments of channel {}", config.channel))?;

    for (path, reason) in &report.failures {
        warn!(path = %path.display(), reason = %reason, "Not downloaded");
    }
    info!(
        downloaded = report.downloaded,
        skipped = report.skipped,
        failed = report.failed,
        "Attachments materialized"
    );
    Ok(())
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
