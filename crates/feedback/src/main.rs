use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use feedback::chart::Theme;
use feedback::commands::{self, ChartSettings};
use feedback::config::{ClientConfig, SyncConfig, API_URL_ENV, DEFAULT_API_URL, DEFAULT_REFRESH_SECS};
use feedback::console;
use feedback::query::{FilterState, Page, RatingFilter, SentimentFilter};
use feedback::ApiClient;

#[derive(Parser)]
#[command(name = "feedback")]
#[command(about = "Feedback - Customer Feedback Dashboard\nLive review log, sentiment analytics and CSV export")]
#[command(version)]
struct Cli {
  /// Base URL of the feedback backend
  #[arg(long, global = true, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
  api_url: String,

  /// Request timeout in seconds
  #[arg(long, global = true)]
  timeout: Option<u64>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

/// Review filter controls
#[derive(Args)]
struct Filters {
  /// Free-text search over review text
  #[arg(short, long, default_value = "")]
  search: String,
  /// Star rating to show (all, 1-5)
  #[arg(short, long, default_value = "all")]
  rating: RatingFilter,
  /// Sentiment to show (all, positive, negative, neutral, sarcasm)
  #[arg(long, default_value = "all")]
  sentiment: SentimentFilter,
}

impl From<Filters> for FilterState {
  fn from(filters: Filters) -> Self {
    FilterState::new(filters.search, filters.rating, filters.sentiment)
  }
}

/// Chart appearance
#[derive(Args)]
struct ChartArgs {
  /// Color theme (light, dark)
  #[arg(long, default_value = "light")]
  theme: Theme,
  /// YAML file with chart series overrides
  #[arg(long)]
  chart_config: Option<PathBuf>,
}

impl ChartArgs {
  fn settings(&self) -> Result<ChartSettings> {
    let overrides = self.chart_config.as_deref().map(ChartSettings::load_overrides).transpose()?;
    Ok(ChartSettings::new(self.theme, overrides))
  }
}

#[derive(Subcommand)]
enum Command {
  /// Submit a review for sentiment analysis
  Submit {
    /// Star rating (1-5)
    #[arg(short, long)]
    rating: Option<u8>,
    /// Review text
    text: String,
  },
  /// List reviews matching the given filters
  Reviews {
    #[command(flatten)]
    filters: Filters,
    /// Number of reviews to skip
    #[arg(long)]
    skip: Option<u32>,
    /// Maximum number of reviews to return
    #[arg(long)]
    limit: Option<u32>,
  },
  /// Show summary cards and distribution charts
  Analytics {
    #[command(flatten)]
    charts: ChartArgs,
  },
  /// Live dashboard that refreshes on a timer
  Watch {
    #[command(flatten)]
    filters: Filters,
    #[command(flatten)]
    charts: ChartArgs,
    /// Seconds between refreshes
    #[arg(long, default_value_t = DEFAULT_REFRESH_SECS)]
    interval: u64,
    /// Only load once; do not refresh on a timer
    #[arg(long)]
    no_auto_refresh: bool,
  },
  /// Export the filtered review log as CSV
  Export {
    #[command(flatten)]
    filters: Filters,
    /// Directory to write the CSV file into
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
  },
  /// Check that the backend is reachable
  Health,
}

fn init_logging(verbose: bool) {
  let default = if verbose { "feedback=debug,warn" } else { "feedback=info,warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

async fn handle(cli: Cli) -> Result<()> {
  let mut config = ClientConfig::from_env();
  config.base_url = cli.api_url;
  if let Some(timeout) = cli.timeout {
    config.timeout_secs = timeout;
  }
  let client = ApiClient::new(config)?;

  match cli.command {
    Command::Submit { rating, text } => commands::submit(&client, rating, &text).await,
    Command::Reviews { filters, skip, limit } => {
      let page = (skip.is_some() || limit.is_some())
        .then(|| Page { skip: skip.unwrap_or(0), limit: limit.unwrap_or(100) });
      commands::reviews(&client, &filters.into(), page).await
    }
    Command::Analytics { charts } => commands::analytics(&client, &charts.settings()?).await,
    Command::Watch { filters, charts, interval, no_auto_refresh } => {
      let sync = SyncConfig {
        refresh_interval: Duration::from_secs(interval.max(1)),
        auto_refresh: !no_auto_refresh,
        ..SyncConfig::default()
      };
      commands::watch(Arc::new(client), sync, filters.into(), &charts.settings()?).await
    }
    Command::Export { filters, out } => commands::export(&client, &filters.into(), &out).await,
    Command::Health => commands::health(&client).await,
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(err) = handle(cli).await {
    console::error(&format!("{err:#}"));
    std::process::exit(1);
  }
  Ok(())
}
