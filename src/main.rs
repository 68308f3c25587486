use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;
use sparql_dump::config::DEFAULT_PAGE_SIZE;
use sparql_dump::{
    info_time, Aggregator, DumpConfig, FetchRequest, HttpEndpoint, QueryTemplate, Result,
};
use tokio::{fs::File, io::AsyncReadExt, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Dump the full result set of a paginated SPARQL query to a JSON file.
#[derive(Parser, Debug)]
#[command(name = "sparql-dump", version, about)]
struct Cli {
    /// Query template containing `%(offset)s` and `%(limit)s`. `-` reads stdin.
    #[arg(long, short = 'q')]
    query_file: PathBuf,

    /// Expected total number of results (an estimate, used to plan pages).
    #[arg(long, short = 't', allow_negative_numbers = true)]
    total: i64,

    /// Results per page.
    #[arg(long, short = 'l', default_value_t = DEFAULT_PAGE_SIZE, allow_negative_numbers = true)]
    page_size: i64,

    /// Output JSON file. Writes to stdout when omitted.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// SPARQL endpoint URL.
    #[arg(long, env = "SPARQL_ENDPOINT")]
    endpoint: Option<String>,

    /// Keep fetching past the declared total while pages come back full.
    #[arg(long, conflicts_with = "strict_total")]
    open_ended: bool,

    /// Never fetch more pages than the declared total implies.
    #[arg(long)]
    strict_total: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "sparql-dump failed");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let start_time = Local::now();

    let mut config = DumpConfig::from_env();
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }
    if cli.open_ended {
        config.open_ended = true;
    }
    if cli.strict_total {
        config.open_ended = false;
    }

    let template = QueryTemplate::new(read_template(&cli.query_file).await?)?;
    let request = FetchRequest::new(template, cli.total, cli.page_size);

    let endpoint = HttpEndpoint::from_config(&config)?;
    info!(endpoint = %endpoint.url(), query_file = %cli.query_file.display(), "Dumping query results");
    let aggregator = Aggregator::with_config(endpoint, &config);

    // Ctrl-C stops the run at the next page boundary.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current page");
                cancel.cancel();
            }
        }
    });

    let result = aggregator
        .fetch_with(&request, &cancel, |p| {
            info!(
                rows_collected = p.rows_collected,
                total_expected = p.total_expected,
                pages = p.pages_completed,
                pages_planned = p.pages_planned,
                retries = p.pages_failed,
                "Progress"
            );
        })
        .await?;

    let json = result.to_json(cli.pretty)?;
    match &cli.output {
        Some(path) => {
            let local_now = Local::now();
            let mut file = File::create(path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            info_time!(local_now, "Wrote {} rows to file: {}", result.row_count(), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    info_time!(start_time, "Full program time:");
    Ok(())
}

async fn read_template(path: &Path) -> Result<String> {
    let mut text = String::new();
    if path.as_os_str() == "-" {
        tokio::io::stdin().read_to_string(&mut text).await?;
    } else {
        File::open(path).await?.read_to_string(&mut text).await?;
    }
    Ok(text)
}
