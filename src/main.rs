use anyhow::Result;
use cache::Cache;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use observability::{JsonlObserver, Observer, TracingObserver};
use retrieval::{GithubContentClient, Retriever};
use search::{
    complete_fingerprint, Aggregator, GrepAppClient, HtmlSnippetExtractor, OutputMode,
    SearchOptions, SearchParams, SearchTool,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "codescout", about = "Search public code and fetch the files behind the matches")]
struct Cli {
    /// Config file (defaults to ./codescout.toml, then ~/.config/codescout/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search public code
    Search {
        /// Search query
        query: Vec<String>,
        #[arg(long)]
        case_sensitive: bool,
        /// Treat the query as a regular expression
        #[arg(long)]
        regex: bool,
        #[arg(long)]
        whole_words: bool,
        /// Restrict to a repository
        #[arg(long)]
        repo: Option<String>,
        /// Restrict to a path
        #[arg(long)]
        path: Option<String>,
        /// Comma-separated languages
        #[arg(long)]
        lang: Option<String>,
        /// Keep only matched lines whose text matches this regex
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        output: Output,
    },

    /// Fetch files from an earlier search by result number
    Retrieve {
        /// The query exactly as it was searched
        query: String,
        /// Result numbers (all results when omitted)
        #[arg(short, long, value_delimiter = ',')]
        numbers: Vec<usize>,
    },

    /// Inspect the result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// List live cache entries for a query
    List { query: String },
    /// Delete expired cache entries
    Purge,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    Text,
    Numbered,
    Json,
}

impl From<Output> for OutputMode {
    fn from(output: Output) -> Self {
        match output {
            Output::Text => OutputMode::Text,
            Output::Numbered => OutputMode::Numbered,
            Output::Json => OutputMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load_with_env(cli.config.as_deref())?;
    let cache = Arc::new(Cache::on_disk(
        &config.cache.dir,
        Duration::from_secs(config.cache.ttl_secs),
    ));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Search {
            query,
            case_sensitive,
            regex,
            whole_words,
            repo,
            path,
            lang,
            filter,
            output,
        } => {
            let observer = observer(&config)?;
            let client = GrepAppClient::new(&config.search, observer.clone())?;
            let aggregator = Aggregator::new(
                Arc::new(client),
                cache,
                Arc::new(HtmlSnippetExtractor::new()?),
                observer,
            )
            .with_max_pages(config.search.max_pages);

            let params = SearchParams {
                query: query.join(" "),
                options: SearchOptions {
                    case_sensitive,
                    use_regex: regex,
                    whole_words,
                    repo_filter: repo,
                    path_filter: path,
                    lang_filter: lang,
                },
                line_filter: filter,
                output: output.into(),
            };
            let rendered = SearchTool::new(aggregator).search(&params, &cancel).await?;
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
        Command::Retrieve { query, numbers } => {
            let observer = observer(&config)?;
            let client = GithubContentClient::new(&config.github, observer.clone())?;
            let retriever = Retriever::new(cache, Arc::new(client), observer)
                .with_concurrency(config.github.concurrency_limit());

            let result = retriever.retrieve(&query, Some(numbers.as_slice()), &cancel).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Cache { command } => match command {
            CacheCommand::List { query } => {
                let complete = complete_fingerprint(&query);
                let keys = cache.find_by_query(&query)?;
                if keys.is_empty() {
                    println!("No live cache entries for query: {}", query);
                }
                for key in keys {
                    let kind = if key == complete { "complete" } else { "page" };
                    println!("{}  {}", key, kind);
                }
            }
            CacheCommand::Purge => {
                let removed = cache.purge_expired()?;
                println!("Removed {} expired cache entries", removed);
            }
        },
    }

    Ok(())
}

fn observer(config: &Config) -> Result<Arc<dyn Observer>> {
    if config.log.jsonl {
        let observer = JsonlObserver::new(&config.log.dir)?;
        tracing::debug!(path = %observer.path().display(), "writing operation log");
        Ok(Arc::new(observer))
    } else {
        Ok(Arc::new(TracingObserver))
    }
}
