//! a3s-dork CLI - multi-engine dorking link collector.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use a3s_dork::goofil::{Goofil, DEFAULT_FILE_TYPES};
use a3s_dork::fetcher_http::HttpFetcher;
use a3s_dork::processing::{self, EmailExtractor, KeywordSearch, FILE_EXTENSIONS};
use a3s_dork::{
    CollectionSummary, Collector, CollectorConfig, DocumentDownloader, DownloadReport, EngineKind,
    LinkStore, SessionFactory,
};

/// a3s-dork - Collect, deduplicate and mine search engine results
#[derive(Parser)]
#[command(name = "a3s-dork")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloads and collected data
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Link store file
    #[arg(long, global = true)]
    link_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect links for a dork from every engine, or download stored links
    Collect(CollectArgs),

    /// Find a domain's documents by file type
    Goofil(GoofilArgs),

    /// Extract emails, keywords or file links from collected data
    Process(ProcessArgs),

    /// Remove all collected data
    Clean,

    /// Show example dorks
    Dorks,

    /// List available search engines
    Engines,
}

#[derive(Args)]
struct CollectArgs {
    /// Dork query
    #[arg(required_unless_present = "download")]
    query: Option<String>,

    /// Save the rendered page of every stored link instead of searching
    #[arg(long)]
    download: bool,

    /// Pause between result pages
    #[arg(long)]
    slow_search: bool,

    /// Maximum result pages per engine
    #[arg(long)]
    max_pages: Option<u32>,

    /// Engines to use (comma-separated): google, bing, duckduckgo, yandex
    #[arg(short, long, value_delimiter = ',')]
    engines: Option<Vec<String>>,

    /// Show the browser windows
    #[arg(long)]
    headed: bool,

    /// Stop paginating after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
struct GoofilArgs {
    /// Target domain, e.g. example.com
    domain: String,

    /// File types to look for (comma-separated)
    #[arg(long, value_delimiter = ',')]
    file_types: Option<Vec<String>>,

    /// Maximum result pages per engine and file type
    #[arg(long)]
    max_pages: Option<u32>,

    /// Download the documents found
    #[arg(long)]
    download: bool,

    /// Show the browser windows
    #[arg(long)]
    headed: bool,
}

#[derive(Args)]
struct ProcessArgs {
    /// Print email addresses found in collected data
    #[arg(long)]
    emails: bool,

    /// Search collected data for keywords
    #[arg(long, num_args = 1..)]
    keywords: Option<Vec<String>>,

    /// Print stored links that point at documents
    #[arg(long)]
    files: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Collect(args) => run_collect(config, args).await,
        Commands::Goofil(args) => run_goofil(config, args).await,
        Commands::Process(args) => run_process(&config, args),
        Commands::Clean => run_clean(&config),
        Commands::Dorks => show_dorks(&config),
        Commands::Engines => list_engines(),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("a3s_dork={}", level)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Config file (or defaults) with global CLI overrides applied.
fn load_config(cli: &Cli) -> Result<CollectorConfig> {
    let mut config = match &cli.config {
        Some(path) => CollectorConfig::from_file(path)?,
        None => CollectorConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
        if cli.link_file.is_none() {
            config.link_file = config.default_link_file();
        }
    }
    if let Some(file) = &cli.link_file {
        config.link_file = file.clone();
    }
    Ok(config)
}

#[cfg(feature = "headless")]
fn session_factory(config: &CollectorConfig) -> Result<Arc<dyn SessionFactory>> {
    use a3s_dork::{BrowserPool, BrowserPoolConfig};
    Ok(Arc::new(BrowserPool::new(BrowserPoolConfig::from_collector(
        config,
    ))))
}

#[cfg(not(feature = "headless"))]
fn session_factory(_config: &CollectorConfig) -> Result<Arc<dyn SessionFactory>> {
    anyhow::bail!("a3s-dork was built without the `headless` feature, no browser is available")
}

async fn run_collect(mut config: CollectorConfig, args: CollectArgs) -> Result<()> {
    config.headless &= !args.headed;

    if args.download {
        let factory = session_factory(&config)?;
        let report = DocumentDownloader::from_config(&config, factory)
            .download_stored(&config.link_file)
            .await?;
        print_download_report(&report);
        return Ok(());
    }

    let Some(query) = args.query.as_deref() else {
        anyhow::bail!("A query is required unless --download is given");
    };

    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(engines) = &args.engines {
        config.engines = engines
            .iter()
            .map(|name| name.parse::<EngineKind>())
            .collect::<a3s_dork::Result<_>>()?;
    }
    config.slow_search |= args.slow_search;
    if args.deadline.is_some() {
        config.deadline_secs = args.deadline;
    }

    let factory = session_factory(&config)?;
    let collector = Collector::new(config.clone(), factory)?;
    let summary = collector.run(query).await?;

    match args.format {
        OutputFormat::Text => print_summary(&summary, &config),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn print_summary(summary: &CollectionSummary, config: &CollectorConfig) {
    println!(
        "\nCollected \"{}\" in {:.1}s:\n",
        summary.query,
        summary.duration_ms as f64 / 1000.0
    );
    for result in &summary.results {
        print!(
            "  {:<11} {:<18} {:>4} pages {:>5} new links",
            result.engine.as_str(),
            result.reason.to_string(),
            result.pages_visited,
            result.links.len()
        );
        match &result.error {
            Some(error) => println!("  ({})", error),
            None => println!(),
        }
    }
    println!(
        "\n{} links collected, {} new, {} stored in {}",
        summary.collected,
        summary.new_links,
        summary.total_links,
        config.link_file.display()
    );
}

fn print_download_report(report: &DownloadReport) {
    println!(
        "Saved {} of {} files ({} failed, {} name collisions)",
        report.saved.len(),
        report.attempted(),
        report.failed.len(),
        report.collisions
    );
    for (url, error) in &report.failed {
        println!("  failed: {} ({})", url, error);
    }
}

async fn run_goofil(mut config: CollectorConfig, args: GoofilArgs) -> Result<()> {
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    config.headless &= !args.headed;

    let file_types = args
        .file_types
        .unwrap_or_else(|| DEFAULT_FILE_TYPES.iter().map(|s| s.to_string()).collect());

    let factory = session_factory(&config)?;
    let collector = Collector::new(config.clone(), factory)?;
    let goofil = Goofil::new(&collector, &args.domain, file_types.as_slice())?;
    let report = goofil.discover().await?;

    println!(
        "\n{} documents on {} ({}):\n",
        report.documents.len(),
        goofil.domain(),
        goofil.file_types().join(", ")
    );
    for url in &report.documents {
        println!("  {}", url);
    }

    if args.download && !report.documents.is_empty() {
        let fetcher = HttpFetcher::new(config.download_timeout())?
            .with_concurrency(config.concurrency_limit);
        let downloads = goofil
            .download(&report.documents, &fetcher, &config.output_dir.join("documents"))
            .await?;
        print_download_report(&downloads);
    }
    Ok(())
}

fn run_process(config: &CollectorConfig, args: ProcessArgs) -> Result<()> {
    if !args.emails && args.keywords.is_none() && !args.files {
        anyhow::bail!("Nothing to do: pass --emails, --keywords or --files");
    }

    if args.emails {
        let extractor = EmailExtractor::new()?;
        for email in extractor.collect(&config.link_file, &config.output_dir) {
            println!("{}", email);
        }
    }

    if let Some(keywords) = &args.keywords {
        let search = KeywordSearch::new(keywords.as_slice())?;
        for hit in search.search_dir(&config.output_dir) {
            let file = hit
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("[{}: {}] {}", file, hit.line, hit.context);
        }
    }

    if args.files {
        let store = LinkStore::load(&config.link_file);
        for url in processing::file_links(store.links(), FILE_EXTENSIONS) {
            println!("{}", url);
        }
    }
    Ok(())
}

fn run_clean(config: &CollectorConfig) -> Result<()> {
    if processing::clean(&config.output_dir)? {
        println!("Collected data has been removed.");
    } else {
        println!("No data to clean.");
    }
    Ok(())
}

fn show_dorks(config: &CollectorConfig) -> Result<()> {
    match processing::read_dorks(&config.dorks_file) {
        Ok(dorks) => {
            println!("Dorks:\n");
            for dork in dorks {
                println!("  {}", dork);
            }
        }
        Err(e) => {
            eprintln!(
                "No dorks file at {} ({}). Create it with one dork per line.",
                config.dorks_file.display(),
                e
            );
        }
    }
    Ok(())
}

fn list_engines() -> Result<()> {
    println!("Available search engines:\n");
    for engine in EngineKind::ALL {
        println!(
            "    {:<11} - {} ({})",
            engine.as_str(),
            engine.display_name(),
            engine.base_url_template().replace("{query}", "...")
        );
    }
    println!();
    println!("Usage: a3s-dork collect \"filetype:pdf site:example.com\" -e google,bing");
    Ok(())
}
