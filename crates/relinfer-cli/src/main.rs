//! Relinfer CLI - explain why two terms are related

mod render;
mod repl;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use relinfer_core::config::Config;
use relinfer_core::domain::{RelationType, Term};
use relinfer_core::fetcher::{JdmFetcher, RelationFetcher, RetryPolicy, Retrying, StaticGraph};
use relinfer_core::session::{InferOptions, InferenceSession};
use serde_json::json;
use tracing::{debug, warn};

use render::{Query, Renderer, renderer_by_name};

#[derive(Parser)]
#[command(name = "relinfer")]
#[command(author, version, about = "Explain lexical-semantic relations between terms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Offline graph file (JSON array of edges) used instead of the remote service
    #[arg(long, global = true, value_name = "FILE")]
    graph: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask why <source> holds <relation> with <target>
    Query {
        /// Source term
        source: String,
        /// Relation type, e.g. r_has_part
        relation: String,
        /// Target term
        target: String,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Interactive query loop
    Repl {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// List relation types known to the graph
    Relations,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct SearchArgs {
    /// Maximum number of results (0 = all)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Maximum path length in hops
    #[arg(short, long)]
    depth: Option<usize>,

    /// Relation types allowed on intermediate hops (comma separated)
    #[arg(long, value_delimiter = ',')]
    via: Vec<String>,

    /// Renderer (terminal or chat)
    #[arg(long)]
    renderer: Option<String>,
}

impl SearchArgs {
    fn options(&self) -> InferOptions {
        let mut options = InferOptions::default();
        if let Some(limit) = self.limit {
            options = options.with_top_k(limit);
        }
        if let Some(depth) = self.depth {
            options = options.with_max_depth(depth);
        }
        let via: Vec<RelationType> = self
            .via
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(RelationType::new)
            .collect();
        if !via.is_empty() {
            options = options.with_via(via);
        }
        options
    }

    fn renderer(&self, config: &Config) -> anyhow::Result<Box<dyn Renderer>> {
        let name = self.renderer.as_deref().unwrap_or(&config.output.renderer);
        renderer_by_name(name, std::io::stdout().is_terminal())
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration
    List,
    /// Reset to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let directive = match (cli.verbose, cli.quiet) {
        (true, _) => "relinfer=debug",
        (false, true) => "relinfer=warn",
        (false, false) => "relinfer=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Query {
            ref source,
            ref relation,
            ref target,
            ref search,
        } => {
            let query = Query {
                source: Term::new(source),
                relation: RelationType::new(relation),
                target: Term::new(target),
            };
            cmd_query(&cli, query, search).await
        }
        Commands::Repl { ref search } => cmd_repl(&cli, search).await,
        Commands::Relations => cmd_relations(&cli).await,
        Commands::Config { ref action } => cmd_config(action, cli.quiet),
    }
}

/// Print an error with its code and a hint when one exists
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<relinfer_core::Error>() {
        Some(e) => {
            eprintln!("error[{}]: {}", e.code(), e);
            if let Some(hint) = e.suggestion() {
                eprintln!("  hint: {}", hint);
            }
        }
        None => eprintln!("error: {:#}", err),
    }
}

async fn build_fetcher(config: &Config, graph: Option<&Path>) -> anyhow::Result<Arc<dyn RelationFetcher>> {
    if let Some(path) = graph {
        let graph = StaticGraph::from_json_file(path)?;
        debug!(path = %path.display(), edges = graph.edge_count(), "Loaded offline graph");
        return Ok(Arc::new(graph));
    }

    let fetcher = connect_remote(config).await?;
    Ok(Arc::new(Retrying::new(fetcher, RetryPolicy::from(&config.remote))))
}

/// Remote client with credentials from the environment
async fn connect_remote(config: &Config) -> anyhow::Result<JdmFetcher> {
    let mut builder = JdmFetcher::builder().config(&config.remote);
    if let Some(key) = config.remote.resolved_api_key()? {
        builder = builder.api_key(key);
    }
    Ok(builder.connect().await?)
}

async fn build_session(cli: &Cli, config: &Config) -> anyhow::Result<InferenceSession> {
    let fetcher = build_fetcher(config, cli.graph.as_deref()).await?;
    let session = InferenceSession::from_config(fetcher, config)?;

    if let Some(path) = &config.cache.persist_path {
        if let Err(e) = session.cache().load_snapshot(path) {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable cache snapshot");
        }
    }
    Ok(session)
}

fn save_cache(session: &InferenceSession, config: &Config) {
    let Some(path) = &config.cache.persist_path else {
        return;
    };
    if let Err(e) = session.cache().save_snapshot(path) {
        warn!(path = %path.display(), error = %e, "Failed to save cache snapshot");
    }
}

async fn cmd_query(cli: &Cli, query: Query, search: &SearchArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let renderer = search.renderer(&config)?;
    let session = build_session(cli, &config).await?;

    let started = Instant::now();
    let outcome = session
        .infer(&query.source, &query.relation, &query.target, &search.options())
        .await;
    let elapsed = started.elapsed();
    save_cache(&session, &config);
    let results = outcome?;

    match cli.format {
        OutputFormat::Json => {
            let output = json!({
                "query": {
                    "source": query.source,
                    "relation": query.relation,
                    "target": query.target,
                },
                "results": results,
                "elapsed_ms": elapsed.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for message in renderer.render(&query, &results) {
                println!("{}", message);
            }
            if !cli.quiet {
                println!("Query time: {:.2}s", elapsed.as_secs_f64());
            }
        }
    }
    Ok(())
}

async fn cmd_repl(cli: &Cli, search: &SearchArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let renderer = search.renderer(&config)?;
    let session = build_session(cli, &config).await?;

    let result = repl::run(&session, renderer.as_ref(), &search.options(), cli.quiet).await;
    save_cache(&session, &config);
    result
}

async fn cmd_relations(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(path) = cli.graph.as_deref() {
        let graph = StaticGraph::from_json_file(path)?;
        let types = graph.relation_types();
        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&types)?),
            OutputFormat::Text => {
                for relation in types {
                    println!("{}", relation);
                }
            }
        }
        return Ok(());
    }

    let fetcher = connect_remote(&config).await?;
    let entries = fetcher.registry().entries();
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for info in entries {
                match &info.alias {
                    Some(alias) => println!("{:>4}  {:<24} {}", info.id, info.name.as_str(), alias),
                    None => println!("{:>4}  {}", info.id, info.name),
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
