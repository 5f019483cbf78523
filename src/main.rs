use fathom::budget::ComplexityTier;
use fathom::cli::{Cli, Commands, ConfigAction};
use fathom::config::Config;
use fathom::error::{FathomError, Result};
use fathom::lane::LaneSet;
use fathom::orchestrator::{Orchestrator, RetrievalRequest};
use fathom::{provider, server};
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            port,
            profile,
        } => {
            cmd_serve(cli.config, bind, port, profile).await?;
        }
        Commands::Lanes => {
            cmd_lanes(cli.config)?;
        }
        Commands::Query {
            query,
            complexity,
            json,
        } => {
            cmd_query(cli.config, &query, &complexity, json).await?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "fathom=debug" } else { "fathom=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_serve(
    config_path: Option<std::path::PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
    profile: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;

    if let Some(bind) = bind {
        config.server.bind_addr = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let client = http_client()?;
    let orchestrator = Orchestrator::from_config(&config, client)?;

    server::serve(&config, orchestrator).await
}

fn cmd_lanes(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config(config_path, None)?;
    let client = http_client()?;
    let lane_set = LaneSet::from_config(&config, client);

    println!("Lanes");
    println!("=====");
    for lane in lane_set.lanes() {
        println!(
            "  {:<16} {:?}{}{}",
            lane.kind.as_str(),
            lane_set.availability(lane.kind),
            format!(" ({} provider(s))", lane.chain.len()),
            if lane.required { " [required]" } else { "" }
        );
    }

    println!("\nBudgets (ms, full budget remaining)");
    println!("===================================");
    let allocator = fathom::budget::BudgetAllocator::new(config.retrieval.provider_timeout_ms);
    for tier in ComplexityTier::ALL {
        let allocation = allocator.allocate(tier, 1.0);
        println!("  {:<12} overall {}", tier, allocation.overall_budget_ms);
        let mut per_lane: Vec<_> = allocation.per_lane_budget_ms.iter().collect();
        per_lane.sort_by_key(|(kind, _)| **kind);
        for (kind, ms) in per_lane {
            println!("    {:<16} {}", kind.as_str(), ms);
        }
    }

    Ok(())
}

async fn cmd_query(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    complexity: &str,
    json: bool,
) -> Result<()> {
    let tier = ComplexityTier::from_str(complexity)
        .map_err(|_| FathomError::Config(format!("unknown complexity tier: {}", complexity)))?;

    let config = load_config(config_path, None)?;
    let client = http_client()?;
    let orchestrator = Orchestrator::from_config(&config, client)?;

    let request = RetrievalRequest::new(query, tier);
    let result = orchestrator.retrieve(&request).await;

    if json {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| FathomError::Json {
            source: e,
            context: "Failed to serialize retrieval result".to_string(),
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    println!(
        "{} result(s) from {}/{} lanes",
        result.total_results,
        result.fusion_metadata.successful_lanes,
        result.fusion_metadata.total_lanes
    );
    for item in &result.results {
        println!(
            "  {:>2}. [{:.4}] {} ({})",
            item.fused_rank, item.rrf_score, item.title, item.domain
        );
    }

    if !result.citations.is_empty() {
        println!("\nCitations:");
        for citation in &result.citations {
            println!("  - {} <{}>", citation.title, citation.url);
        }
    }

    if !result.disagreements.is_empty() {
        println!("\nDisagreements:");
        for d in &result.disagreements {
            println!("  - {} vs {} on \"{}\"", d.lane_a, d.lane_b, d.topic_key);
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| FathomError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| FathomError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Set provider credentials via environment variables");
            println!("  (BRAVE_API_KEY, NEWSAPI_API_KEY, ALPHAVANTAGE_API_KEY)");
        }
    }

    Ok(())
}

fn load_config(
    config_path: Option<std::path::PathBuf>,
    profile: Option<String>,
) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'fathom config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn http_client() -> Result<reqwest::Client> {
    provider::build_http_client()
        .map_err(|e| FathomError::Config(format!("Failed to build HTTP client: {}", e)))
}
