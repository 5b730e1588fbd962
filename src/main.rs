//! Token Guard - multi-source token risk aggregator
//!
//! Fetches contract, social, market and verification signals for a list of
//! tokens, scores them and filters the results against a persistent
//! denylist and user thresholds.
//!
//! Exit codes: 0 success (rejections included), 2 configuration error,
//! 3 total source outage (the report is still printed and exported),
//! 1 anything else.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use token_guard::core::DenylistStore;
use token_guard::utils::constants::APP_VERSION;
use token_guard::utils::export::{default_export_path, export, render_report, ExportFormat, ReportStyle};
use token_guard::{AppConfig, AppError, AppResult, ErrorCode, FilterCriteria, RiskEngine, RiskLevel, Token};

#[derive(Parser, Debug)]
#[command(name = "token_guard", version = APP_VERSION, about = "Multi-source token risk aggregator")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse, score and filter tokens
    Analyze(AnalyzeArgs),
    /// Manage the denylist
    #[command(subcommand)]
    Denylist(DenylistCommand),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Token addresses (space or comma separated)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    tokens: Vec<String>,

    /// JSON file with an array of addresses or token objects
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long)]
    min_volume: Option<f64>,

    /// Maximum token age in hours
    #[arg(long)]
    max_age: Option<f64>,

    /// Least safe level still accepted (LOW, MEDIUM, HIGH, CRITICAL)
    #[arg(long, value_parser = parse_risk_level)]
    min_risk_level: Option<RiskLevel>,

    /// Volume legitimacy score (0-1) a token with market data must reach
    #[arg(long)]
    min_volume_legitimacy: Option<f64>,

    #[arg(long, value_enum)]
    export: Option<ExportFormat>,

    /// Export destination; defaults to token_guard_<run>.<ext>
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ReportStyle::Summary)]
    report: ReportStyle,
}

#[derive(Subcommand, Debug)]
enum DenylistCommand {
    AddToken { address: String },
    AddDeveloper { address: String },
    RemoveToken { address: String },
    RemoveDeveloper { address: String },
    List,
}

/// Entries of an `--input` file
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenInput {
    Address(String),
    Token(Token),
}

fn parse_risk_level(s: &str) -> Result<RiskLevel, String> {
    s.parse::<RiskLevel>().map_err(|e| e.message)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("❌ {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &AppError) -> i32 {
    if err.is_config_error() {
        2
    } else if err.code == ErrorCode::AllSourcesUnavailable {
        3
    } else {
        1
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Analyze(args) => analyze(config, args).await,
        Command::Denylist(cmd) => denylist(&config, cmd),
    }
}

async fn analyze(config: AppConfig, args: AnalyzeArgs) -> AppResult<()> {
    let mut tokens: Vec<Token> = args.tokens.iter().map(|a| Token::new(a.trim())).collect();
    if let Some(path) = &args.input {
        tokens.extend(read_tokens(path)?);
    }
    tokens.retain(|t| !t.address.trim().is_empty());
    if tokens.is_empty() {
        return Err(AppError::missing_input("No tokens given; use --tokens or --input"));
    }

    let criteria = FilterCriteria {
        min_risk_level: args.min_risk_level.unwrap_or(config.filter.min_risk_level),
        min_volume: args.min_volume.unwrap_or(config.filter.min_volume),
        max_age_hours: args.max_age.or(config.filter.max_age_hours),
        min_volume_legitimacy: args.min_volume_legitimacy.unwrap_or(config.filter.min_volume_legitimacy),
    };
    if !(0.0..=1.0).contains(&criteria.min_volume_legitimacy) {
        return Err(AppError::invalid_config("--min-volume-legitimacy must be within [0, 1]"));
    }

    let engine = RiskEngine::from_config(config)?;
    let report = engine.run(tokens, &criteria).await?;

    println!("{}", render_report(&report, args.report, Some(&engine.stats())));

    let format = args.export.or_else(|| args.output.as_deref().map(format_from_extension));
    if let Some(format) = format {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| default_export_path(&report, format));
        export(&report, format, &path)?;
        println!("💾 Results written to {}", path.display());
    }

    if report.summary.total_outage {
        return Err(AppError::all_sources_unavailable(report.summary.total));
    }
    Ok(())
}

fn format_from_extension(path: &Path) -> ExportFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
        _ => ExportFormat::Csv,
    }
}

fn read_tokens(path: &Path) -> AppResult<Vec<Token>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::with_source(
            ErrorCode::MissingInput,
            format!("Cannot read input '{}'", path.display()),
            e,
        )
    })?;
    let entries: Vec<TokenInput> = serde_json::from_str(&raw).map_err(|e| {
        AppError::with_source(
            ErrorCode::MissingInput,
            format!("Input '{}' is not a JSON array of tokens", path.display()),
            e,
        )
    })?;
    info!("📥 Loaded {} tokens from {}", entries.len(), path.display());

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            TokenInput::Address(address) => Token::new(address.trim()),
            TokenInput::Token(token) => token,
        })
        .collect())
}

fn denylist(config: &AppConfig, cmd: DenylistCommand) -> AppResult<()> {
    let store = DenylistStore::load(config.denylist_path.clone())?;

    let (changed, verb, address) = match &cmd {
        DenylistCommand::AddToken { address } => (store.add_token(address)?, "Added token", address),
        DenylistCommand::AddDeveloper { address } => (store.add_developer(address)?, "Added developer", address),
        DenylistCommand::RemoveToken { address } => (store.remove_token(address)?, "Removed token", address),
        DenylistCommand::RemoveDeveloper { address } => {
            (store.remove_developer(address)?, "Removed developer", address)
        }
        DenylistCommand::List => {
            let snapshot = store.snapshot();
            println!("🚫 Denylist ({})", config.denylist_path.display());
            println!("Tokens ({}):", snapshot.tokens.len());
            for token in &snapshot.tokens {
                println!("  {}", token);
            }
            println!("Developers ({}):", snapshot.developers.len());
            for dev in &snapshot.developers {
                println!("  {}", dev);
            }
            return Ok(());
        }
    };

    if changed {
        println!("✅ {} {}", verb, address.trim().to_lowercase());
    } else {
        println!("ℹ️ No change for {}", address.trim().to_lowercase());
    }
    Ok(())
}
