use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use noticeflow::articles::scrape_articles;
use noticeflow::cli::{Args, Cli, Commands};
use noticeflow::config::{self, PipelineConfig};
use noticeflow::export;
use noticeflow::loader::{DocumentLoader, Source};
use noticeflow::logger::{RunLogger, VerbosityLevel};
use noticeflow::pipeline;

/// Exit code for a run that loaded fine but produced no rows
const EXIT_EMPTY_RESULT: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.tracing_directive())),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if let Some(Commands::Articles { source, output }) = &cli.command {
        let config = load_config(cli.config.as_ref())?;
        return run_articles(&config, source, output.as_ref()).await;
    }

    let args = Args::from(&cli);

    if args.init {
        match PipelineConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run noticeflow again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let mut config = load_config(args.config.as_ref())?;
    args.apply_overrides(&mut config);

    let logger = RunLogger::new(verbosity).with_progress(!args.no_progress && io::stderr().is_terminal());
    let source = Source::parse(args.source.as_deref().unwrap_or_default());

    let output = match pipeline::run(&config, &source, &logger).await {
        Ok(output) => output,
        Err(e) if e.is_empty_result() => {
            logger.error(&e.to_string());
            std::process::exit(EXIT_EMPTY_RESULT);
        }
        Err(e) => {
            logger.error(&e.to_string());
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.output {
        export::export_rows_csv(&output.rows, path)
            .with_context(|| format!("failed to write rows to {}", path.display()))?;
        logger.log_export_success(&path.display().to_string());
    }

    let rendered = match args.summary_format.as_str() {
        "json" => export::summary_json(&source.to_string(), &output.summary, &output.stats)?,
        _ => export::summary_text(&output.summary),
    };

    match &args.summary_output {
        Some(path) => export::export_summary(path, &rendered)
            .with_context(|| format!("failed to write summary to {}", path.display()))?,
        None if args.summary_format == "json" => println!("{}", rendered),
        None => export::print_summary(&output.summary),
    }

    logger.print_final_summary();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::load_from_path(p)
            .with_context(|| format!("failed to load config {}", p.display()))?,
        None => PipelineConfig::load()
            .with_context(|| format!("failed to load config {}", config::CONFIG_PATH))?,
    };
    Ok(config)
}

async fn run_articles(config: &PipelineConfig, source: &str, output: Option<&PathBuf>) -> Result<()> {
    let loader = DocumentLoader::new(&config.http)?;
    let source = Source::parse(source);
    let articles = scrape_articles(&loader, &source).await?;

    match output {
        Some(path) => export::export_articles_csv(&articles, path)
            .with_context(|| format!("failed to write articles to {}", path.display()))?,
        None => export::write_articles_csv(&articles, io::stdout().lock())?,
    }

    eprintln!("Extracted {} articles from {}", articles.len(), source);
    Ok(())
}
