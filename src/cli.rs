use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "noticeflow")]
#[command(about = "Flatten takedown notices into per-URL rows, resolve their domains and summarize them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/noticeflow.toml
    #[arg(long)]
    pub init: bool,

    /// Notice document to load: a local path or an http(s) URL (shared-drive links work)
    #[arg(short, long, value_name = "PATH|URL")]
    pub source: Option<String>,

    /// Write the enriched rows to this CSV file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Summary format: 'text' (default) or 'json'
    #[arg(long, default_value = "text")]
    pub summary_format: String,

    /// Write the summary to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub summary_output: Option<PathBuf>,

    /// Concurrent domain lookups (overrides config)
    #[arg(short = 'j', long, value_name = "N")]
    pub parallel_jobs: Option<usize>,

    /// Per-lookup timeout in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Configuration file (defaults to ./config/noticeflow.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for details, -vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable the resolution progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract article metadata from a journal table-of-contents page
    Articles {
        /// HTML page: a local path or an http(s) URL
        #[arg(short, long, value_name = "PATH|URL")]
        source: String,

        /// Write the articles to this CSV file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Flattened view of the pipeline invocation
#[derive(Debug)]
pub struct Args {
    pub init: bool,
    pub source: Option<String>,
    pub output: Option<PathBuf>,
    pub summary_format: String,
    pub summary_output: Option<PathBuf>,
    pub parallel_jobs: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub no_progress: bool,
}

impl From<&Cli> for Args {
    fn from(cli: &Cli) -> Self {
        Args {
            init: cli.init,
            source: cli.source.clone(),
            output: cli.output.clone(),
            summary_format: cli.summary_format.clone(),
            summary_output: cli.summary_output.clone(),
            parallel_jobs: cli.parallel_jobs,
            timeout_ms: cli.timeout_ms,
            config: cli.config.clone(),
            verbose: cli.verbose,
            no_progress: cli.no_progress,
        }
    }
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if !self.init {
            match &self.source {
                None => return Err("Source is required (use --source <PATH|URL>)".to_string()),
                Some(s) if s.trim().is_empty() => return Err("Source cannot be empty".to_string()),
                _ => {}
            }
        }

        if !["text", "json"].contains(&self.summary_format.as_str()) {
            return Err("Summary format must be 'text' or 'json'".to_string());
        }

        if let Some(jobs) = self.parallel_jobs {
            if jobs == 0 {
                return Err("Parallel jobs must be greater than 0".to_string());
            }
            if jobs > 100 {
                return Err("Parallel jobs cannot exceed 100 to avoid overwhelming DNS servers".to_string());
            }
        }

        Ok(())
    }

    /// Command-line values take precedence over the configuration file
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(jobs) = self.parallel_jobs {
            config.resolver.workers = jobs;
        }
        if let Some(ms) = self.timeout_ms {
            config.resolver.timeout_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let cli = Cli::try_parse_from(args).unwrap();
        Args::from(&cli)
    }

    #[test]
    fn test_source_required_unless_init() {
        assert!(parse(&["noticeflow"]).validate().is_err());
        assert!(parse(&["noticeflow", "--init"]).validate().is_ok());
        assert!(parse(&["noticeflow", "--source", "notices.json"]).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = parse(&["noticeflow", "-s", "n.json", "--summary-format", "xml"]);
        assert!(args.validate().unwrap_err().contains("text"));
        let args = parse(&["noticeflow", "-s", "n.json", "-j", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = parse(&["noticeflow", "-s", "n.json", "-j", "4", "--timeout-ms", "0"]);
        let mut config = PipelineConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.resolver.workers, 4);
        assert_eq!(config.resolver.timeout_ms, 0);
    }

    #[test]
    fn test_articles_subcommand() {
        let cli = Cli::try_parse_from(["noticeflow", "articles", "--source", "toc.html"]).unwrap();
        match cli.command {
            Some(Commands::Articles { source, output }) => {
                assert_eq!(source, "toc.html");
                assert!(output.is_none());
            }
            None => panic!("expected articles subcommand"),
        }
    }
}
