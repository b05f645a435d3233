use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

use crate::resolver::ResolutionStats;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Progress bar and final summary only
    Summary = 1,  // Stage progress (default)
    Detailed = 2, // Per-stage counts, warnings
    Debug = 3,    // Everything, including per-domain failures
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Directive for the tracing `EnvFilter` when RUST_LOG is unset
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "error",
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// User-facing run log: timestamped stderr lines, a resolution progress
/// bar and a closing summary of what the run did
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    show_progress: bool,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    metadata: Arc<Mutex<RunMetadata>>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    source: String,
    notices_loaded: usize,
    rows_flattened: usize,
    resolution: ResolutionStats,
    output_file: String,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_progress: true,
            progress_bar: Arc::new(RwLock::new(None)),
            metadata: Arc::new(Mutex::new(RunMetadata::default())),
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    fn shows(&self, threshold: VerbosityLevel) -> bool {
        self.verbosity >= threshold
    }

    pub fn info(&self, message: &str) {
        if self.shows(VerbosityLevel::Summary) {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.shows(VerbosityLevel::Detailed) {
            self.print_message("WARN", message);
        }
    }

    /// Shown at every verbosity
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.shows(VerbosityLevel::Debug) {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format_line(&Local::now().format("%H:%M:%S%.3f").to_string(), level, message);

        // Print above the bar so it keeps its position
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub async fn start_progress(&self, total_steps: u64) {
        if !self.show_progress || total_steps == 0 {
            return;
        }

        let pb = ProgressBar::new(total_steps);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Resolving domains...");

        *self.progress_bar.write().await = Some(pb);
    }

    /// Synchronous tick, usable from the resolver's progress callback
    pub fn tick_progress(&self, current: usize, total: usize, domain: &str) {
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.set_length(total as u64);
                pb.set_position(current as u64);
                pb.set_message(domain.to_string());
            }
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }
        self.info(final_message);
    }

    pub fn record_start(&self, source: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.start_time = Some(Instant::now());
            metadata.source = source.to_string();
        }
    }

    pub fn record_end(&self) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.end_time = Some(Instant::now());
        }
    }

    pub fn record_output_file(&self, path: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.output_file = path.to_string();
        }
    }

    pub fn log_run_start(&self, source: &str) {
        self.record_start(source);
        self.info(&format!("Loading notices from: {}", source));
    }

    pub fn log_document_loaded(&self, notices: usize, urls: usize) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.notices_loaded = notices;
        }
        self.info(&format!("Loaded {} notices referencing {} infringing URLs", notices, urls));
    }

    pub fn log_flattened(&self, rows: usize) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.rows_flattened = rows;
        }
        self.info(&format!("Flattened into {} rows", rows));
    }

    pub fn log_resolution_start(&self, distinct_domains: usize, workers: usize) {
        self.info(&format!(
            "Resolving {} distinct domains with {} workers",
            distinct_domains, workers
        ));
    }

    pub fn log_resolution_complete(&self, stats: &ResolutionStats) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.resolution = stats.clone();
        }
        self.info(&format!(
            "Resolution finished: {} resolved, {} failed ({} lookups)",
            stats.resolved, stats.failed, stats.lookups_issued
        ));
        if stats.failed > 0 {
            self.warn(&format!("{} domains could not be resolved and were marked N/A", stats.failed));
        }
    }

    pub fn log_export_success(&self, path: &str) {
        self.record_output_file(path);
        self.info(&format!("Export completed: {}", path));
    }

    pub fn print_final_summary(&self) {
        let Ok(metadata) = self.metadata.lock() else { return };

        eprintln!("\n=== RUN SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            eprintln!("Duration: {:.2}s", end.duration_since(start).as_secs_f64());
        }
        eprintln!("Source: {}", metadata.source);
        eprintln!("Notices Loaded: {}", metadata.notices_loaded);
        eprintln!("Rows: {}", metadata.rows_flattened);
        eprintln!("Distinct Domains: {}", metadata.resolution.distinct_domains);
        eprintln!("Lookups Issued: {}", metadata.resolution.lookups_issued);
        eprintln!(
            "Resolved / Failed: {} / {}",
            metadata.resolution.resolved, metadata.resolution.failed
        );
        if !metadata.output_file.is_empty() {
            eprintln!("Rows Exported: {}", metadata.output_file);
        }
        eprintln!("===================\n");
    }
}

fn format_line(timestamp: &str, level: &str, message: &str) -> String {
    format!("[{}] {}: {}", timestamp, level, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(7), VerbosityLevel::Debug);
        assert!(VerbosityLevel::Debug > VerbosityLevel::Silent);
    }

    #[test]
    fn test_line_format() {
        assert_eq!(format_line("12:00:01.250", "INFO", "hi"), "[12:00:01.250] INFO: hi");
    }

    #[test]
    fn test_debug_lines_need_debug_verbosity() {
        assert!(!RunLogger::new(VerbosityLevel::Detailed).shows(VerbosityLevel::Debug));
        assert!(RunLogger::new(VerbosityLevel::Debug).shows(VerbosityLevel::Debug));
        assert!(RunLogger::new(VerbosityLevel::Summary).shows(VerbosityLevel::Summary));
        assert!(!RunLogger::new(VerbosityLevel::Silent).shows(VerbosityLevel::Summary));
    }

    #[tokio::test]
    async fn test_progress_disabled_is_noop() {
        let logger = RunLogger::new(VerbosityLevel::Silent).with_progress(false);
        logger.start_progress(10).await;
        assert!(logger.progress_bar.read().await.is_none());
        logger.tick_progress(1, 10, "example.com");
        logger.finish_progress("done").await;
    }
}
