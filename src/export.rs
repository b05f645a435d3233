use crate::aggregate::{RankedEntry, Summary};
use crate::articles::{Article, ARTICLE_COLUMNS};
use crate::resolver::ResolutionStats;
use crate::row::{Row, ROW_COLUMNS};
use anyhow::Result;
use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Write the row table with its fixed header to any writer
pub fn write_rows_csv<W: Write>(rows: &[Row], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(ROW_COLUMNS)?;
    for row in rows {
        wtr.write_record(row.to_record())?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_rows_csv(rows: &[Row], output_path: &Path) -> Result<()> {
    debug!("Exporting {} rows to CSV: {}", rows.len(), output_path.display());

    let file = File::create(output_path)?;
    write_rows_csv(rows, file)?;

    info!("Successfully exported {} rows to CSV: {}", rows.len(), output_path.display());
    Ok(())
}

pub fn write_articles_csv<W: Write>(articles: &[Article], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(ARTICLE_COLUMNS)?;
    for article in articles {
        wtr.write_record([
            &article.title,
            &article.authors,
            &article.date,
            &article.doi,
            &article.abstract_text,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_articles_csv(articles: &[Article], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    write_articles_csv(articles, file)?;
    info!("Successfully exported {} articles to CSV: {}", articles.len(), output_path.display());
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    source: &'a str,
    generated_at: String,
    resolution: ResolutionReport,
    summary: &'a Summary,
}

#[derive(Serialize)]
struct ResolutionReport {
    distinct_domains: usize,
    lookups_issued: usize,
    resolved: usize,
    failed: usize,
}

impl From<&ResolutionStats> for ResolutionReport {
    fn from(stats: &ResolutionStats) -> Self {
        Self {
            distinct_domains: stats.distinct_domains,
            lookups_issued: stats.lookups_issued,
            resolved: stats.resolved,
            failed: stats.failed,
        }
    }
}

/// Pretty JSON report of the summary tables
pub fn summary_json(source: &str, summary: &Summary, stats: &ResolutionStats) -> Result<String> {
    let report = JsonReport {
        source,
        generated_at: Utc::now().to_rfc3339(),
        resolution: stats.into(),
        summary,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Plain-text rendition of the summary tables
pub fn summary_text(summary: &Summary) -> String {
    let mut out = String::new();

    out.push_str("\n=== Notice Summary ===\n");
    out.push_str(&format!("Rows: {}\n", summary.total_rows));
    out.push_str(&format!("Notices: {}\n", summary.distinct_notices));
    out.push_str(&format!("Distinct domains: {}\n", summary.distinct_domains));
    out.push_str(&format!("Unresolved rows: {}\n", summary.unresolved_rows));

    push_table(&mut out, "Top principals", &summary.top_principals);
    push_table(&mut out, "Top domains", &summary.top_domains);
    push_table(&mut out, "Top root domains", &summary.top_root_domains);
    push_table(&mut out, "Top recipients", &summary.top_recipients);
    push_table(&mut out, "Root domains per address", &summary.ip_root_domain_counts);

    out.push_str("\nMonthly volume:\n");
    if summary.monthly_volume.is_empty() {
        out.push_str("  (no dated notices)\n");
    }
    for bucket in &summary.monthly_volume {
        out.push_str(&format!("  {}  {}\n", bucket.month, bucket.count));
    }
    if summary.undated_rows > 0 {
        out.push_str(&format!("  undated  {}\n", summary.undated_rows));
    }

    out.push_str("======================\n");
    out
}

fn push_table(out: &mut String, heading: &str, entries: &[RankedEntry]) {
    out.push_str(&format!("\n{}:\n", heading));
    if entries.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    let width = entries.iter().map(|e| e.key.chars().count()).max().unwrap_or(0);
    for entry in entries {
        out.push_str(&format!("  {:<width$}  {}\n", entry.key, entry.count, width = width));
    }
}

pub fn print_summary(summary: &Summary) {
    if summary.total_rows == 0 {
        println!("No rows to summarize.");
        return;
    }
    print!("{}", summary_text(summary));
}

pub fn export_summary(output_path: &Path, content: &str) -> Result<()> {
    let mut file = File::create(output_path)?;
    file.write_all(content.as_bytes())?;
    info!("Summary written to {}", output_path.display());
    Ok(())
}
