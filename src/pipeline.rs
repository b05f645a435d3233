//! Sequential orchestration: load, flatten, resolve, normalize, aggregate.

use std::collections::HashSet;
use tracing::info;

use crate::aggregate::Summary;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::flatten::flatten;
use crate::loader::{DocumentLoader, Source};
use crate::logger::RunLogger;
use crate::normalize::normalize_rows;
use crate::notice::NoticeDocument;
use crate::resolver::{HickoryResolver, NameResolver, ResolutionCache, ResolutionStats};
use crate::row::Row;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rows: Vec<Row>,
    pub summary: Summary,
    pub stats: ResolutionStats,
}

/// Run the whole pipeline against a source using the system resolver
pub async fn run(config: &PipelineConfig, source: &Source, logger: &RunLogger) -> Result<PipelineOutput, PipelineError> {
    logger.log_run_start(&source.to_string());

    let loader = DocumentLoader::new(&config.http)?;
    let doc = loader.load(source).await?;

    let resolver = HickoryResolver::from_config(&config.resolver);
    run_with_resolver(config, &doc, &source.to_string(), resolver, logger).await
}

/// Everything after loading, with the resolver supplied by the caller
pub async fn run_with_resolver<R: NameResolver>(
    config: &PipelineConfig,
    doc: &NoticeDocument,
    source_name: &str,
    resolver: R,
    logger: &RunLogger,
) -> Result<PipelineOutput, PipelineError> {
    logger.log_document_loaded(doc.notices.len(), doc.url_count());

    let mut rows = flatten(doc);
    if rows.is_empty() {
        return Err(PipelineError::EmptyResultSet {
            source_name: source_name.to_string(),
        });
    }
    logger.log_flattened(rows.len());
    logger.debug(&format!(
        "Lookup budget: {} workers, {} ms per lookup",
        config.resolver.workers, config.resolver.timeout_ms
    ));

    let distinct = rows
        .iter()
        .map(|r| r.domain.to_lowercase())
        .filter(|d| !d.is_empty())
        .collect::<HashSet<_>>()
        .len();
    logger.log_resolution_start(distinct, config.resolver.workers);

    let cache = ResolutionCache::from_config(resolver, &config.resolver);
    logger.start_progress(distinct as u64).await;
    let stats = cache
        .resolve_rows_with_progress(
            &mut rows,
            Some(|current: usize, total: usize, domain: &str| logger.tick_progress(current, total, domain)),
        )
        .await;
    logger.finish_progress("Domain resolution complete").await;
    logger.log_resolution_complete(&stats);

    normalize_rows(&mut rows);
    let summary = Summary::from_rows(&rows, &config.aggregate);
    info!(
        "Pipeline finished for {}: {} rows, {} distinct domains",
        source_name, summary.total_rows, summary.distinct_domains
    );
    logger.record_end();

    Ok(PipelineOutput { rows, summary, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::logger::VerbosityLevel;
    use std::net::{IpAddr, Ipv4Addr};

    struct FixedResolver;

    impl NameResolver for FixedResolver {
        async fn resolve(&self, domain: &str) -> Result<IpAddr, ResolutionError> {
            if domain.ends_with(".invalid") {
                Err(ResolutionError::failure(domain, "NXDOMAIN"))
            } else {
                Ok(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
            }
        }
    }

    fn quiet() -> RunLogger {
        RunLogger::new(VerbosityLevel::Silent).with_progress(false)
    }

    #[tokio::test]
    async fn test_run_enriches_every_row() {
        let doc = NoticeDocument::from_json_str(
            r#"{"notices":[{"id":7,"principal_name":"Acme Media, Inc.","date_sent":"2021-03-04T10:00:00Z",
                "works":[{"description":"Song","infringing_urls":[
                    {"url":"http://www.a.example.com/1"},{"url":"http://gone.invalid/2"}]}]}]}"#,
        )
        .unwrap();

        let output = run_with_resolver(&PipelineConfig::default(), &doc, "inline", FixedResolver, &quiet())
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0].ip_address(), Some("192.0.2.1"));
        assert_eq!(output.rows[1].ip_address(), Some("N/A"));
        assert!(output.rows.iter().all(|r| r.principal_clean() == Some("Acme Media")));
        assert_eq!(output.rows[0].root_domain(), Some("example.com"));
        assert_eq!(output.summary.unresolved_rows, 1);
        assert_eq!(output.stats.failed, 1);
    }

    #[tokio::test]
    async fn test_empty_document_is_empty_result() {
        let doc = NoticeDocument::from_json_str(r#"{"notices":[{"id":1,"works":[]}]}"#).unwrap();
        let err = run_with_resolver(&PipelineConfig::default(), &doc, "empty.json", FixedResolver, &quiet())
            .await
            .unwrap_err();
        assert!(err.is_empty_result());
        assert!(err.to_string().contains("empty.json"));
    }
}
