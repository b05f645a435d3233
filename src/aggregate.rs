//! Ranked summary tables over enriched rows. Read-only over its input.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use crate::config::AggregateConfig;
use crate::normalize::{root_domain, tidy_principal};
use crate::resolver::RESOLUTION_SENTINEL;
use crate::row::Row;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyVolume {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_rows: usize,
    pub distinct_notices: usize,
    pub distinct_domains: usize,
    pub unresolved_rows: usize,
    pub top_principals: Vec<RankedEntry>,
    pub top_domains: Vec<RankedEntry>,
    pub top_root_domains: Vec<RankedEntry>,
    pub top_recipients: Vec<RankedEntry>,
    /// Distinct root domains per address, sentinel excluded
    pub ip_root_domain_counts: Vec<RankedEntry>,
    pub monthly_volume: Vec<MonthlyVolume>,
    /// Rows whose `date_sent` could not be parsed; not in any month
    pub undated_rows: usize,
}

/// Count keys and rank by count descending; ties keep first-occurrence order
pub fn top_n<K, I>(keys: I, n: usize) -> Vec<(K, usize)>
where
    I: IntoIterator<Item = K>,
    K: Eq + Hash + Clone,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();

    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

impl Summary {
    pub fn from_rows(rows: &[Row], config: &AggregateConfig) -> Self {
        let distinct_notices = rows
            .iter()
            .filter(|r| !r.notice_id.is_empty())
            .map(|r| r.notice_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let distinct_domains = rows
            .iter()
            .filter(|r| !r.domain.is_empty())
            .map(|r| r.domain.as_str())
            .collect::<HashSet<_>>()
            .len();
        let unresolved_rows = rows
            .iter()
            .filter(|r| r.ip_address().map_or(true, |ip| ip == RESOLUTION_SENTINEL))
            .count();

        let (monthly_volume, undated_rows) = monthly_volume(rows, config.recent_months);

        Self {
            total_rows: rows.len(),
            distinct_notices,
            distinct_domains,
            unresolved_rows,
            top_principals: ranked(rows.iter().map(principal_key), config.top_principals),
            top_domains: ranked(
                rows.iter().filter(|r| !r.domain.is_empty()).map(|r| r.domain.clone()),
                config.top_domains,
            ),
            top_root_domains: ranked(rows.iter().map(root_key), config.top_domains),
            top_recipients: ranked(
                rows.iter().filter(|r| !r.recipient.is_empty()).map(|r| r.recipient.clone()),
                config.top_recipients,
            ),
            ip_root_domain_counts: ip_root_domain_counts(rows, config.top_ip_groups),
            monthly_volume,
            undated_rows,
        }
    }
}

fn ranked<I: IntoIterator<Item = String>>(keys: I, n: usize) -> Vec<RankedEntry> {
    top_n(keys, n)
        .into_iter()
        .map(|(key, count)| RankedEntry { key, count })
        .collect()
}

fn principal_key(row: &Row) -> String {
    row.principal_clean()
        .map(str::to_string)
        .unwrap_or_else(|| tidy_principal(Some(&row.principal)))
}

fn root_key(row: &Row) -> String {
    row.root_domain()
        .map(str::to_string)
        .unwrap_or_else(|| root_domain(Some(&row.domain)))
}

/// For each resolved address, how many distinct root domains point at it
pub fn ip_root_domain_counts(rows: &[Row], n: usize) -> Vec<RankedEntry> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, HashSet<String>> = HashMap::new();

    for row in rows {
        let Some(ip) = row.ip_address() else { continue };
        if ip == RESOLUTION_SENTINEL || ip.is_empty() {
            continue;
        }
        let roots = groups.entry(ip).or_insert_with(|| {
            order.push(ip);
            HashSet::new()
        });
        roots.insert(root_key(row));
    }

    let mut counts: Vec<RankedEntry> = order
        .into_iter()
        .map(|ip| RankedEntry {
            key: ip.to_string(),
            count: groups.get(ip).map_or(0, HashSet::len),
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

/// Rows per calendar month (UTC), the most recent `months` buckets in
/// chronological order, plus the number of rows with no usable date
pub fn monthly_volume(rows: &[Row], months: usize) -> (Vec<MonthlyVolume>, usize) {
    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    let mut undated = 0;

    for row in rows {
        match parse_date_sent(&row.date_sent) {
            Some(ts) => *buckets.entry((ts.year(), ts.month())).or_insert(0) += 1,
            None => undated += 1,
        }
    }

    let skip = buckets.len().saturating_sub(months);
    let volume = buckets
        .into_iter()
        .skip(skip)
        .map(|((year, month), count)| MonthlyVolume {
            month: format!("{:04}-{:02}", year, month),
            count,
        })
        .collect();

    (volume, undated)
}

/// Parse a notice timestamp; offsets are honoured, naive values are taken as UTC
pub fn parse_date_sent(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
