//! Canonical grouping fields derived from a row.
//!
//! Both functions are pure, total and idempotent:
//! - `tidy_principal`: case and punctuation folding of the rights holder name,
//!   with the trailing corporate `inc` token dropped
//! - `root_domain`: the last two labels of the host, `www`/`www2` prefix removed

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::row::Row;

pub const UNKNOWN_PRINCIPAL: &str = "Unknown";
pub const UNKNOWN_ROOT_DOMAIN: &str = "unknown";

/// Characters removed before tokenizing a principal name
const STRIPPED_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"', '(', ')', '[', ']', '{', '}'];

/// Corporate suffix token removed from principal names
const CORPORATE_SUFFIX: &str = "inc";

static WWW_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^www\d*\.").unwrap());

/// Standardize a principal name: "Acme Media, Inc." -> "Acme Media"
pub fn tidy_principal(principal: Option<&str>) -> String {
    let Some(raw) = principal else {
        return UNKNOWN_PRINCIPAL.to_string();
    };

    let folded: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();

    // " inc" only counts when it follows another token
    let tokens: Vec<&str> = folded
        .split_whitespace()
        .enumerate()
        .filter(|(i, token)| *i == 0 || *token != CORPORATE_SUFFIX)
        .map(|(_, token)| token)
        .collect();

    if tokens.is_empty() {
        return UNKNOWN_PRINCIPAL.to_string();
    }

    title_case(&tokens.join(" "))
}

/// Registrable-looking root of a host: "www2.Example.COM" -> "example.com"
pub fn root_domain(domain: Option<&str>) -> String {
    let lowered = domain
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .to_lowercase();

    let without_www = match WWW_PREFIX.find(&lowered) {
        // Keep a bare "www.tld" intact so the result stays stable on re-application
        Some(m) if lowered[m.end()..].contains('.') => &lowered[m.end()..],
        _ => lowered.as_str(),
    };

    let labels: Vec<&str> = without_www.split('.').filter(|l| !l.is_empty()).collect();
    if labels.is_empty() {
        return UNKNOWN_ROOT_DOMAIN.to_string();
    }

    labels[labels.len().saturating_sub(2)..].join(".")
}

/// Fill `principal_clean` and `root_domain` on every row
pub fn normalize_rows(rows: &mut [Row]) {
    for row in rows.iter_mut() {
        let principal_clean = tidy_principal(Some(&row.principal));
        let root = root_domain(Some(&row.domain));
        if !row.set_normalized(principal_clean, root) {
            debug!("Row for {} was already normalized", row.infringing_url);
        }
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                // Only the first uppercase char: "ﬁ" -> "Fi", not "FI"
                let mut upper = c.to_uppercase();
                out.extend(upper.next());
                out.extend(upper.flat_map(char::to_lowercase));
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
