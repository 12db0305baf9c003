//! URL to SURT derivation and match-type expansion.
//!
//! The SURT (Sort-friendly URI Reordering Transform) of a URL reverses the
//! host labels so lexicographic order follows the host hierarchy:
//!
//! ```text
//! http://www.example.com/path  ->  com,example,www)/path
//! ```
//!
//! The rule here is deliberately simple and deterministic: lowercase, strip
//! the scheme and userinfo, drop default ports, reverse the host labels and
//! join with commas, close the host with `)`, then append the path and
//! query verbatim. Upstream indexers own canonicalization proper; this only
//! has to produce keys comparable with theirs for the common cases.

use anyhow::{bail, Result};

/// How a query key widens during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// The full SURT including path; one key.
    Exact,
    /// Every key starting with the full SURT.
    Prefix,
    /// Every capture of the host: the SURT truncated to its host portion.
    Host,
    /// The registered domain and all subdomains: the host portion truncated
    /// to its first two labels.
    Domain,
}

impl std::str::FromStr for MatchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(MatchType::Exact),
            "prefix" => Ok(MatchType::Prefix),
            "host" => Ok(MatchType::Host),
            "domain" => Ok(MatchType::Domain),
            other => bail!("unknown match type {other:?} (expected exact, prefix, host or domain)"),
        }
    }
}

/// Derives a SURT key from a URL.
pub fn surt_from_url(url: &str) -> Result<String> {
    let url = url.trim().to_ascii_lowercase();
    let rest = url.split_once("://").map_or(url.as_str(), |(_, r)| r);

    let (authority, path_and_query) = match rest.find(['/', '?']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    // Userinfo is not part of the sort key.
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => (h, Some(p)),
        _ => (authority, None),
    };
    if host.is_empty() {
        bail!("cannot derive SURT from {url:?}: no host");
    }

    let mut key: String = host
        .split('.')
        .filter(|label| !label.is_empty())
        .rev()
        .collect::<Vec<_>>()
        .join(",");
    if let Some(port) = port {
        if port != "80" && port != "443" {
            key.push(':');
            key.push_str(port);
        }
    }
    key.push(')');

    // Drop the fragment; keep path and query.
    let path_and_query = path_and_query
        .split_once('#')
        .map_or(path_and_query, |(p, _)| p);
    if path_and_query.starts_with('?') {
        key.push('/');
    }
    key.push_str(path_and_query);
    Ok(key)
}

/// Maps a SURT key and match type to the effective `(search_key, prefix)`
/// pair fed to the binary search.
///
/// Host and domain keys stop *before* the `)` closing the host, so the
/// prefix scan naturally covers the host's paths (`com,example)/...`) and
/// its subdomains (`com,example,www)/...`) alike.
#[must_use]
pub fn expand_match_type(key: &str, match_type: MatchType) -> (String, bool) {
    match match_type {
        MatchType::Exact => (key.to_string(), false),
        MatchType::Prefix => (key.to_string(), true),
        MatchType::Host => (host_portion(key).to_string(), true),
        MatchType::Domain => {
            let host = host_portion(key);
            let mut labels = host.splitn(3, ',');
            let key = match (labels.next(), labels.next()) {
                (Some(tld), Some(sld)) => format!("{tld},{sld}"),
                _ => host.to_string(),
            };
            (key, true)
        }
    }
}

/// The host portion of a SURT key: everything before the `)`.
fn host_portion(key: &str) -> &str {
    match key.find(')') {
        Some(idx) => &key[..idx],
        None => key,
    }
}
