//! Registry of named payload transforms.
//!
//! A transform receives the SURT, the timestamp and a mutable reference to
//! the parsed payload, and may insert, rewrite or remove fields. Transforms
//! are compiled in and selected by name — the typed replacement for the
//! original system's runtime-loaded hook file.

use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Signature of a payload transform.
pub type TransformFn = fn(&str, &str, &mut Map<String, Value>) -> Result<()>;

/// A named transform entry.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub name: &'static str,
    pub description: &'static str,
    pub func: TransformFn,
}

/// All registered transforms. Add new entries here.
pub const REGISTRY: &[Transform] = &[
    Transform {
        name: "capture-year",
        description: "add a \"year\" field derived from the capture timestamp",
        func: capture_year,
    },
    Transform {
        name: "host",
        description: "add a \"host\" field derived from the url field",
        func: host_from_url,
    },
];

/// Looks up a transform by name.
pub fn lookup(name: &str) -> Result<Transform> {
    match REGISTRY.iter().find(|t| t.name == name) {
        Some(t) => Ok(*t),
        None => {
            let known: Vec<&str> = REGISTRY.iter().map(|t| t.name).collect();
            bail!("unknown transform {name:?} (available: {})", known.join(", "));
        }
    }
}

fn capture_year(_surt: &str, timestamp: &str, json: &mut Map<String, Value>) -> Result<()> {
    if let Some(year) = timestamp.get(..4) {
        json.insert("year".to_string(), Value::String(year.to_string()));
    }
    Ok(())
}

fn host_from_url(_surt: &str, _timestamp: &str, json: &mut Map<String, Value>) -> Result<()> {
    let Some(Value::String(url)) = json.get("url") else {
        return Ok(());
    };
    let rest = url.split_once("://").map_or(url.as_str(), |(_, r)| r);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split('@')
        .next_back()
        .unwrap_or("");
    if !host.is_empty() {
        let host = host.to_ascii_lowercase();
        json.insert("host".to_string(), Value::String(host));
    }
    Ok(())
}
