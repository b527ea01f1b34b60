//! Regex extraction over free text and node definition sources.
//!
//! None of the inputs here are contractually structured, so everything is
//! best-effort pattern matching: a miss yields `None` or an empty list.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use nodecatalog_shared::{CatalogError, Result};

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `n8n-nodes-foo`, `n8n_node-bar`, `@scope/n8n-community-baz`, …
static PACKAGE_MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:@[\w-]+/)?n8n[-_](?:nodes?|community)[\w/-]*").expect("package mention regex")
});

/// Start of the `description` object in a node class.
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bdescription\b[^={]*=?\s*\{").expect("description regex")
});

/// `name: 'slack'` (first occurrence inside the description).
static NAME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bname\s*:\s*['"`]([A-Za-z0-9_.-]+)['"`]"#).expect("name field regex")
});

/// `version: [1, 2, 3]`.
static VERSION_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bversion\s*:\s*\[([^\]]*)\]").expect("version list regex")
});

/// `version: 4`.
static VERSION_SCALAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bversion\s*:\s*(\d+)\b").expect("version scalar regex")
});

// ---------------------------------------------------------------------------
// Candidate filter
// ---------------------------------------------------------------------------

/// Decides whether a package name plausibly belongs to the ecosystem.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pattern: Regex,
}

impl CandidateFilter {
    /// Compile a filter from a configured regex.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| CatalogError::config(format!("invalid candidate pattern: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

// ---------------------------------------------------------------------------
// Document extraction
// ---------------------------------------------------------------------------

/// Extract community package names mentioned anywhere in `text`.
///
/// Matches are returned once each, in first-seen order, with their original casing.
pub fn extract_package_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PACKAGE_MENTION_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['/', '-', '_']))
        .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
        .map(String::from)
        .collect()
}

/// Keep first occurrences only, preserving order.
pub fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Node definition parsing
// ---------------------------------------------------------------------------

/// Type name and version pulled out of a node definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    pub name: String,
    pub version: u32,
}

/// Parse the `name` and type version out of a node definition source.
///
/// Returns `None` when either piece is missing.
pub fn parse_node_definition(source: &str) -> Option<NodeDefinition> {
    let name = description_name(source)?;
    let version = node_version(source)?;
    Some(NodeDefinition { name, version })
}

/// The `name` field of the `description` block.
pub fn description_name(source: &str) -> Option<String> {
    let start = DESCRIPTION_RE.find(source)?.end();
    NAME_FIELD_RE
        .captures(&source[start..])
        .map(|caps| caps[1].to_string())
}

/// Highest integer of a `version: [..]` list, else a scalar `version: n`.
pub fn node_version(source: &str) -> Option<u32> {
    let from_list = VERSION_LIST_RE.captures(source).and_then(|caps| {
        caps[1]
            .split(',')
            .filter_map(|item| item.trim().parse::<u32>().ok())
            .max()
    });

    from_list.or_else(|| {
        VERSION_SCALAR_RE
            .captures(source)
            .and_then(|caps| caps[1].parse().ok())
    })
}
