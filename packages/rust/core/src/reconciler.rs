//! Cross-source deduplication and ordering.
//!
//! The catalogue is a set: identifiers are compared by exact string equality
//! (no case folding) and emitted in byte-wise ascending order, so the result
//! does not depend on which source answered first.

use std::collections::BTreeSet;

use nodecatalog_shared::SourceOutcome;

/// Reconciled identifiers of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    /// Distinct authoritative identifiers.
    pub core_count: usize,
    /// Distinct candidate identifiers across all third-party sources.
    pub community: Vec<String>,
    /// Every distinct identifier, sorted.
    pub nodes: Vec<String>,
}

/// Deduplicate and sort, dropping absent and empty entries.
pub fn canonicalize<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .flatten()
        .filter(|s| !s.as_ref().is_empty())
        .map(|s| s.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Merge the authoritative identifiers with every candidate sequence.
pub fn merge(authoritative: &[String], candidate_sources: &[Vec<String>]) -> Vec<String> {
    canonicalize(
        authoritative
            .iter()
            .chain(candidate_sources.iter().flatten())
            .map(Some),
    )
}

/// Build the catalogue from the authoritative listing and all source outcomes.
///
/// Degraded outcomes contribute nothing.
pub fn reconcile(authoritative: &[String], outcomes: &[SourceOutcome]) -> Catalogue {
    let candidates: Vec<Vec<String>> = outcomes.iter().map(|o| o.items().to_vec()).collect();

    Catalogue {
        core_count: canonicalize(authoritative.iter().map(Some)).len(),
        community: merge(&[], &candidates),
        nodes: merge(authoritative, &candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merge_is_order_independent() {
        let a = strings(&["b", "a"]);
        let b = strings(&["a", "c"]);

        let forward = merge(&[], &[a.clone(), b.clone()]);
        let backward = merge(&[], &[b, a]);

        assert_eq!(forward, strings(&["a", "b", "c"]));
        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_permutations_with_authoritative_agree() {
        let core = strings(&["Slack", "Airtable"]);
        let sources = [
            strings(&["n8n-nodes-z", "Slack"]),
            strings(&["@acme/n8n-nodes-a"]),
            strings(&["n8n-nodes-z", "n8n-nodes-b"]),
        ];
        let expected = merge(&core, &sources);

        for order in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            let permuted: Vec<Vec<String>> = order.iter().map(|&i| sources[i].clone()).collect();
            assert_eq!(merge(&core, &permuted), expected);
        }
        assert_eq!(
            expected,
            strings(&["@acme/n8n-nodes-a", "Airtable", "Slack", "n8n-nodes-b", "n8n-nodes-z"])
        );
    }

    #[test]
    fn duplicates_and_absent_entries_dropped() {
        let items = vec![Some("x"), Some(""), None, Some("x"), Some("y")];
        assert_eq!(canonicalize(items), strings(&["x", "y"]));

        let merged = merge(&[], &[strings(&["x", "", "x"]), strings(&["y"])]);
        assert_eq!(merged, strings(&["x", "y"]));
    }

    #[test]
    fn no_case_folding_and_ordinal_sort() {
        let merged = merge(&strings(&["a", "B"]), &[strings(&["A", "b"])]);
        assert_eq!(merged, strings(&["A", "B", "a", "b"]));
    }

    #[test]
    fn reconcile_ignores_degraded_sources() {
        let core = strings(&["Slack", "Slack", "Cron"]);
        let outcomes = vec![
            SourceOutcome::collected("awesome-readme", strings(&["n8n-nodes-a", "n8n-nodes-b"])),
            SourceOutcome::degraded("npm-search", "HTTP 500"),
            SourceOutcome::collected("github-topics", strings(&["n8n-nodes-b", "Slack"])),
        ];

        let catalogue = reconcile(&core, &outcomes);
        assert_eq!(catalogue.core_count, 2);
        assert_eq!(catalogue.community, strings(&["Slack", "n8n-nodes-a", "n8n-nodes-b"]));
        assert_eq!(catalogue.nodes, strings(&["Cron", "Slack", "n8n-nodes-a", "n8n-nodes-b"]));
    }
}
