//! Primary/fallback source escalation.
//!
//! Primaries always run. Their combined distinct yield decides which
//! fallbacks run: a fallback joins only when that yield is below its own
//! threshold. Both batches run their connectors concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, instrument};

use nodecatalog_shared::{CatalogError, EscalationRule, Result, SourceOutcome, SourceRole};
use nodecatalog_sources::{Connector, ConnectorRegistry, Transport, collect_best_effort};

use crate::reconciler::canonicalize;

/// What the escalation step produced.
#[derive(Debug, Clone)]
pub struct EscalationReport {
    /// Outcomes of every source that ran, primaries first.
    pub outcomes: Vec<SourceOutcome>,
    /// Distinct identifiers across the primaries.
    pub primary_yield: usize,
    /// Fallback sources that were triggered.
    pub escalated: Vec<String>,
}

/// Ordered escalation rules, validated against a [`ConnectorRegistry`].
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    rules: Vec<EscalationRule>,
}

impl EscalationPolicy {
    pub fn new(rules: Vec<EscalationRule>) -> Self {
        Self { rules }
    }

    /// Reject rules naming a source the registry does not know, or naming one twice.
    pub fn validate(&self, registry: &ConnectorRegistry) -> Result<()> {
        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            if registry.get(&rule.source).is_none() {
                return Err(CatalogError::config(format!(
                    "escalation rule names unknown source '{}' (known: {})",
                    rule.source,
                    registry.names().join(", ")
                )));
            }
            if !seen.insert(rule.source.as_str()) {
                return Err(CatalogError::config(format!(
                    "source '{}' appears in more than one escalation rule",
                    rule.source
                )));
            }
        }
        Ok(())
    }

    pub fn primaries(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.role == SourceRole::Primary)
            .map(|r| r.source.as_str())
            .collect()
    }

    /// Fallbacks whose threshold exceeds `primary_yield`, in rule order.
    pub fn fallbacks_for(&self, primary_yield: usize) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.role == SourceRole::Fallback && primary_yield < r.threshold)
            .map(|r| r.source.as_str())
            .collect()
    }

    /// Run primaries, then whichever fallbacks their yield triggers.
    ///
    /// Source failures never surface here; only a rule naming an unregistered
    /// source is an error, and that is detected before any request is made.
    #[instrument(skip_all, fields(rules = self.rules.len()))]
    pub async fn run(&self, registry: &ConnectorRegistry, transport: &Transport) -> Result<EscalationReport> {
        self.validate(registry)?;

        let primaries = resolve(registry, &self.primaries())?;
        let mut outcomes = run_batch(&primaries, transport).await;

        let primary_yield = canonicalize(outcomes.iter().flat_map(|o| o.items()).map(Some)).len();
        let escalated: Vec<String> = self
            .fallbacks_for(primary_yield)
            .into_iter()
            .map(String::from)
            .collect();

        if escalated.is_empty() {
            info!(primary_yield, "primary yield sufficient, no fallbacks");
        } else {
            info!(primary_yield, fallbacks = ?escalated, "escalating to fallback sources");
            let names: Vec<&str> = escalated.iter().map(String::as_str).collect();
            let fallbacks = resolve(registry, &names)?;
            outcomes.extend(run_batch(&fallbacks, transport).await);
        }

        Ok(EscalationReport {
            outcomes,
            primary_yield,
            escalated,
        })
    }
}

fn resolve(registry: &ConnectorRegistry, names: &[&str]) -> Result<Vec<Arc<dyn Connector>>> {
    names
        .iter()
        .map(|name| {
            registry
                .get(name)
                .ok_or_else(|| CatalogError::config(format!("unknown source '{name}'")))
        })
        .collect()
}

async fn run_batch(connectors: &[Arc<dyn Connector>], transport: &Transport) -> Vec<SourceOutcome> {
    join_all(
        connectors
            .iter()
            .map(|c| collect_best_effort(c.as_ref(), transport)),
    )
    .await
}
