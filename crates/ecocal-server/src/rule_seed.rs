use anyhow::{Context, Result};
use ecocal_common::types::{Impact, LeadTime};
use ecocal_storage::Store;
use serde::{Deserialize, Serialize};

/// `init-rules` input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<SeedCategoryRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCategoryRule {
    pub impact: Impact,
    /// Fractional hours, e.g. `0.5` for thirty minutes.
    pub hours_before: f64,
    pub destination: String,
    #[serde(default = "default_seed_active")]
    pub active: bool,
}

fn default_seed_active() -> bool {
    true
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuleSeedSummary {
    pub created: u32,
    pub existing: u32,
    pub failed: u32,
}

pub fn parse_rules_seed(content: &str) -> Result<RulesSeedFile> {
    serde_json::from_str(content).context("failed to parse rules seed file")
}

/// Creates every rule in `seed`. Rules that already exist are counted, not
/// duplicated; invalid entries are logged and skipped.
pub async fn init_rules_from_seed(store: &Store, seed: &RulesSeedFile) -> Result<RuleSeedSummary> {
    let mut summary = RuleSeedSummary::default();

    for rule in &seed.rules {
        let lead = match LeadTime::from_hours(rule.hours_before) {
            Ok(lead) => lead,
            Err(e) => {
                tracing::warn!(destination = %rule.destination, error = %e, "Skipping rule with invalid lead time");
                summary.failed += 1;
                continue;
            }
        };

        match store
            .create_category_rule(rule.impact, lead, &rule.destination)
            .await
        {
            Ok((row, created)) => {
                if created {
                    summary.created += 1;
                } else {
                    tracing::info!(rule_id = %row.id, "Category rule already exists");
                    summary.existing += 1;
                }
                if !rule.active {
                    store.set_category_rule_active(&row.id, false).await?;
                }
            }
            Err(e) => {
                tracing::error!(
                    impact = %rule.impact,
                    destination = %rule.destination,
                    error = %e,
                    "Failed to create category rule"
                );
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        created = summary.created,
        existing = summary.existing,
        failed = summary.failed,
        "Rules seed applied"
    );
    Ok(summary)
}
