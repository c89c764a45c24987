use crate::schema::{RootCause, Status, VarianceRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Compound record filter. Every active predicate must hold; an empty
/// multi-select list places no restriction on its facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FilterSpec {
    #[schemars(
        description = "Case-insensitive text matched against category, cost center, GL account, owner and explanation"
    )]
    pub search: String,
    pub cost_centers: Vec<String>,
    pub gl_accounts: Vec<String>,
    pub periods: Vec<String>,
    pub statuses: Vec<Status>,
    pub owners: Vec<String>,
    pub root_causes: Vec<RootCause>,
    pub show_only_significant: bool,
    pub show_only_starred: bool,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, record: &VarianceRecord) -> bool {
        if self.show_only_significant && !record.is_significant() {
            return false;
        }
        if self.show_only_starred && !record.is_starred {
            return false;
        }

        facet(&self.cost_centers, record.cost_center.as_ref())
            && facet(&self.gl_accounts, record.gl_account.as_ref())
            && facet(&self.periods, record.period.as_ref())
            && facet(&self.statuses, Some(&record.status))
            && facet(&self.owners, Some(&record.owner))
            && facet(&self.root_causes, record.root_cause.as_ref())
            && self.matches_search(record)
    }

    fn matches_search(&self, record: &VarianceRecord) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let haystack = [
            Some(record.category.as_str()),
            record.cost_center.as_deref(),
            record.gl_account.as_deref(),
            Some(record.owner.as_str()),
            Some(record.explanation.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

        haystack.contains(&needle)
    }

    /// Matching records in their original relative order.
    pub fn apply<'a>(&self, records: &'a [VarianceRecord]) -> Vec<&'a VarianceRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn facet<T: PartialEq>(allowed: &[T], value: Option<&T>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    value.is_some_and(|v| allowed.contains(v))
}
