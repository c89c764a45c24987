use crate::schema::{GroupBy, VarianceRecord};
use crate::utils::percent_variance;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CostCenter,
    GlAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupedRollup {
    pub key: String,
    pub records: Vec<VarianceRecord>,
    pub total_budget: f64,
    pub total_actual: f64,
    pub total_dollar_variance: f64,
    /// Derived from the group totals, not averaged over members.
    pub total_percent_variance: f64,
    pub significant_count: usize,
}

impl GroupedRollup {
    fn new(key: String) -> Self {
        Self {
            key,
            records: Vec::new(),
            total_budget: 0.0,
            total_actual: 0.0,
            total_dollar_variance: 0.0,
            total_percent_variance: 0.0,
            significant_count: 0,
        }
    }

    fn push(&mut self, record: &VarianceRecord) {
        self.total_budget += record.budget();
        self.total_actual += record.actual();
        if record.is_significant() {
            self.significant_count += 1;
        }
        self.records.push(record.clone());
    }

    fn finish(mut self) -> Self {
        self.total_dollar_variance = self.total_actual - self.total_budget;
        self.total_percent_variance = percent_variance(self.total_budget, self.total_dollar_variance);
        self
    }
}

/// Groups records by `dimension`, largest absolute variance first. Groups
/// with equal magnitude keep the order in which they were first seen.
pub fn aggregate<'a, I>(records: I, dimension: Dimension) -> Vec<GroupedRollup>
where
    I: IntoIterator<Item = &'a VarianceRecord>,
{
    let mut groups: Vec<GroupedRollup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = record.dimension(dimension).unwrap_or(UNASSIGNED).to_string();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(GroupedRollup::new(key));
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    let mut rollups: Vec<GroupedRollup> = groups.into_iter().map(GroupedRollup::finish).collect();
    rollups.sort_by(|a, b| {
        b.total_dollar_variance
            .abs()
            .total_cmp(&a.total_dollar_variance.abs())
    });
    rollups
}

/// [`aggregate`] driven by the configured grouping; `GroupBy::None` yields
/// no groups.
pub fn aggregate_by<'a, I>(records: I, group_by: GroupBy) -> Vec<GroupedRollup>
where
    I: IntoIterator<Item = &'a VarianceRecord>,
{
    match group_by.dimension() {
        Some(dimension) => aggregate(records, dimension),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_by_cost_center() {
        let records = vec![
            VarianceRecord::new("Rent", 100.0, 150.0).with_cost_center("A"),
            VarianceRecord::new("Fuel", 100.0, 50.0).with_cost_center("A"),
            VarianceRecord::new("Food", 50.0, 50.0).with_cost_center("B"),
        ];

        let rollups = aggregate(&records, Dimension::CostCenter);
        assert_eq!(rollups.len(), 2);

        let a = &rollups[0];
        assert_eq!(a.key, "A");
        assert_eq!(a.total_budget, 200.0);
        assert_eq!(a.total_actual, 200.0);
        assert_eq!(a.total_dollar_variance, 0.0);
        assert_eq!(a.records.len(), 2);

        assert_eq!(rollups[1].key, "B");
        assert_eq!(rollups[1].total_dollar_variance, 0.0);
    }

    #[test]
    fn test_missing_dimension_is_unassigned() {
        let records = vec![
            VarianceRecord::new("Rent", 100.0, 100.0).with_gl_account("6000"),
            VarianceRecord::new("Fuel", 100.0, 400.0),
        ];

        let rollups = aggregate(&records, Dimension::GlAccount);
        assert_eq!(rollups[0].key, UNASSIGNED);
        assert_eq!(rollups[0].total_dollar_variance, 300.0);
        assert_eq!(rollups[1].key, "6000");
    }

    #[test]
    fn test_percent_from_totals_not_average() {
        let records = vec![
            VarianceRecord::new("A", 100.0, 200.0).with_cost_center("X"),
            VarianceRecord::new("B", 900.0, 900.0).with_cost_center("X"),
        ];

        let rollups = aggregate(&records, Dimension::CostCenter);
        assert_eq!(rollups[0].total_percent_variance, 10.0);
    }

    #[test]
    fn test_sorted_by_magnitude_with_stable_ties() {
        let records = vec![
            VarianceRecord::new("a", 10.0, 20.0).with_cost_center("small"),
            VarianceRecord::new("b", 10.0, -90.0).with_cost_center("big"),
            VarianceRecord::new("c", 10.0, 0.0).with_cost_center("tie"),
        ];

        let keys: Vec<String> = aggregate(&records, Dimension::CostCenter)
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(keys, vec!["big", "small", "tie"]);
    }

    #[test]
    fn test_group_by_none_is_empty() {
        let records = vec![VarianceRecord::new("a", 1.0, 2.0)];
        assert!(aggregate_by(&records, GroupBy::None).is_empty());
        assert_eq!(aggregate_by(&records, GroupBy::CostCenter).len(), 1);
    }
}
