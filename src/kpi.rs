use crate::schema::{RootCause, Status, VarianceRecord};
use crate::utils::{current_month, today};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusCount {
    pub status: Status,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RootCauseBreakdown {
    pub root_cause: RootCause,
    pub count: usize,
    /// Sum of absolute dollar variance across the tagged records.
    pub total_impact: f64,
}

/// Portfolio-level summary of a classified record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KpiSummary {
    pub record_count: usize,
    pub significant_count: usize,
    pub total_budget: f64,
    pub total_actual: f64,
    pub total_variance: f64,
    pub explained_percent: f64,
    pub overdue_count: usize,
    pub by_status: Vec<StatusCount>,
    pub by_root_cause: Vec<RootCauseBreakdown>,
    pub top_overspends: Vec<VarianceRecord>,
    pub top_savings: Vec<VarianceRecord>,
    pub months_elapsed: i32,
    pub run_rate_projection: f64,
    pub projected_variance: f64,
}

impl KpiSummary {
    /// `months_elapsed` is how many periods of the year the actuals cover;
    /// `today` decides which due dates are overdue.
    pub fn calculate<'a, I>(records: I, months_elapsed: i32, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a VarianceRecord>,
    {
        let records: Vec<&VarianceRecord> = records.into_iter().collect();

        let total_budget: f64 = records.iter().map(|r| r.budget()).sum();
        let total_actual: f64 = records.iter().map(|r| r.actual()).sum();

        let resolved = records.iter().filter(|r| r.status.is_resolved()).count();
        let explained_percent = if records.is_empty() {
            0.0
        } else {
            resolved as f64 / records.len() as f64 * 100.0
        };

        let by_status = Status::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: records.iter().filter(|r| r.status == status).count(),
            })
            .collect();

        let by_root_cause = RootCause::ALL
            .into_iter()
            .map(|cause| {
                let tagged = records.iter().filter(|r| r.root_cause == Some(cause));
                let (count, total_impact) = tagged.fold((0, 0.0), |(n, sum), r| {
                    (n + 1, sum + r.dollar_variance().abs())
                });
                RootCauseBreakdown {
                    root_cause: cause,
                    count,
                    total_impact,
                }
            })
            .filter(|b| b.count > 0)
            .collect();

        let run_rate_projection = if months_elapsed <= 0 {
            0.0
        } else {
            total_actual / months_elapsed as f64 * 12.0
        };

        Self {
            record_count: records.len(),
            significant_count: records.iter().filter(|r| r.is_significant()).count(),
            total_budget,
            total_actual,
            total_variance: total_actual - total_budget,
            explained_percent,
            overdue_count: records.iter().filter(|r| r.is_overdue(today)).count(),
            by_status,
            by_root_cause,
            top_overspends: top_by_magnitude(&records, |v| v > 0.0),
            top_savings: top_by_magnitude(&records, |v| v < 0.0),
            months_elapsed,
            run_rate_projection,
            projected_variance: run_rate_projection - total_budget,
        }
    }

    /// Uses the local clock: the current month number as months elapsed and
    /// today's date for overdue checks.
    pub fn calculate_now<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a VarianceRecord>,
    {
        Self::calculate(records, current_month(), today())
    }

    pub fn status_count(&self, status: Status) -> usize {
        self.by_status
            .iter()
            .find(|s| s.status == status)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

fn top_by_magnitude<F>(records: &[&VarianceRecord], keep: F) -> Vec<VarianceRecord>
where
    F: Fn(f64) -> bool,
{
    let mut picked: Vec<&VarianceRecord> = records
        .iter()
        .copied()
        .filter(|r| keep(r.dollar_variance()))
        .collect();
    picked.sort_by(|a, b| {
        b.dollar_variance()
            .abs()
            .total_cmp(&a.dollar_variance().abs())
    });
    picked.into_iter().take(TOP_N).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_explained_and_overdue() {
        let today = date(2024, 6, 15);
        let mut records = vec![
            VarianceRecord::new("a", 100.0, 110.0),
            VarianceRecord::new("b", 100.0, 90.0),
            VarianceRecord::new("c", 100.0, 100.0),
            VarianceRecord::new("d", 100.0, 100.0),
        ];
        records[0].status = Status::Explained;
        records[1].status = Status::Closed;
        records[1].due_date = Some(date(2024, 1, 1));
        records[2].due_date = Some(date(2024, 6, 14));
        records[3].due_date = Some(today);

        let kpis = KpiSummary::calculate(&records, 6, today);
        assert_eq!(kpis.explained_percent, 50.0);
        assert_eq!(kpis.overdue_count, 1);
        assert_eq!(kpis.status_count(Status::New), 2);
        assert_eq!(kpis.status_count(Status::Investigating), 0);
        assert_eq!(kpis.by_status.len(), 4);
    }

    #[test]
    fn test_root_cause_breakdown_skips_unused_causes() {
        let mut records = vec![
            VarianceRecord::new("a", 100.0, 150.0),
            VarianceRecord::new("b", 100.0, 70.0),
            VarianceRecord::new("c", 100.0, 100.0),
        ];
        records[0].root_cause = Some(RootCause::Timing);
        records[1].root_cause = Some(RootCause::Timing);

        let kpis = KpiSummary::calculate(&records, 1, date(2024, 1, 1));
        assert_eq!(kpis.by_root_cause.len(), 1);
        assert_eq!(kpis.by_root_cause[0].count, 2);
        assert_eq!(kpis.by_root_cause[0].total_impact, 80.0);
    }

    #[test]
    fn test_top_overspends_and_savings() {
        let records: Vec<VarianceRecord> = (1..=7)
            .map(|i| VarianceRecord::new(format!("over {i}"), 0.0, i as f64))
            .chain([
                VarianceRecord::new("save small", 10.0, 9.0),
                VarianceRecord::new("save big", 10.0, 1.0),
                VarianceRecord::new("flat", 10.0, 10.0),
            ])
            .collect();

        let kpis = KpiSummary::calculate(&records, 1, date(2024, 1, 1));
        let over: Vec<&str> = kpis.top_overspends.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(over, vec!["over 7", "over 6", "over 5", "over 4", "over 3"]);

        let save: Vec<&str> = kpis.top_savings.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(save, vec!["save big", "save small"]);
    }

    #[test]
    fn test_run_rate_projection() {
        let records = vec![
            VarianceRecord::new("a", 1200.0, 300.0),
            VarianceRecord::new("b", 1200.0, 300.0),
        ];

        let kpis = KpiSummary::calculate(&records, 3, date(2024, 3, 31));
        assert_eq!(kpis.run_rate_projection, 2400.0);
        assert_eq!(kpis.projected_variance, 0.0);

        let guarded = KpiSummary::calculate(&records, 0, date(2024, 3, 31));
        assert_eq!(guarded.run_rate_projection, 0.0);
        assert_eq!(guarded.projected_variance, -2400.0);
    }

    #[test]
    fn test_empty_records() {
        let records: Vec<VarianceRecord> = Vec::new();
        let kpis = KpiSummary::calculate(&records, 4, date(2024, 4, 1));
        assert_eq!(kpis.explained_percent, 0.0);
        assert_eq!(kpis.record_count, 0);
        assert!(kpis.top_overspends.is_empty());
    }
}
