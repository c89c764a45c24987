use crate::aggregation::{aggregate_by, GroupedRollup};
use crate::columns::MappingOverride;
use crate::engine::classify;
use crate::error::{Result, VarianceError};
use crate::filter::FilterSpec;
use crate::ingestion::RawTable;
use crate::kpi::KpiSummary;
use crate::merge::{merge_datasets, MergeStrategy};
use crate::schema::{GroupBy, ParsedDataset, Thresholds, VarianceConfig, VarianceRecord};
use crate::workflow::WorkflowAction;
use crate::VarianceProcessor;
use chrono::NaiveDate;
use log::warn;

/// The dataset currently under review together with the settings it was
/// classified with.
///
/// Loading replaces the dataset only on success: a failed load returns the
/// error and leaves whatever was loaded before in place.
#[derive(Debug, Clone, Default)]
pub struct VarianceWorkspace {
    config: VarianceConfig,
    dataset: Option<ParsedDataset>,
}

impl VarianceWorkspace {
    pub fn new(config: VarianceConfig) -> Self {
        Self {
            config,
            dataset: None,
        }
    }

    pub fn config(&self) -> &VarianceConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&ParsedDataset> {
        self.dataset.as_ref()
    }

    pub fn records(&self) -> &[VarianceRecord] {
        self.dataset.as_ref().map(|d| d.records()).unwrap_or(&[])
    }

    pub fn load_text(
        &mut self,
        text: &str,
        overrides: &[MappingOverride],
    ) -> Result<&ParsedDataset> {
        let result = VarianceProcessor::ingest_text(text, &self.config, overrides);
        self.replace(result)
    }

    pub fn load_table(
        &mut self,
        table: &RawTable,
        overrides: &[MappingOverride],
    ) -> Result<&ParsedDataset> {
        let result = VarianceProcessor::ingest_table(table, &self.config, overrides);
        self.replace(result)
    }

    pub fn load_extracted_text(
        &mut self,
        text: &str,
        overrides: &[MappingOverride],
    ) -> Result<&ParsedDataset> {
        let result = VarianceProcessor::ingest_extracted_text(text, &self.config, overrides);
        self.replace(result)
    }

    #[cfg(feature = "spreadsheet")]
    pub fn load_spreadsheet(
        &mut self,
        bytes: &[u8],
        overrides: &[MappingOverride],
    ) -> Result<&ParsedDataset> {
        let result = VarianceProcessor::ingest_spreadsheet(bytes, &self.config, overrides);
        self.replace(result)
    }

    /// Merges independently ingested sources and makes the result current,
    /// classified under this workspace's thresholds whatever the sources
    /// were classified with.
    pub fn merge_sources(
        &mut self,
        sources: Vec<ParsedDataset>,
        strategy: MergeStrategy,
    ) -> Result<&ParsedDataset> {
        let thresholds = self.config.thresholds;
        let result = merge_datasets(sources, strategy, &thresholds)
            .map(|merged| classify(&merged, &thresholds));
        self.replace(result)
    }

    fn replace(&mut self, result: Result<ParsedDataset>) -> Result<&ParsedDataset> {
        match result {
            Ok(dataset) => Ok(self.dataset.insert(dataset)),
            Err(e) => {
                warn!("Load failed, keeping the current dataset: {}", e);
                Err(e)
            }
        }
    }

    /// Stores new thresholds and reclassifies the current dataset.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.config.thresholds = thresholds;
        if let Some(dataset) = &self.dataset {
            self.dataset = Some(classify(dataset, &self.config.thresholds));
        }
    }

    pub fn set_group_by(&mut self, group_by: GroupBy) {
        self.config.group_by = group_by;
    }

    /// Applies a review edit to the current dataset. With nothing loaded
    /// every record id is unknown.
    pub fn apply(&mut self, action: &WorkflowAction) -> Result<()> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or(VarianceError::UnknownRecord(action.target()))?;
        self.dataset = Some(action.apply(dataset)?);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.dataset = None;
    }

    pub fn view(&self, filter: &FilterSpec) -> Vec<&VarianceRecord> {
        filter.apply(self.records())
    }

    /// Rollups of the filtered view under the configured grouping.
    pub fn rollups(&self, filter: &FilterSpec) -> Vec<GroupedRollup> {
        aggregate_by(self.view(filter), self.config.group_by)
    }

    pub fn kpis(&self, months_elapsed: i32, today: NaiveDate) -> KpiSummary {
        KpiSummary::calculate(self.records(), months_elapsed, today)
    }

    pub fn kpis_now(&self) -> KpiSummary {
        KpiSummary::calculate_now(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Status;

    const SAMPLE: &str = "Category,Cost Center,Budget,Actual\n\
                          Rent,Ops,1000,1200\n\
                          Fuel,Ops,500,505\n\
                          Ads,Sales,800,400";

    #[test]
    fn test_failed_load_keeps_previous_dataset() {
        let mut workspace = VarianceWorkspace::default();
        workspace.load_text(SAMPLE, &[]).unwrap();

        let err = workspace.load_text("just one line", &[]).unwrap_err();
        assert!(matches!(err, VarianceError::Format(_)));
        assert_eq!(workspace.records().len(), 3);

        let err = workspace.load_text("Foo,Bar\n1,2", &[]).unwrap_err();
        assert!(err.is_mapping_error());
        assert_eq!(workspace.records()[0].category, "Rent");
    }

    #[test]
    fn test_threshold_change_reclassifies() {
        let mut workspace = VarianceWorkspace::default();
        workspace.load_text(SAMPLE, &[]).unwrap();
        assert_eq!(workspace.kpis(1, NaiveDate::MIN).significant_count, 2);

        workspace.set_thresholds(Thresholds {
            variance_threshold_percent: 0.5,
            variance_threshold_dollar: 50_000.0,
        });
        assert_eq!(workspace.kpis(1, NaiveDate::MIN).significant_count, 3);
    }

    #[test]
    fn test_merged_sources_follow_workspace_thresholds() {
        let config = VarianceConfig::default();
        let first = VarianceProcessor::ingest_text(SAMPLE, &config, &[]).unwrap();
        let second =
            VarianceProcessor::ingest_text("Category,Budget,Actual\nRent,100,300", &config, &[])
                .unwrap();
        assert_eq!(first.records().iter().filter(|r| r.is_significant()).count(), 2);

        let lenient = Thresholds {
            variance_threshold_percent: 90.0,
            variance_threshold_dollar: 1e9,
        };
        let mut workspace = VarianceWorkspace::new(VarianceConfig {
            thresholds: lenient,
            ..Default::default()
        });

        let stacked = workspace
            .merge_sources(vec![first.clone(), second], MergeStrategy::Stack)
            .unwrap();
        let flags: Vec<bool> = stacked.records().iter().map(|r| r.is_significant()).collect();
        assert_eq!(flags, vec![false, false, false, true]);

        let single = workspace
            .merge_sources(vec![first], MergeStrategy::Stack)
            .unwrap();
        assert!(single.records().iter().all(|r| !r.is_significant()));
        assert_eq!(workspace.kpis(1, NaiveDate::MIN).significant_count, 0);
    }

    #[test]
    fn test_view_and_rollups() {
        let mut workspace = VarianceWorkspace::default();
        workspace.load_text(SAMPLE, &[]).unwrap();
        workspace.set_group_by(GroupBy::CostCenter);

        let rollups = workspace.rollups(&FilterSpec::default());
        assert_eq!(rollups.len(), 2);
        assert_eq!(rollups[0].key, "Sales");
        assert_eq!(rollups[0].total_dollar_variance, -400.0);
        assert_eq!(rollups[1].total_dollar_variance, 205.0);

        let significant = workspace.view(&FilterSpec {
            show_only_significant: true,
            ..Default::default()
        });
        assert_eq!(significant.len(), 2);
    }

    #[test]
    fn test_apply_workflow_action() {
        let mut workspace = VarianceWorkspace::default();
        workspace.load_text(SAMPLE, &[]).unwrap();
        let id = workspace.records()[2].id;

        workspace
            .apply(&WorkflowAction::SetStatus {
                id,
                status: Status::Closed,
            })
            .unwrap();
        assert_eq!(workspace.records()[2].status, Status::Closed);

        workspace.clear();
        let err = workspace
            .apply(&WorkflowAction::ToggleStar { id })
            .unwrap_err();
        assert!(matches!(err, VarianceError::UnknownRecord(_)));
    }
}
