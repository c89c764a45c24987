//! # Variance Pipeline
//!
//! A library for turning heterogeneous budget-vs-actual tables (pasted text,
//! CSV, spreadsheets, AI-extracted text) into normalized variance records.
//!
//! ## Core Concepts
//!
//! - **Raw table**: headers plus rows of untyped cells, before any meaning is known
//! - **Column roles**: which header holds the category, budget, actual and the optional
//!   cost center / GL account / period dimensions, resolved from an alias table
//! - **Variance record**: one line item with derived dollar and percent variance and a
//!   significance flag computed from configurable thresholds
//! - **Dataset**: ordered records plus metadata that is always derived from them
//!
//! Every stage is a pure function over in-memory values. A failed ingestion returns a
//! typed error and never yields a partially built dataset.
//!
//! ## Example
//!
//! ```rust,ignore
//! use variance_pipeline::*;
//!
//! let config = VarianceConfig::default();
//! let dataset = ingest_text(
//!     "Category,Budget,Actual\nRent,1000,1200\nUtilities,500,400",
//!     &config,
//!     &[],
//! )
//! .unwrap();
//!
//! assert_eq!(dataset.records()[0].percent_variance(), 20.0);
//! ```

pub mod aggregation;
pub mod columns;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingestion;
pub mod kpi;
pub mod merge;
pub mod schema;
#[cfg(feature = "spreadsheet")]
pub mod spreadsheet;
pub mod utils;
pub mod workflow;
pub mod workspace;

pub use aggregation::{aggregate, aggregate_by, Dimension, GroupedRollup, UNASSIGNED};
pub use columns::{AliasTable, ColumnMapping, ColumnResolver, MappingOverride, Role, ValidatedMapping};
pub use engine::{classify, RecordBuilder};
pub use error::{Result, VarianceError};
pub use filter::FilterSpec;
pub use ingestion::{parse_extracted_text, RawRow, RawTable};
pub use kpi::{KpiSummary, RootCauseBreakdown, StatusCount};
pub use merge::{merge_datasets, MergeStrategy};
pub use schema::*;
pub use utils::{normalize_cell, parse_amount, percent_variance};
pub use workflow::{apply_all, WorkflowAction};
pub use workspace::VarianceWorkspace;

use log::info;

pub struct VarianceProcessor;

impl VarianceProcessor {
    /// Resolves column roles (auto-detection, then `overrides`) and builds a
    /// classified dataset from an already-parsed table.
    pub fn ingest_table(
        table: &RawTable,
        config: &VarianceConfig,
        overrides: &[MappingOverride],
    ) -> Result<ParsedDataset> {
        let resolver = ColumnResolver::new(&config.aliases);
        let mapping = resolver.resolve(&table.headers, overrides)?;

        let dataset = RecordBuilder::new(&mapping, &config.thresholds).build_dataset(table);
        info!(
            "Ingested {} record(s) from {} column(s)",
            dataset.len(),
            table.headers.len()
        );

        Ok(dataset)
    }

    pub fn ingest_text(
        text: &str,
        config: &VarianceConfig,
        overrides: &[MappingOverride],
    ) -> Result<ParsedDataset> {
        let table = RawTable::parse_text(text)?;
        Self::ingest_table(&table, config, overrides)
    }

    pub fn ingest_extracted_text(
        text: &str,
        config: &VarianceConfig,
        overrides: &[MappingOverride],
    ) -> Result<ParsedDataset> {
        let table = parse_extracted_text(text, &config.extraction_error_prefix)?;
        Self::ingest_table(&table, config, overrides)
    }

    #[cfg(feature = "spreadsheet")]
    pub fn ingest_spreadsheet(
        bytes: &[u8],
        config: &VarianceConfig,
        overrides: &[MappingOverride],
    ) -> Result<ParsedDataset> {
        let table = RawTable::from_spreadsheet(bytes)?;
        Self::ingest_table(&table, config, overrides)
    }
}

pub fn ingest_table(
    table: &RawTable,
    config: &VarianceConfig,
    overrides: &[MappingOverride],
) -> Result<ParsedDataset> {
    VarianceProcessor::ingest_table(table, config, overrides)
}

pub fn ingest_text(
    text: &str,
    config: &VarianceConfig,
    overrides: &[MappingOverride],
) -> Result<ParsedDataset> {
    VarianceProcessor::ingest_text(text, config, overrides)
}

pub fn ingest_extracted_text(
    text: &str,
    config: &VarianceConfig,
    overrides: &[MappingOverride],
) -> Result<ParsedDataset> {
    VarianceProcessor::ingest_extracted_text(text, config, overrides)
}
